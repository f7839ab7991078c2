//! Completion markers.
//!
//! A marker is the last artifact a writer publishes; its presence means the
//! artifacts it covers are complete. Layout: `[u8 version][count]`, where
//! version 1 stores an `i32` count and version 2 an `i64` count (BE).

use crate::error::{Result, StoreError};

/// Current completion marker version.
pub const MARKER_VERSION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionMarker {
    pub count: u64,
}

impl CompletionMarker {
    pub fn new(count: u64) -> Self {
        Self { count }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9);
        out.push(MARKER_VERSION);
        out.extend_from_slice(&(self.count as i64).to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let version = *bytes.first().ok_or(StoreError::Truncated("marker"))?;
        let count: i64 = match version {
            1 => {
                let raw: [u8; 4] = bytes
                    .get(1..5)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(StoreError::Truncated("marker"))?;
                i32::from_be_bytes(raw) as i64
            }
            2 => {
                let raw: [u8; 8] = bytes
                    .get(1..9)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(StoreError::Truncated("marker"))?;
                i64::from_be_bytes(raw)
            }
            0 => {
                return Err(StoreError::InvalidFormat(
                    "marker has version 0".to_string(),
                ))
            }
            v => {
                return Err(StoreError::VersionTooNew {
                    entity: "marker",
                    version: v,
                    max: MARKER_VERSION,
                })
            }
        };
        if count < 0 {
            return Err(StoreError::InvalidFormat(format!(
                "marker has negative count {}",
                count
            )));
        }
        Ok(Self {
            count: count as u64,
        })
    }
}
