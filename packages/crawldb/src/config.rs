//! Polling configuration for the blocking waits.
//!
//! Both the store façade (waiting on a generation's completion marker) and
//! the edit-log barrier poll the namespace. The interval and an optional
//! deadline are explicit here; `deadline_ms = None` waits forever.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Poll interval and optional deadline for a blocking wait.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            deadline_ms: None,
        }
    }
}

impl PollConfig {
    pub fn with_deadline(interval_ms: u64, deadline_ms: u64) -> Self {
        Self {
            interval_ms,
            deadline_ms: Some(deadline_ms),
        }
    }

    pub fn interval(&self) -> Duration {
        // A zero interval would spin.
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Store-wide configuration.
///
/// Optional on disk: `read_from` returns `None` when the file is absent and
/// callers fall back to `StoreConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Wait used while opening a store generation.
    #[serde(default)]
    pub open_wait: PollConfig,
    /// Wait used by edit-log barriers.
    #[serde(default)]
    pub barrier_wait: PollConfig,
}

impl StoreConfig {
    /// Read config from a JSON file. Returns None if the file doesn't exist.
    pub fn read_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(Some(config))
    }

    /// Write config as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
