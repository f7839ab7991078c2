//! Versioned binary record codecs.
//!
//! Every record starts with a one-byte format version, followed by its
//! fixed-size fields, then `u16`-length-prefixed strings, then trailing
//! fixed-size fields. Record fields are big-endian so digests compare the
//! same as bytes and as integers. Decoders accept any version up to the
//! current one and default the fields a given version predates.

pub mod link;
pub mod marker;
pub mod order;
pub mod page;

pub use link::{LinkRecord, LINK_VERSION, MAX_ANCHOR_LEN};
pub use marker::{CompletionMarker, MARKER_VERSION};
pub use order::{Entity, TableOrder};
pub use page::{PageRecord, PAGE_VERSION};

use crate::error::{Result, StoreError};

/// A record type with a versioned binary encoding.
pub trait Record: Sized + Clone + std::fmt::Debug {
    /// Which entity this record encodes (checked against table headers).
    const ENTITY: Entity;

    /// Append the current-version encoding to `out`.
    fn encode_into(&self, out: &mut Vec<u8>);

    /// Decode any supported version.
    fn decode(bytes: &[u8]) -> Result<Self>;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub(crate) fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Reject strings too long for a `u16` length prefix.
pub(crate) fn check_str_len(s: &str, what: &str) -> Result<()> {
    if s.len() > u16::MAX as usize {
        return Err(StoreError::InvalidFormat(format!(
            "{} of {} bytes exceeds {}",
            what,
            s.len(),
            u16::MAX
        )));
    }
    Ok(())
}

/// Write a `u16`-length-prefixed string, clamped to `u16::MAX` bytes.
/// Records are validated before they reach a table, so the clamp only
/// applies to records built by hand and never written through a builder.
pub(crate) fn put_str(out: &mut Vec<u8>, s: &str) {
    let s = truncate_on_char_boundary(s, u16::MAX as usize);
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// Slice the length-prefixed string starting at `offset` in an encoded
/// record. Returns the string bytes and the offset just past them.
pub(crate) fn str_at<'a>(
    bytes: &'a [u8],
    offset: usize,
    entity: &'static str,
) -> Result<(&'a [u8], usize)> {
    let len_end = offset + 2;
    if bytes.len() < len_end {
        return Err(StoreError::Truncated(entity));
    }
    let len = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]) as usize;
    let end = len_end + len;
    if bytes.len() < end {
        return Err(StoreError::Truncated(entity));
    }
    Ok((&bytes[len_end..end], end))
}

/// Sequential field reader over an encoded record.
pub(crate) struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    entity: &'static str,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(bytes: &'a [u8], entity: &'static str) -> Self {
        Self {
            bytes,
            pos: 0,
            entity,
        }
    }

    /// Read the version byte and reject anything outside `1..=max`.
    pub(crate) fn version(&mut self, max: u8) -> Result<u8> {
        let version = self.u8()?;
        if version > max {
            return Err(StoreError::VersionTooNew {
                entity: self.entity,
                version,
                max,
            });
        }
        if version == 0 {
            return Err(StoreError::InvalidFormat(format!(
                "{} record has version 0",
                self.entity
            )));
        }
        Ok(version)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        if self.bytes.len() < end {
            return Err(StoreError::Truncated(self.entity));
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[self.pos..end]);
        self.pos = end;
        Ok(buf)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    pub(crate) fn bool(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub(crate) fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    pub(crate) fn u128(&mut self) -> Result<u128> {
        Ok(u128::from_be_bytes(self.take()?))
    }

    pub(crate) fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_be_bytes(self.take()?))
    }

    pub(crate) fn string(&mut self) -> Result<String> {
        let (raw, end) = str_at(self.bytes, self.pos, self.entity)?;
        let s = std::str::from_utf8(raw).map_err(|e| {
            StoreError::InvalidFormat(format!("{} string is not UTF-8: {}", self.entity, e))
        })?;
        self.pos = end;
        Ok(s.to_string())
    }
}
