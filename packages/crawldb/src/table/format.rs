//! Table file header.
//!
//! Shard tables and edit-log contributions share one on-disk framing:
//!
//! ```text
//! [TableHeader]                32 bytes
//! [entries]                    u32 key_len, key, u32 value_len, value (repeated)
//! [offset index]               u64 x entry_count, absolute entry offsets
//! ```
//!
//! Framing integers are little-endian; keys and values are opaque here.

use std::io::Write;

use crate::codec::TableOrder;
use crate::error::{Result, StoreError};

/// Magic bytes for table files.
pub const TABLE_MAGIC: [u8; 4] = *b"CWTB";

/// Table format version.
pub const TABLE_FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
pub const TABLE_HEADER_SIZE: usize = 32;

/// Header flag: entries are non-decreasing under the table's order.
pub const FLAG_SORTED: u8 = 0x01;

/// Table header -- exactly 32 bytes on disk.
///
/// ```text
/// Offset  Size  Field
/// 0       4     magic: b"CWTB"
/// 4       2     version: u16 = 1
/// 6       1     order: u8 (TableOrder)
/// 7       1     flags: u8
/// 8       8     entry_count: u64
/// 16      8     index_offset: u64
/// 24      8     reserved: 0x00
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub order: TableOrder,
    pub flags: u8,
    pub entry_count: u64,
    pub index_offset: u64,
}

impl TableHeader {
    pub fn new(order: TableOrder, sorted: bool, entry_count: u64, index_offset: u64) -> Self {
        Self {
            magic: TABLE_MAGIC,
            version: TABLE_FORMAT_VERSION,
            order,
            flags: if sorted { FLAG_SORTED } else { 0 },
            entry_count,
            index_offset,
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.flags & FLAG_SORTED != 0
    }

    /// Parse and validate a header from the first `TABLE_HEADER_SIZE` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TABLE_HEADER_SIZE {
            return Err(StoreError::InvalidFormat(
                "File too small for table header".into(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != TABLE_MAGIC {
            return Err(StoreError::InvalidFormat(format!(
                "Not a table file: expected CWTB, got {:?}",
                magic
            )));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != TABLE_FORMAT_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported table version: {}",
                version
            )));
        }
        let order = TableOrder::from_u8(bytes[6]).ok_or_else(|| {
            StoreError::InvalidFormat(format!("Unknown table order: {}", bytes[6]))
        })?;
        let flags = bytes[7];
        let entry_count = read_u64_le(bytes, 8);
        let index_offset = read_u64_le(bytes, 16);

        Ok(Self {
            magic,
            version,
            order,
            flags,
            entry_count,
            index_offset,
        })
    }

    /// Write header (exactly TABLE_HEADER_SIZE bytes).
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.magic)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&[self.order as u8, self.flags])?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        writer.write_all(&self.index_offset.to_le_bytes())?;
        writer.write_all(&[0u8; 8])?; // reserved
        Ok(())
    }
}

/// Read a little-endian u64 at `offset`. Caller guarantees bounds.
#[inline]
pub(crate) fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Read a little-endian u32 at `offset`. Caller guarantees bounds.
#[inline]
pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_write_read_roundtrip() {
        let header = TableHeader::new(TableOrder::LinksByHash, true, 42, 1024);
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), TABLE_HEADER_SIZE);

        let parsed = TableHeader::from_bytes(&buf).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.is_sorted());
    }

    #[test]
    fn test_unsorted_flag() {
        let header = TableHeader::new(TableOrder::RawBytes, false, 0, 32);
        assert!(!header.is_sorted());
    }

    #[test]
    fn test_wrong_magic() {
        let mut buf = vec![0u8; TABLE_HEADER_SIZE];
        buf[0..4].copy_from_slice(b"XXXX");
        let err = TableHeader::from_bytes(&buf).unwrap_err();
        assert!(err.to_string().contains("Not a table file"));
    }

    #[test]
    fn test_unknown_order() {
        let mut buf = Vec::new();
        TableHeader::new(TableOrder::PagesByUrl, true, 0, 32)
            .write_to(&mut buf)
            .unwrap();
        buf[6] = 99;
        let err = TableHeader::from_bytes(&buf).unwrap_err();
        assert!(err.to_string().contains("Unknown table order"));
    }

    #[test]
    fn test_header_too_small() {
        let err = TableHeader::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(err.to_string().contains("too small"));
    }
}
