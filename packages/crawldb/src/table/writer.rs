//! Table writer.
//!
//! Streams entries straight to the underlying writer, keeps the offset of
//! each one, and on `finish()` appends the offset index and patches the
//! header in place.

use std::io::{Seek, SeekFrom, Write};

use crate::codec::TableOrder;
use crate::error::{Result, StoreError};
use crate::table::format::{TableHeader, TABLE_HEADER_SIZE};

/// Summary of a written table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMeta {
    pub order: TableOrder,
    pub sorted: bool,
    pub entry_count: u64,
    pub byte_size: u64,
}

pub struct TableWriter<W: Write + Seek> {
    writer: W,
    order: TableOrder,
    sorted: bool,
    offsets: Vec<u64>,
    position: u64,
    last_key: Option<Vec<u8>>,
}

impl<W: Write + Seek> TableWriter<W> {
    /// Start a table whose keys must be non-decreasing under `order`.
    pub fn sorted(writer: W, order: TableOrder) -> Result<Self> {
        Self::start(writer, order, true)
    }

    /// Start a table that keeps keys in append order.
    pub fn unsorted(writer: W, order: TableOrder) -> Result<Self> {
        Self::start(writer, order, false)
    }

    fn start(mut writer: W, order: TableOrder, sorted: bool) -> Result<Self> {
        // Placeholder header; patched in finish().
        TableHeader::new(order, sorted, 0, 0).write_to(&mut writer)?;
        Ok(Self {
            writer,
            order,
            sorted,
            offsets: Vec::new(),
            position: TABLE_HEADER_SIZE as u64,
            last_key: None,
        })
    }

    pub fn order(&self) -> TableOrder {
        self.order
    }

    /// Number of entries written so far.
    pub fn len(&self) -> u64 {
        self.offsets.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Append one entry.
    ///
    /// Sorted tables reject a key that compares below the previous one.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > u32::MAX as usize || value.len() > u32::MAX as usize {
            return Err(StoreError::InvalidFormat(
                "table entry exceeds u32 length".into(),
            ));
        }
        if self.sorted {
            if let Some(last) = &self.last_key {
                if self.order.compare_raw(last, key)?.is_gt() {
                    return Err(StoreError::OutOfOrder {
                        order: self.order.name(),
                        index: self.len(),
                    });
                }
            }
            self.last_key = Some(key.to_vec());
        }

        self.offsets.push(self.position);
        self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
        self.writer.write_all(key)?;
        self.writer.write_all(&(value.len() as u32).to_le_bytes())?;
        self.writer.write_all(value)?;
        self.position += 8 + key.len() as u64 + value.len() as u64;
        Ok(())
    }

    /// Write the offset index, patch the header and flush.
    ///
    /// Returns the table summary and the underlying writer.
    pub fn finish(mut self) -> Result<(TableMeta, W)> {
        let index_offset = self.position;
        for offset in &self.offsets {
            self.writer.write_all(&offset.to_le_bytes())?;
        }
        let byte_size = index_offset + 8 * self.offsets.len() as u64;

        let entry_count = self.offsets.len() as u64;
        let header = TableHeader::new(self.order, self.sorted, entry_count, index_offset);
        self.writer.seek(SeekFrom::Start(0))?;
        header.write_to(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(byte_size))?;
        self.writer.flush()?;

        Ok((
            TableMeta {
                order: self.order,
                sorted: self.sorted,
                entry_count,
                byte_size,
            },
            self.writer,
        ))
    }
}

/// Write a complete table into memory.
pub fn table_to_bytes<'a, I>(order: TableOrder, sorted: bool, entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let cursor = std::io::Cursor::new(Vec::new());
    let mut writer = if sorted {
        TableWriter::sorted(cursor, order)?
    } else {
        TableWriter::unsorted(cursor, order)?
    };
    for (key, value) in entries {
        writer.add(key, value)?;
    }
    let (_, cursor) = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::table::format::TableHeader;

    #[test]
    fn test_empty_table_layout() {
        let bytes = table_to_bytes(TableOrder::RawBytes, true, std::iter::empty()).unwrap();
        assert_eq!(bytes.len(), TABLE_HEADER_SIZE);
        let header = TableHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header.entry_count, 0);
        assert_eq!(header.index_offset, TABLE_HEADER_SIZE as u64);
    }

    #[test]
    fn test_byte_size_matches_output() {
        let mut writer = TableWriter::sorted(Cursor::new(Vec::new()), TableOrder::RawBytes).unwrap();
        writer.add(b"a", b"1").unwrap();
        writer.add(b"bb", b"").unwrap();
        let (meta, cursor) = writer.finish().unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(meta.byte_size, bytes.len() as u64);
        assert_eq!(meta.entry_count, 2);
        // header + (8+1+1) + (8+2+0) + 2 index slots
        assert_eq!(bytes.len(), TABLE_HEADER_SIZE + 10 + 10 + 16);
    }

    #[test]
    fn test_sorted_rejects_decreasing_key() {
        let mut writer = TableWriter::sorted(Cursor::new(Vec::new()), TableOrder::RawBytes).unwrap();
        writer.add(b"b", b"").unwrap();
        writer.add(b"b", b"").unwrap(); // equal keys are allowed
        let err = writer.add(b"a", b"").unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { index: 2, .. }));
    }

    #[test]
    fn test_unsorted_accepts_any_order() {
        let mut writer =
            TableWriter::unsorted(Cursor::new(Vec::new()), TableOrder::RawBytes).unwrap();
        writer.add(b"z", b"").unwrap();
        writer.add(b"a", b"").unwrap();
        let (meta, _) = writer.finish().unwrap();
        assert!(!meta.sorted);
        assert_eq!(meta.entry_count, 2);
    }
}
