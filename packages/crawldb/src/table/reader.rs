//! Table reader.
//!
//! Opens a table memory-mapped (or from owned bytes), validates the header
//! and offset index, and serves entries by position. Entry framing is
//! checked when an entry is read, so a damaged entry surfaces as an error
//! from the cursor that reaches it.

use std::cmp::Ordering;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;

use crate::codec::TableOrder;
use crate::error::{Result, StoreError};
use crate::table::format::{read_u32_le, read_u64_le, TableHeader, TABLE_HEADER_SIZE};

/// Backing bytes of an open table.
#[derive(Debug)]
pub enum TableBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl TableBytes {
    /// Memory-map a file.
    pub fn map(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Published tables are immutable; nothing rewrites a mapped file.
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(TableBytes::Mapped(mmap))
    }
}

impl Deref for TableBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            TableBytes::Mapped(m) => &m[..],
            TableBytes::Owned(v) => &v[..],
        }
    }
}

/// A borrowed table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Immutable table reader.
#[derive(Debug)]
pub struct TableReader {
    data: TableBytes,
    header: TableHeader,
}

impl TableReader {
    /// Open a table file (memory-mapped).
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_table_bytes(TableBytes::map(path)?)
    }

    /// Open a table held in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_table_bytes(TableBytes::Owned(bytes))
    }

    pub fn from_table_bytes(data: TableBytes) -> Result<Self> {
        let header = TableHeader::from_bytes(&data)?;
        let n = header.entry_count as usize;
        let index_offset = header.index_offset as usize;

        if index_offset < TABLE_HEADER_SIZE {
            return Err(StoreError::InvalidFormat(
                "index_offset points into header".into(),
            ));
        }
        let expected_len = n
            .checked_mul(8)
            .and_then(|index_len| index_len.checked_add(index_offset))
            .ok_or_else(|| StoreError::InvalidFormat("entry_count overflows".into()))?;
        if expected_len != data.len() {
            return Err(StoreError::InvalidFormat(format!(
                "table length {} does not match index layout ({})",
                data.len(),
                expected_len
            )));
        }

        Ok(Self { data, header })
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn order(&self) -> TableOrder {
        self.header.order
    }

    pub fn len(&self) -> u64 {
        self.header.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.header.entry_count == 0
    }

    /// Read the entry at `index`.
    pub fn entry(&self, index: u64) -> Result<Entry<'_>> {
        if index >= self.len() {
            return Err(StoreError::InvalidFormat(format!(
                "entry {} out of range ({} entries)",
                index,
                self.len()
            )));
        }
        let index_offset = self.header.index_offset as usize;
        let corrupt = || StoreError::InvalidFormat(format!("entry {} framing is corrupt", index));
        // Offsets come straight from disk; every sum is checked.
        let start = usize::try_from(read_u64_le(&self.data, index_offset + index as usize * 8))
            .map_err(|_| corrupt())?;

        let key_start = start.checked_add(4).ok_or_else(corrupt)?;
        if start < TABLE_HEADER_SIZE || key_start > index_offset {
            return Err(corrupt());
        }
        let key_len = read_u32_le(&self.data, start) as usize;
        let key_end = key_start.checked_add(key_len).ok_or_else(corrupt)?;
        let value_start = key_end.checked_add(4).ok_or_else(corrupt)?;
        if value_start > index_offset {
            return Err(corrupt());
        }
        let value_len = read_u32_le(&self.data, key_end) as usize;
        let value_end = value_start.checked_add(value_len).ok_or_else(corrupt)?;
        if value_end > index_offset {
            return Err(corrupt());
        }

        Ok(Entry {
            key: &self.data[key_start..key_end],
            value: &self.data[value_start..value_end],
        })
    }

    /// Position of the first entry whose key is `>= probe` under the table's
    /// order. Returns `len()` when every key is smaller.
    ///
    /// Binary search; only meaningful on sorted tables.
    pub fn lower_bound(&self, probe: &[u8]) -> Result<u64> {
        if !self.header.is_sorted() {
            return Err(StoreError::InvalidFormat(
                "cannot seek in an unsorted table".into(),
            ));
        }
        let order = self.header.order;
        let (mut lo, mut hi) = (0u64, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.entry(mid)?;
            if order.compare_raw(entry.key, probe)? == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Cursor at the first entry `>= probe`.
    pub fn seek(&self, probe: &[u8]) -> Result<TableCursor<'_>> {
        let position = self.lower_bound(probe)?;
        Ok(TableCursor::at(self, position))
    }

    /// Cursor at the first entry.
    pub fn cursor(&self) -> TableCursor<'_> {
        TableCursor::at(self, 0)
    }

    /// Exact-match lookup: the first entry comparing equal to `probe`.
    pub fn find(&self, probe: &[u8]) -> Result<Option<Entry<'_>>> {
        let position = self.lower_bound(probe)?;
        if position >= self.len() {
            return Ok(None);
        }
        let entry = self.entry(position)?;
        if self.header.order.compare_raw(entry.key, probe)? == Ordering::Equal {
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }
}

/// Forward cursor over a table. Stops for good after the first error.
pub struct TableCursor<'a> {
    table: &'a TableReader,
    position: u64,
    failed: bool,
}

impl<'a> TableCursor<'a> {
    fn at(table: &'a TableReader, position: u64) -> Self {
        Self {
            table,
            position,
            failed: false,
        }
    }

    /// Index of the entry `next()` will return.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<'a> Iterator for TableCursor<'a> {
    type Item = Result<Entry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.table.len() {
            return None;
        }
        match self.table.entry(self.position) {
            Ok(entry) => {
                self.position += 1;
                Some(Ok(entry))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::writer::table_to_bytes;
    use tempfile::TempDir;

    fn raw_table(keys: &[&[u8]]) -> TableReader {
        let bytes =
            table_to_bytes(TableOrder::RawBytes, true, keys.iter().map(|k| (*k, &b"v"[..])))
                .unwrap();
        TableReader::from_bytes(bytes).unwrap()
    }

    #[test]
    fn test_empty_table() {
        let table = raw_table(&[]);
        assert!(table.is_empty());
        assert_eq!(table.cursor().count(), 0);
        assert!(table.find(b"a").unwrap().is_none());
        assert_eq!(table.lower_bound(b"a").unwrap(), 0);
    }

    #[test]
    fn test_entries_read_back() {
        let table = raw_table(&[b"a", b"c", b"e"]);
        let keys: Vec<&[u8]> = table.cursor().map(|e| e.unwrap().key).collect();
        assert_eq!(keys, vec![&b"a"[..], &b"c"[..], &b"e"[..]]);
        assert_eq!(table.entry(1).unwrap().value, b"v");
    }

    #[test]
    fn test_seek_positions_at_lower_bound() {
        let table = raw_table(&[b"a", b"c", b"c", b"e"]);
        assert_eq!(table.lower_bound(b"0").unwrap(), 0);
        assert_eq!(table.lower_bound(b"c").unwrap(), 1);
        assert_eq!(table.lower_bound(b"d").unwrap(), 3);
        assert_eq!(table.lower_bound(b"z").unwrap(), 4);

        let rest: Vec<&[u8]> = table.seek(b"b").unwrap().map(|e| e.unwrap().key).collect();
        assert_eq!(rest, vec![&b"c"[..], &b"c"[..], &b"e"[..]]);
    }

    #[test]
    fn test_find_exact() {
        let table = raw_table(&[b"a", b"c"]);
        assert_eq!(table.find(b"c").unwrap().unwrap().key, b"c");
        assert!(table.find(b"b").unwrap().is_none());
        assert!(table.find(b"d").unwrap().is_none());
    }

    #[test]
    fn test_unsorted_table_cannot_seek() {
        let bytes = table_to_bytes(
            TableOrder::RawBytes,
            false,
            [(&b"b"[..], &b""[..]), (&b"a"[..], &b""[..])],
        )
        .unwrap();
        let table = TableReader::from_bytes(bytes).unwrap();
        assert!(table.seek(b"a").is_err());
        assert_eq!(table.cursor().count(), 2);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut bytes =
            table_to_bytes(TableOrder::RawBytes, true, [(&b"a"[..], &b""[..])]).unwrap();
        bytes.push(0);
        let err = TableReader::from_bytes(bytes).unwrap_err();
        assert!(err.to_string().contains("does not match index layout"));
    }

    #[test]
    fn test_corrupt_entry_ends_cursor_with_error() {
        let mut bytes = table_to_bytes(
            TableOrder::RawBytes,
            true,
            [(&b"a"[..], &b""[..]), (&b"b"[..], &b""[..])],
        )
        .unwrap();
        // Second entry starts at 32 + 9; blow up its key length.
        let second = TABLE_HEADER_SIZE + 9;
        bytes[second..second + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        let table = TableReader::from_bytes(bytes).unwrap();

        let items: Vec<_> = table.cursor().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[test]
    fn test_corrupt_index_slot_is_an_error() {
        let mut bytes =
            table_to_bytes(TableOrder::RawBytes, true, [(&b"a"[..], &b"v"[..])]).unwrap();
        // The only index slot is the last 8 bytes.
        let slot = bytes.len() - 8;
        bytes[slot..].copy_from_slice(&u64::MAX.to_le_bytes());
        let table = TableReader::from_bytes(bytes).unwrap();

        assert!(matches!(
            table.entry(0).unwrap_err(),
            StoreError::InvalidFormat(_)
        ));
        let mut cursor = table.cursor();
        assert!(matches!(cursor.next(), Some(Err(StoreError::InvalidFormat(_)))));
        assert!(cursor.next().is_none());
        assert!(table.find(b"a").is_err());
    }

    #[test]
    fn test_index_slot_past_entries_is_an_error() {
        let mut bytes =
            table_to_bytes(TableOrder::RawBytes, true, [(&b"a"[..], &b"v"[..])]).unwrap();
        let slot = bytes.len() - 8;
        let into_index = (slot as u64 - 2).to_le_bytes();
        bytes[slot..].copy_from_slice(&into_index);
        let table = TableReader::from_bytes(bytes).unwrap();
        assert!(table.entry(0).is_err());
    }

    #[test]
    fn test_open_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.tbl");
        let bytes = table_to_bytes(TableOrder::RawBytes, true, [(&b"k"[..], &b"v"[..])]).unwrap();
        std::fs::write(&path, bytes).unwrap();

        let table = TableReader::open(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(b"k").unwrap().unwrap().value, b"v");
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            TableReader::open(&dir.path().join("missing.tbl")).unwrap_err(),
            StoreError::Io(_)
        ));
    }
}
