//! Read-only handle to one physical shard table.
//!
//! A `ShardReader<R>` pairs a sorted table with the record type stored in
//! its keys. Lookups take a probe record: only the fields the table's order
//! compares need to be set (see `PageRecord::probe_url` and friends).
//!
//! Readers hold no state besides the mapped table; every scan or seek
//! creates its own cursor, so scans are restartable and independent.

use std::marker::PhantomData;
use std::path::Path;

use crate::codec::{Record, TableOrder};
use crate::error::{Result, StoreError};
use crate::table::{TableCursor, TableReader};

#[derive(Debug)]
pub struct ShardReader<R: Record> {
    table: TableReader,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> ShardReader<R> {
    /// Open a shard table file. A missing file is an error.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_table(TableReader::open(path)?)
    }

    /// Wrap an open table, checking it is sorted and stores `R`.
    pub fn from_table(table: TableReader) -> Result<Self> {
        table.order().expect_entity::<R>()?;
        if !table.header().is_sorted() {
            return Err(StoreError::InvalidFormat(format!(
                "{} shard table is not sorted",
                table.order().name()
            )));
        }
        Ok(Self {
            table,
            _record: PhantomData,
        })
    }

    pub fn order(&self) -> TableOrder {
        self.table.order()
    }

    /// Number of records in the shard.
    pub fn len(&self) -> u64 {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Underlying table, for raw `(key, value)` access.
    pub fn table(&self) -> &TableReader {
        &self.table
    }

    /// Exact match under the table's order.
    pub fn get(&self, probe: &R) -> Result<Option<R>> {
        match self.table.find(&probe.encode())? {
            Some(entry) => Ok(Some(R::decode(entry.key)?)),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get) without decoding the match.
    pub fn exists(&self, probe: &R) -> Result<bool> {
        Ok(self.table.find(&probe.encode())?.is_some())
    }

    /// Raw `(key, value)` cursor at the first entry `>= probe`.
    pub fn seek_raw(&self, probe: &R) -> Result<TableCursor<'_>> {
        self.table.seek(&probe.encode())
    }

    /// Record cursor at the first entry `>= probe`.
    pub fn seek(&self, probe: &R) -> Result<RecordCursor<'_, R>> {
        Ok(RecordCursor::new(self.seek_raw(probe)?))
    }

    /// Ascending scan of the whole shard.
    pub fn scan_all(&self) -> RecordCursor<'_, R> {
        RecordCursor::new(self.table.cursor())
    }

    /// Every record from the first `>= probe` up to the first one whose
    /// key fails `same_group`.
    pub fn collect_group<F>(&self, probe: &R, same_group: F) -> Result<Vec<R>>
    where
        F: Fn(&[u8]) -> Result<bool>,
    {
        let mut out = Vec::new();
        for entry in self.seek_raw(probe)? {
            let entry = entry?;
            if !same_group(entry.key)? {
                break;
            }
            out.push(R::decode(entry.key)?);
        }
        Ok(out)
    }

    /// Whether the first key `>= probe` satisfies `same_group`. Nothing is
    /// decoded.
    pub fn group_exists<F>(&self, probe: &R, same_group: F) -> Result<bool>
    where
        F: Fn(&[u8]) -> Result<bool>,
    {
        match self.seek_raw(probe)?.next() {
            Some(entry) => same_group(entry?.key),
            None => Ok(false),
        }
    }
}

/// Lazily decoding cursor. Yields the error and stops if an entry is
/// damaged or fails to decode.
pub struct RecordCursor<'a, R: Record + 'a> {
    inner: TableCursor<'a>,
    failed: bool,
    _record: PhantomData<fn() -> R>,
}

impl<'a, R: Record + 'a> RecordCursor<'a, R> {
    fn new(inner: TableCursor<'a>) -> Self {
        Self {
            inner,
            failed: false,
            _record: PhantomData,
        }
    }
}

impl<'a, R: Record + 'a> Iterator for RecordCursor<'a, R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next()?.and_then(|entry| R::decode(entry.key));
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}
