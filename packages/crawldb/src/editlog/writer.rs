//! Edit-log writer.
//!
//! One writer owns one slot. Entries are buffered into an unsorted table in
//! append order; `close()` publishes that table and then the completion
//! marker carrying the entry count. Readers only trust a log once its
//! marker is visible.

use std::io::Cursor;

use crate::codec::{CompletionMarker, TableOrder};
use crate::editlog::slot::SlotId;
use crate::error::{Result, StoreError};
use crate::namespace::Namespace;
use crate::table::{TableMeta, TableWriter};

pub struct EditLogWriter<'a, N: Namespace + ?Sized> {
    ns: &'a N,
    slot: SlotId,
    table: Option<TableWriter<Cursor<Vec<u8>>>>,
}

impl<'a, N: Namespace + ?Sized> EditLogWriter<'a, N> {
    /// Claim `slot` for writing keys of `order`.
    ///
    /// Fails with `SlotExists` if the slot already holds a log or marker.
    pub fn open(ns: &'a N, slot: SlotId, order: TableOrder) -> Result<Self> {
        if ns.exists(&slot.log_path())? || ns.exists(&slot.done_path())? {
            return Err(StoreError::SlotExists(slot.to_string()));
        }
        let table = TableWriter::unsorted(Cursor::new(Vec::new()), order)?;
        tracing::debug!(slot = %slot, order = order.name(), "opened edit log");
        Ok(Self {
            ns,
            slot,
            table: Some(table),
        })
    }

    pub fn slot(&self) -> &SlotId {
        &self.slot
    }

    /// Entries appended so far.
    pub fn count(&self) -> u64 {
        self.table.as_ref().map_or(0, |t| t.len())
    }

    pub fn is_closed(&self) -> bool {
        self.table.is_none()
    }

    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        match self.table.as_mut() {
            Some(table) => table.add(key, value),
            None => Err(StoreError::AlreadyClosed(self.slot.to_string())),
        }
    }

    /// Publish the log, then its completion marker.
    ///
    /// A second call fails with `AlreadyClosed`. If publishing fails the
    /// writer stays closed; the slot must be cleaned up by the caller.
    pub fn close(&mut self) -> Result<TableMeta> {
        let table = self
            .table
            .take()
            .ok_or_else(|| StoreError::AlreadyClosed(self.slot.to_string()))?;
        let (meta, cursor) = table.finish()?;

        self.ns.publish(&self.slot.log_path(), &cursor.into_inner())?;
        self.ns.publish(
            &self.slot.done_path(),
            &CompletionMarker::new(meta.entry_count).encode(),
        )?;
        tracing::debug!(slot = %self.slot, entries = meta.entry_count, "closed edit log");
        Ok(meta)
    }
}
