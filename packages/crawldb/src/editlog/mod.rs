//! Distributed edit logs.
//!
//! Each contributor writes the edits it produced for one target shard into
//! its own slot ([`EditLogWriter`]). A [`EditLogBarrier`] for that shard
//! waits for every contributor's completion marker, then hands the
//! concatenated stream to an [`EditSink`] (typically the store mutator).

pub mod barrier;
pub mod slot;
pub mod writer;

pub use barrier::EditLogBarrier;
pub use slot::{SlotId, EDITLOG_ROOT};
pub use writer::EditLogWriter;

use std::io::{Seek, Write};

use crate::codec::TableOrder;
use crate::error::{Result, StoreError};
use crate::table::TableWriter;

/// One merged edit, copied verbatim from a contributor's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Receiver of a merged edit stream.
pub trait EditSink {
    /// Called once before any entry, with the shared key order and the
    /// total entry count across all contributors.
    fn begin(&mut self, order: TableOrder, expected_total: u64) -> Result<()>;

    fn accept(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

impl EditSink for Vec<EditEntry> {
    fn begin(&mut self, _order: TableOrder, expected_total: u64) -> Result<()> {
        self.reserve(expected_total as usize);
        Ok(())
    }

    fn accept(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.push(EditEntry {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }
}

/// Writes the merged stream as one table. The writer's order must match
/// the contributors' order.
impl<W: Write + Seek> EditSink for TableWriter<W> {
    fn begin(&mut self, order: TableOrder, _expected_total: u64) -> Result<()> {
        if order != self.order() {
            return Err(StoreError::InvalidFormat(format!(
                "cannot merge {} edits into a {} table",
                order.name(),
                self.order().name()
            )));
        }
        Ok(())
    }

    fn accept(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.add(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_table_sink_rejects_other_order() {
        let mut sink = TableWriter::unsorted(Cursor::new(Vec::new()), TableOrder::RawBytes).unwrap();
        assert!(sink.begin(TableOrder::LinksByUrl, 0).is_err());
        sink.begin(TableOrder::RawBytes, 1).unwrap();
        sink.accept(b"k", b"v").unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_vec_sink_collects_entries() {
        let mut sink: Vec<EditEntry> = Vec::new();
        sink.begin(TableOrder::RawBytes, 2).unwrap();
        sink.accept(b"a", b"1").unwrap();
        sink.accept(b"b", b"").unwrap();
        assert_eq!(
            sink,
            vec![
                EditEntry { key: b"a".to_vec(), value: b"1".to_vec() },
                EditEntry { key: b"b".to_vec(), value: Vec::new() },
            ]
        );
    }
}
