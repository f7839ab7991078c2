//! Immutable key/value table files.
//!
//! The physical unit behind every shard table and edit-log contribution.

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{TableHeader, TABLE_HEADER_SIZE, TABLE_MAGIC};
pub use reader::{Entry, TableBytes, TableCursor, TableReader};
pub use writer::{table_to_bytes, TableMeta, TableWriter};
