//! crawldb: sharded, sorted, versioned on-disk store for a web-crawl graph.
//!
//! A store generation holds pages and the links between them, split across
//! N shards. Each shard carries four immutable sorted tables (pages by URL,
//! pages by content hash, links by target URL, links by source hash).
//! [`ShardedStore`] serves reads over a published generation; the
//! [`editlog`] module carries the distributed write side that feeds the
//! next one.

pub mod builder;
pub mod codec;
pub mod config;
pub mod editlog;
pub mod error;
pub mod manifest;
pub mod namespace;
pub mod partition;
pub mod shard;
pub mod store;
pub mod table;

pub use builder::StoreBuilder;
pub use codec::{CompletionMarker, LinkRecord, PageRecord, Record, TableOrder};
pub use config::{PollConfig, StoreConfig};
pub use editlog::{EditEntry, EditLogBarrier, EditLogWriter, EditSink, SlotId};
pub use error::{Result, StoreError};
pub use manifest::{StoreLayout, StoreManifest};
pub use namespace::{LocalNamespace, Namespace};
pub use partition::{Blake3Partitioner, Partitioner};
pub use shard::{RecordCursor, ShardReader};
pub use store::{ShardCounts, ShardSet, ShardedStore, StoreScan, StoreSummary};
