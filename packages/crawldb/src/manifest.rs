//! Store manifest and on-namespace layout.
//!
//! # Storage Layout
//!
//! ```text
//! <store>/
//! +-- manifest.bin              # StoreManifest
//! +-- COMPLETE                  # CompletionMarker(count = shard_count), written last
//! +-- shards/
//! |   +-- 0000/
//! |   |   +-- pages_by_url.tbl
//! |   |   +-- pages_by_hash.tbl
//! |   |   +-- links_by_url.tbl
//! |   |   +-- links_by_hash.tbl
//! |   +-- 0001/
//! |   +-- ...
//! ```

use crate::codec::{FieldReader, TableOrder};
use crate::error::{Result, StoreError};

/// Current manifest version.
pub const MANIFEST_VERSION: u8 = 1;

/// The four tables each shard carries, in open order.
pub const SHARD_TABLES: [TableOrder; 4] = [
    TableOrder::PagesByUrl,
    TableOrder::PagesByHash,
    TableOrder::LinksByUrl,
    TableOrder::LinksByHash,
];

/// Shard count and store-wide totals for one generation.
///
/// ```text
/// [u8 version][u32 shard_count][u64 page_count][u64 link_count]   (BE)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreManifest {
    pub shard_count: u32,
    pub page_count: u64,
    pub link_count: u64,
}

impl StoreManifest {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(21);
        out.push(MANIFEST_VERSION);
        out.extend_from_slice(&self.shard_count.to_be_bytes());
        out.extend_from_slice(&self.page_count.to_be_bytes());
        out.extend_from_slice(&self.link_count.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes, "manifest");
        r.version(MANIFEST_VERSION)?;
        let shard_count = r.u32()?;
        let page_count = r.u64()?;
        let link_count = r.u64()?;
        if shard_count == 0 {
            return Err(StoreError::InvalidFormat(
                "manifest declares zero shards".into(),
            ));
        }
        Ok(Self {
            shard_count,
            page_count,
            link_count,
        })
    }
}

/// Namespace paths of one logical store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    name: String,
}

impl StoreLayout {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manifest_path(&self) -> String {
        format!("{}/manifest.bin", self.name)
    }

    pub fn complete_path(&self) -> String {
        format!("{}/COMPLETE", self.name)
    }

    pub fn shard_dir(&self, shard: u32) -> String {
        format!("{}/shards/{:04}", self.name, shard)
    }

    pub fn table_path(&self, shard: u32, order: TableOrder) -> String {
        format!("{}/{}.tbl", self.shard_dir(shard), order.name())
    }
}
