//! Generation publisher.
//!
//! Collects pages and links in memory and publishes them as one complete
//! store generation:
//!
//! 1. Partition: pages by URL into by-URL tables and by content hash into
//!    by-hash tables; links by target URL and by source hash.
//! 2. Sort and encode every shard's four tables (parallel over shards).
//! 3. Publish all tables, then the manifest, then the `COMPLETE` marker.
//!
//! Readers wait on `COMPLETE`, so they never see a half-written generation.
//! Republishing over an existing store removes the old marker first.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::codec::{CompletionMarker, LinkRecord, PageRecord, Record, TableOrder};
use crate::error::{Result, StoreError};
use crate::manifest::{StoreLayout, StoreManifest};
use crate::namespace::Namespace;
use crate::partition::{route_hash, route_url, Blake3Partitioner, Partitioner};
use crate::table::table_to_bytes;

/// Records routed to one shard, before sorting.
#[derive(Debug, Default)]
struct ShardBucket {
    pages_by_url: Vec<PageRecord>,
    pages_by_hash: Vec<PageRecord>,
    links_by_url: Vec<LinkRecord>,
    links_by_hash: Vec<LinkRecord>,
}

/// Encoded tables of one shard, in `SHARD_TABLES` order.
struct EncodedShard {
    shard: u32,
    tables: Vec<(TableOrder, Vec<u8>)>,
}

pub struct StoreBuilder<P: Partitioner = Blake3Partitioner> {
    layout: StoreLayout,
    partitioner: P,
    buckets: Vec<ShardBucket>,
    urls: HashSet<String>,
    page_count: u64,
    link_count: u64,
}

impl StoreBuilder<Blake3Partitioner> {
    /// Builder for store `name` with `shard_count` shards (at least 1).
    pub fn new(name: impl Into<String>, shard_count: u32) -> Self {
        Self::with_partitioner(name, shard_count, Blake3Partitioner)
    }
}

impl<P: Partitioner> StoreBuilder<P> {
    pub fn with_partitioner(name: impl Into<String>, shard_count: u32, partitioner: P) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            layout: StoreLayout::new(name),
            partitioner,
            buckets: (0..shard_count).map(|_| ShardBucket::default()).collect(),
            urls: HashSet::new(),
            page_count: 0,
            link_count: 0,
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.buckets.len() as u32
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    pub fn link_count(&self) -> u64 {
        self.link_count
    }

    fn bucket(&mut self, key: &[u8]) -> Result<&mut ShardBucket> {
        let count = self.shard_count();
        let shard = self.partitioner.shard_for(key, count);
        self.buckets.get_mut(shard as usize).ok_or_else(|| {
            StoreError::InvalidFormat(format!("partitioner routed to shard {} of {}", shard, count))
        })
    }

    /// Add a page. URLs are unique across the store.
    pub fn add_page(&mut self, page: PageRecord) -> Result<()> {
        page.validate()?;
        if !self.urls.insert(page.url.clone()) {
            return Err(StoreError::InvalidFormat(format!(
                "duplicate page url: {}",
                page.url
            )));
        }
        self.bucket(&route_hash(page.content_hash))?
            .pages_by_hash
            .push(page.clone());
        self.bucket(route_url(&page.url))?.pages_by_url.push(page);
        self.page_count += 1;
        Ok(())
    }

    pub fn add_link(&mut self, link: LinkRecord) -> Result<()> {
        link.validate()?;
        self.bucket(&route_hash(link.from_id))?
            .links_by_hash
            .push(link.clone());
        self.bucket(route_url(&link.to_url))?.links_by_url.push(link);
        self.link_count += 1;
        Ok(())
    }

    /// Write the whole generation into `ns` and return its manifest.
    pub fn publish<N>(self, ns: &N) -> Result<StoreManifest>
    where
        N: Namespace + ?Sized,
    {
        let manifest = StoreManifest {
            shard_count: self.shard_count(),
            page_count: self.page_count,
            link_count: self.link_count,
        };

        let complete_path = self.layout.complete_path();
        if ns.exists(&complete_path)? {
            ns.delete(&complete_path)?;
            tracing::debug!(store = self.layout.name(), "retracted previous generation");
        }

        let encoded = self
            .buckets
            .into_par_iter()
            .enumerate()
            .map(|(shard, bucket)| encode_shard(shard as u32, bucket))
            .collect::<Result<Vec<EncodedShard>>>()?;

        for shard in &encoded {
            for (order, bytes) in &shard.tables {
                ns.publish(&self.layout.table_path(shard.shard, *order), bytes)?;
            }
        }
        ns.publish(&self.layout.manifest_path(), &manifest.encode())?;
        ns.publish(
            &complete_path,
            &CompletionMarker::new(manifest.shard_count as u64).encode(),
        )?;

        tracing::info!(
            store = self.layout.name(),
            shards = manifest.shard_count,
            pages = manifest.page_count,
            links = manifest.link_count,
            "published store generation"
        );
        Ok(manifest)
    }
}

fn encode_shard(shard: u32, bucket: ShardBucket) -> Result<EncodedShard> {
    let ShardBucket {
        mut pages_by_url,
        mut pages_by_hash,
        mut links_by_url,
        mut links_by_hash,
    } = bucket;

    pages_by_url.sort_by(PageRecord::cmp_by_url);
    pages_by_hash.sort_by(PageRecord::cmp_by_hash);
    links_by_url.sort_by(LinkRecord::cmp_by_url);
    links_by_hash.sort_by(LinkRecord::cmp_by_source);

    Ok(EncodedShard {
        shard,
        tables: vec![
            (TableOrder::PagesByUrl, encode_table(TableOrder::PagesByUrl, &pages_by_url)?),
            (TableOrder::PagesByHash, encode_table(TableOrder::PagesByHash, &pages_by_hash)?),
            (TableOrder::LinksByUrl, encode_table(TableOrder::LinksByUrl, &links_by_url)?),
            (TableOrder::LinksByHash, encode_table(TableOrder::LinksByHash, &links_by_hash)?),
        ],
    })
}

fn encode_table<R: Record>(order: TableOrder, records: &[R]) -> Result<Vec<u8>> {
    let keys: Vec<Vec<u8>> = records.iter().map(R::encode).collect();
    table_to_bytes(order, true, keys.iter().map(|k| (k.as_slice(), &b""[..])))
}
