//! Sharded store façade.
//!
//! Unifies the 4N shard tables of one store generation behind a read-only
//! interface:
//!
//! - **Point queries** route to the single shard the partitioner names and
//!   never consult any other shard.
//! - **Group queries** (all pages with a hash, all links to a URL) seek to
//!   the first matching entry and scan forward until the key changes.
//! - **Full scans** chain the per-shard scans in shard-index order. Each
//!   shard's run is sorted; the chain as a whole is only globally sorted if
//!   the partitioner preserves key ranges, which the blake3 default does not.
//!
//! Opening blocks until the generation's `COMPLETE` marker exists. Once it
//! does, every shard table must be present: a missing one is a corrupt
//! store, not a reason to keep waiting.

use std::path::Path;

use rayon::prelude::*;

use crate::codec::{CompletionMarker, LinkRecord, PageRecord, Record};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::manifest::{StoreLayout, StoreManifest, SHARD_TABLES};
use crate::namespace::{LocalNamespace, Namespace};
use crate::partition::{route_hash, route_url, Blake3Partitioner, Partitioner};
use crate::shard::{RecordCursor, ShardReader};
use crate::table::TableReader;

// ── Shard Set ──────────────────────────────────────────────────────

/// The four tables of one shard.
#[derive(Debug)]
pub struct ShardSet {
    pages_by_url: ShardReader<PageRecord>,
    pages_by_hash: ShardReader<PageRecord>,
    links_by_url: ShardReader<LinkRecord>,
    links_by_hash: ShardReader<LinkRecord>,
}

impl ShardSet {
    pub fn pages_by_url(&self) -> &ShardReader<PageRecord> {
        &self.pages_by_url
    }

    pub fn pages_by_hash(&self) -> &ShardReader<PageRecord> {
        &self.pages_by_hash
    }

    pub fn links_by_url(&self) -> &ShardReader<LinkRecord> {
        &self.links_by_url
    }

    pub fn links_by_hash(&self) -> &ShardReader<LinkRecord> {
        &self.links_by_hash
    }
}

// ── Summary ────────────────────────────────────────────────────────

/// Record counts of one shard (from its by-URL tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardCounts {
    pub shard: u32,
    pub pages: u64,
    pub links: u64,
}

/// Immutable store totals, computed once at open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub shard_count: u32,
    pub page_count: u64,
    pub link_count: u64,
    pub shards: Vec<ShardCounts>,
}

// ── Sharded Store ──────────────────────────────────────────────────

/// Read-only view over one store generation.
pub struct ShardedStore<P: Partitioner = Blake3Partitioner> {
    layout: StoreLayout,
    partitioner: P,
    shards: Vec<ShardSet>,
    summary: StoreSummary,
}

impl ShardedStore<Blake3Partitioner> {
    /// Open store `name` under a local directory with the default
    /// partitioner.
    pub fn open(root: &Path, name: &str, config: &StoreConfig) -> Result<Self> {
        let ns = LocalNamespace::new(root)?;
        Self::open_with(&ns, name, config, Blake3Partitioner)
    }
}

impl<P: Partitioner> ShardedStore<P> {
    /// Open store `name` in any namespace.
    ///
    /// Blocks (per `config.open_wait`) until the completion marker exists,
    /// then reads the manifest and opens every shard's four tables.
    pub fn open_with<N>(ns: &N, name: &str, config: &StoreConfig, partitioner: P) -> Result<Self>
    where
        N: Namespace + ?Sized,
    {
        let layout = StoreLayout::new(name);
        let complete_path = layout.complete_path();
        ns.wait_for(&complete_path, &config.open_wait)?;

        let marker = CompletionMarker::decode(&ns.read(&complete_path)?)?;
        let manifest_path = layout.manifest_path();
        if !ns.exists(&manifest_path)? {
            return Err(StoreError::IncompleteAfterSignal {
                store: name.to_string(),
                missing: manifest_path,
            });
        }
        let manifest = StoreManifest::decode(&ns.read(&manifest_path)?)?;
        if marker.count != manifest.shard_count as u64 {
            return Err(StoreError::InvalidFormat(format!(
                "completion marker covers {} shards, manifest declares {}",
                marker.count, manifest.shard_count
            )));
        }

        let shards = (0..manifest.shard_count)
            .into_par_iter()
            .map(|shard| open_shard(ns, &layout, shard))
            .collect::<Result<Vec<ShardSet>>>()?;

        let summary = summarize(&shards, &manifest)?;
        tracing::info!(
            store = name,
            shards = summary.shard_count,
            pages = summary.page_count,
            links = summary.link_count,
            "opened store"
        );

        Ok(Self {
            layout,
            partitioner,
            shards,
            summary,
        })
    }

    pub fn name(&self) -> &str {
        self.layout.name()
    }

    pub fn summary(&self) -> &StoreSummary {
        &self.summary
    }

    pub fn shard_count(&self) -> u32 {
        self.summary.shard_count
    }

    pub fn shard(&self, index: u32) -> Option<&ShardSet> {
        self.shards.get(index as usize)
    }

    // ── Routing ────────────────────────────────────────────────────

    /// Shard owning `url` in the by-URL tables.
    pub fn shard_for_url(&self, url: &str) -> u32 {
        self.partitioner.shard_for(route_url(url), self.shard_count())
    }

    /// Shard owning `hash` in the by-hash tables.
    pub fn shard_for_hash(&self, hash: u128) -> u32 {
        self.partitioner.shard_for(&route_hash(hash), self.shard_count())
    }

    fn routed(&self, shard: u32) -> Result<&ShardSet> {
        self.shards.get(shard as usize).ok_or_else(|| {
            StoreError::InvalidFormat(format!(
                "partitioner routed to shard {} of {}",
                shard,
                self.shard_count()
            ))
        })
    }

    // ── Point Queries ──────────────────────────────────────────────

    pub fn get_page_by_url(&self, url: &str) -> Result<Option<PageRecord>> {
        let shard = self.routed(self.shard_for_url(url))?;
        shard.pages_by_url.get(&PageRecord::probe_url(url))
    }

    /// All pages with content hash `hash`, in by-hash order (so by URL).
    pub fn get_pages_by_hash(&self, hash: u128) -> Result<Vec<PageRecord>> {
        let shard = self.routed(self.shard_for_hash(hash))?;
        shard
            .pages_by_hash
            .collect_group(&PageRecord::probe_hash(hash), |key| {
                Ok(PageRecord::raw_content_hash(key)? == hash)
            })
    }

    /// Whether any page has content hash `hash`. Decodes nothing.
    pub fn page_exists(&self, hash: u128) -> Result<bool> {
        let shard = self.routed(self.shard_for_hash(hash))?;
        shard
            .pages_by_hash
            .group_exists(&PageRecord::probe_hash(hash), |key| {
                Ok(PageRecord::raw_content_hash(key)? == hash)
            })
    }

    /// All links pointing at `url`, ordered by source hash.
    pub fn get_links_by_url(&self, url: &str) -> Result<Vec<LinkRecord>> {
        let shard = self.routed(self.shard_for_url(url))?;
        shard
            .links_by_url
            .collect_group(&LinkRecord::probe_url(url), |key| {
                Ok(LinkRecord::raw_to_url(key)? == url.as_bytes())
            })
    }

    /// All links out of source page hash `from_id`, ordered by target URL.
    pub fn get_links_by_hash(&self, from_id: u128) -> Result<Vec<LinkRecord>> {
        let shard = self.routed(self.shard_for_hash(from_id))?;
        shard
            .links_by_hash
            .collect_group(&LinkRecord::probe_source(from_id), |key| {
                Ok(LinkRecord::raw_from_id(key)? == from_id)
            })
    }

    // ── Full Scans ─────────────────────────────────────────────────

    /// Every page, shard by shard, each shard sorted by URL.
    pub fn all_pages_by_url(&self) -> StoreScan<'_, PageRecord> {
        StoreScan::new(&self.shards, ShardSet::pages_by_url)
    }

    /// Every page, shard by shard, each shard sorted by (hash, URL).
    pub fn all_pages_by_hash(&self) -> StoreScan<'_, PageRecord> {
        StoreScan::new(&self.shards, ShardSet::pages_by_hash)
    }

    /// Every link, shard by shard, each shard sorted by (URL, source).
    pub fn all_links(&self) -> StoreScan<'_, LinkRecord> {
        StoreScan::new(&self.shards, ShardSet::links_by_url)
    }

    /// Every link, shard by shard, each shard sorted by (source, URL).
    pub fn all_links_by_hash(&self) -> StoreScan<'_, LinkRecord> {
        StoreScan::new(&self.shards, ShardSet::links_by_hash)
    }
}

fn open_shard<N>(ns: &N, layout: &StoreLayout, shard: u32) -> Result<ShardSet>
where
    N: Namespace + ?Sized,
{
    let mut tables = Vec::with_capacity(SHARD_TABLES.len());
    for order in SHARD_TABLES {
        let path = layout.table_path(shard, order);
        if !ns.exists(&path)? {
            return Err(StoreError::IncompleteAfterSignal {
                store: layout.name().to_string(),
                missing: path,
            });
        }
        let table = TableReader::from_table_bytes(ns.open_table_bytes(&path)?)?;
        if table.order() != order {
            return Err(StoreError::InvalidFormat(format!(
                "{} holds a {} table",
                path,
                table.order().name()
            )));
        }
        tables.push(table);
    }
    tracing::debug!(store = layout.name(), shard, "opened shard tables");

    let mut tables = tables.into_iter();
    let mut next = || {
        tables
            .next()
            .ok_or_else(|| StoreError::InvalidFormat("shard table list exhausted".into()))
    };
    Ok(ShardSet {
        pages_by_url: ShardReader::from_table(next()?)?,
        pages_by_hash: ShardReader::from_table(next()?)?,
        links_by_url: ShardReader::from_table(next()?)?,
        links_by_hash: ShardReader::from_table(next()?)?,
    })
}

fn summarize(shards: &[ShardSet], manifest: &StoreManifest) -> Result<StoreSummary> {
    let counts: Vec<ShardCounts> = shards
        .iter()
        .enumerate()
        .map(|(i, s)| ShardCounts {
            shard: i as u32,
            pages: s.pages_by_url.len(),
            links: s.links_by_url.len(),
        })
        .collect();

    let page_count: u64 = counts.iter().map(|c| c.pages).sum();
    let link_count: u64 = counts.iter().map(|c| c.links).sum();
    let pages_by_hash: u64 = shards.iter().map(|s| s.pages_by_hash.len()).sum();
    let links_by_hash: u64 = shards.iter().map(|s| s.links_by_hash.len()).sum();

    if page_count != manifest.page_count || pages_by_hash != manifest.page_count {
        return Err(StoreError::InvalidFormat(format!(
            "manifest declares {} pages, tables hold {} by url / {} by hash",
            manifest.page_count, page_count, pages_by_hash
        )));
    }
    if link_count != manifest.link_count || links_by_hash != manifest.link_count {
        return Err(StoreError::InvalidFormat(format!(
            "manifest declares {} links, tables hold {} by url / {} by hash",
            manifest.link_count, link_count, links_by_hash
        )));
    }

    Ok(StoreSummary {
        shard_count: manifest.shard_count,
        page_count,
        link_count,
        shards: counts,
    })
}

// ── Store Scan ─────────────────────────────────────────────────────

/// Lazy shard-major scan over one table kind.
///
/// Runs shard 0's cursor to exhaustion, then shard 1's, and so on. The
/// first error ends the whole scan.
pub struct StoreScan<'a, R: Record + 'a> {
    shards: std::slice::Iter<'a, ShardSet>,
    table: fn(&ShardSet) -> &ShardReader<R>,
    current: Option<RecordCursor<'a, R>>,
    done: bool,
}

impl<'a, R: Record + 'a> StoreScan<'a, R> {
    fn new(shards: &'a [ShardSet], table: fn(&ShardSet) -> &ShardReader<R>) -> Self {
        Self {
            shards: shards.iter(),
            table,
            current: None,
            done: false,
        }
    }
}

impl<'a, R: Record + 'a> Iterator for StoreScan<'a, R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(cursor) = self.current.as_mut() {
                match cursor.next() {
                    Some(Ok(record)) => return Some(Ok(record)),
                    Some(Err(e)) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }
            match self.shards.next() {
                Some(shard) => self.current = Some((self.table)(shard).scan_all()),
                None => self.done = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::StoreBuilder;
    use crate::codec::TableOrder;
    use crate::config::PollConfig;
    use tempfile::TempDir;

    fn quick_config() -> StoreConfig {
        StoreConfig {
            open_wait: PollConfig::with_deadline(1, 200),
            barrier_wait: PollConfig::default(),
        }
    }

    fn page(url: &str, hash: u128) -> PageRecord {
        PageRecord::new(url, hash).unwrap()
    }

    #[test]
    fn test_open_times_out_without_marker() {
        let dir = TempDir::new().unwrap();
        let err = ShardedStore::open(dir.path(), "crawl", &quick_config())
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::Timeout { .. }));
    }

    #[test]
    fn test_summary_and_point_queries() {
        let dir = TempDir::new().unwrap();
        let ns = LocalNamespace::new(dir.path()).unwrap();
        let mut builder = StoreBuilder::new("crawl", 4);
        builder.add_page(page("http://a/", 1)).unwrap();
        builder.add_page(page("http://b/", 1)).unwrap();
        builder.add_page(page("http://c/", 2)).unwrap();
        builder
            .add_link(LinkRecord::new(1, 10, "http://c/", "see c").unwrap())
            .unwrap();
        builder.publish(&ns).unwrap();

        let store = ShardedStore::open(dir.path(), "crawl", &quick_config()).unwrap();
        let summary = store.summary();
        assert_eq!(summary.shard_count, 4);
        assert_eq!(summary.page_count, 3);
        assert_eq!(summary.link_count, 1);
        assert_eq!(summary.shards.len(), 4);
        assert_eq!(summary.shards.iter().map(|c| c.pages).sum::<u64>(), 3);

        assert_eq!(store.get_page_by_url("http://c/").unwrap().unwrap().content_hash, 2);
        assert!(store.get_page_by_url("http://zzz/").unwrap().is_none());

        let dupes = store.get_pages_by_hash(1).unwrap();
        let urls: Vec<&str> = dupes.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["http://a/", "http://b/"]);
        assert!(store.page_exists(2).unwrap());
        assert!(!store.page_exists(3).unwrap());
        assert!(store.get_pages_by_hash(3).unwrap().is_empty());

        assert_eq!(store.get_links_by_url("http://c/").unwrap().len(), 1);
        assert_eq!(store.get_links_by_hash(1).unwrap()[0].anchor_text, "see c");
        assert!(store.get_links_by_hash(2).unwrap().is_empty());
    }

    #[test]
    fn test_scan_is_restartable() {
        let dir = TempDir::new().unwrap();
        let ns = LocalNamespace::new(dir.path()).unwrap();
        let mut builder = StoreBuilder::new("crawl", 3);
        for i in 0..20 {
            builder.add_page(page(&format!("http://host/{}", i), i)).unwrap();
        }
        builder.publish(&ns).unwrap();

        let store = ShardedStore::open(dir.path(), "crawl", &quick_config()).unwrap();
        let first: Vec<PageRecord> = store.all_pages_by_url().map(|r| r.unwrap()).collect();
        let second: Vec<PageRecord> = store.all_pages_by_url().map(|r| r.unwrap()).collect();
        assert_eq!(first.len(), 20);
        assert_eq!(first, second);
        assert_eq!(store.all_pages_by_hash().count(), 20);
        assert_eq!(store.all_links().count(), 0);
    }

    #[test]
    fn test_missing_shard_after_marker_is_fatal() {
        let dir = TempDir::new().unwrap();
        let ns = LocalNamespace::new(dir.path()).unwrap();
        StoreBuilder::new("crawl", 2).publish(&ns).unwrap();
        ns.delete(&StoreLayout::new("crawl").table_path(1, TableOrder::LinksByHash))
            .unwrap();

        let err = ShardedStore::open(dir.path(), "crawl", &quick_config())
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::IncompleteAfterSignal { .. }));
        assert!(err.is_fatal_store_state());
    }

    #[test]
    fn test_manifest_count_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let ns = LocalNamespace::new(dir.path()).unwrap();
        StoreBuilder::new("crawl", 1).publish(&ns).unwrap();
        let bogus = StoreManifest {
            shard_count: 1,
            page_count: 5,
            link_count: 0,
        };
        ns.publish(&StoreLayout::new("crawl").manifest_path(), &bogus.encode())
            .unwrap();

        let err = ShardedStore::open(dir.path(), "crawl", &quick_config())
            .err()
            .unwrap();
        assert!(err.to_string().contains("manifest declares 5 pages"));
    }
}
