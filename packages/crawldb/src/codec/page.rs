//! Crawled-page record.
//!
//! ```text
//! Version  Field                    Encoding
//! 1        version                  u8
//! 1        content_hash             u128 BE
//! 1        url                      u16 BE length + UTF-8
//! 1        next_fetch_time          i64 BE (epoch millis)
//! 1        retries_since_fetch      u8
//! 1        fetch_interval_days      u8
//! 2        num_outlinks             i32 BE   (default 0)
//! 3        score                    f32 BE   (default 1.0)
//! 4        next_score               f32 BE   (default 1.0)
//! ```

use std::cmp::Ordering;

use crate::codec::order::Entity;
use crate::codec::{check_str_len, put_str, str_at, FieldReader, Record};
use crate::error::{Result, StoreError};

/// Current page record format version.
pub const PAGE_VERSION: u8 = 4;

/// Offset of the content hash in an encoded page (after the version byte).
pub(crate) const HASH_OFFSET: usize = 1;
/// Offset of the URL length prefix.
pub(crate) const URL_OFFSET: usize = HASH_OFFSET + 16;

const ENTITY: &str = "page";

/// A crawled page.
///
/// Build pages with [`PageRecord::new`]. A page assembled from a struct
/// literal must pass [`PageRecord::validate`] before it is encoded, or an
/// over-long URL is cut to `u16::MAX` bytes. The store builder validates
/// every page it accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    /// Primary key, unique across the page table.
    pub url: String,
    /// 128-bit digest of the fetched content. Shared by duplicate pages.
    pub content_hash: u128,
    /// Epoch millis of the next scheduled fetch.
    pub next_fetch_time: i64,
    pub retries_since_fetch: u8,
    pub fetch_interval_days: u8,
    pub num_outlinks: i32,
    pub score: f32,
    pub next_score: f32,
}

impl PageRecord {
    /// New page with defaulted schedule and scores.
    ///
    /// Fails if the URL cannot be length-prefixed with a `u16`.
    pub fn new(url: impl Into<String>, content_hash: u128) -> Result<Self> {
        let page = Self::probe(url.into(), content_hash);
        page.validate()?;
        Ok(page)
    }

    /// Check that the page encodes without loss.
    pub fn validate(&self) -> Result<()> {
        check_str_len(&self.url, "url")
    }

    /// Lookup key for the by-URL order. Only `url` participates.
    pub fn probe_url(url: &str) -> Self {
        Self::probe(url.to_string(), 0)
    }

    /// Lookup key for the by-hash order: sorts before every page with this
    /// hash, since the empty URL is the smallest string.
    pub fn probe_hash(content_hash: u128) -> Self {
        Self::probe(String::new(), content_hash)
    }

    fn probe(url: String, content_hash: u128) -> Self {
        Self {
            url,
            content_hash,
            next_fetch_time: 0,
            retries_since_fetch: 0,
            fetch_interval_days: 0,
            num_outlinks: 0,
            score: 1.0,
            next_score: 1.0,
        }
    }

    /// Order by URL only.
    pub fn cmp_by_url(a: &Self, b: &Self) -> Ordering {
        a.url.as_bytes().cmp(b.url.as_bytes())
    }

    /// Order by content hash, then URL.
    pub fn cmp_by_hash(a: &Self, b: &Self) -> Ordering {
        a.content_hash
            .cmp(&b.content_hash)
            .then_with(|| a.url.as_bytes().cmp(b.url.as_bytes()))
    }

    /// Raw-byte equivalent of [`cmp_by_url`](Self::cmp_by_url).
    pub fn raw_cmp_by_url(a: &[u8], b: &[u8]) -> Result<Ordering> {
        let (url_a, _) = str_at(a, URL_OFFSET, ENTITY)?;
        let (url_b, _) = str_at(b, URL_OFFSET, ENTITY)?;
        Ok(url_a.cmp(url_b))
    }

    /// Raw-byte equivalent of [`cmp_by_hash`](Self::cmp_by_hash).
    pub fn raw_cmp_by_hash(a: &[u8], b: &[u8]) -> Result<Ordering> {
        if a.len() < URL_OFFSET || b.len() < URL_OFFSET {
            return Err(StoreError::Truncated(ENTITY));
        }
        // Big-endian digests: byte order is numeric order.
        let by_hash = a[HASH_OFFSET..URL_OFFSET].cmp(&b[HASH_OFFSET..URL_OFFSET]);
        if by_hash != Ordering::Equal {
            return Ok(by_hash);
        }
        Self::raw_cmp_by_url(a, b)
    }

    /// Read the content hash out of an encoded page without decoding it.
    pub fn raw_content_hash(bytes: &[u8]) -> Result<u128> {
        if bytes.len() < URL_OFFSET {
            return Err(StoreError::Truncated(ENTITY));
        }
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&bytes[HASH_OFFSET..URL_OFFSET]);
        Ok(u128::from_be_bytes(buf))
    }

    /// Encode at an older format version, omitting the fields it predates.
    pub fn encode_version(&self, version: u8) -> Result<Vec<u8>> {
        if version == 0 || version > PAGE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "cannot encode page at version {}",
                version
            )));
        }
        let mut out = Vec::with_capacity(URL_OFFSET + 2 + self.url.len() + 18);
        out.push(version);
        out.extend_from_slice(&self.content_hash.to_be_bytes());
        put_str(&mut out, &self.url);
        out.extend_from_slice(&self.next_fetch_time.to_be_bytes());
        out.push(self.retries_since_fetch);
        out.push(self.fetch_interval_days);
        if version >= 2 {
            out.extend_from_slice(&self.num_outlinks.to_be_bytes());
        }
        if version >= 3 {
            out.extend_from_slice(&self.score.to_be_bytes());
        }
        if version >= 4 {
            out.extend_from_slice(&self.next_score.to_be_bytes());
        }
        Ok(out)
    }
}

impl Record for PageRecord {
    const ENTITY: Entity = Entity::Page;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(PAGE_VERSION);
        out.extend_from_slice(&self.content_hash.to_be_bytes());
        put_str(out, &self.url);
        out.extend_from_slice(&self.next_fetch_time.to_be_bytes());
        out.push(self.retries_since_fetch);
        out.push(self.fetch_interval_days);
        out.extend_from_slice(&self.num_outlinks.to_be_bytes());
        out.extend_from_slice(&self.score.to_be_bytes());
        out.extend_from_slice(&self.next_score.to_be_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes, ENTITY);
        let version = r.version(PAGE_VERSION)?;
        let content_hash = r.u128()?;
        let url = r.string()?;
        let next_fetch_time = r.i64()?;
        let retries_since_fetch = r.u8()?;
        let fetch_interval_days = r.u8()?;
        let num_outlinks = if version >= 2 { r.i32()? } else { 0 };
        let score = if version >= 3 { r.f32()? } else { 1.0 };
        let next_score = if version >= 4 { r.f32()? } else { 1.0 };
        Ok(Self {
            url,
            content_hash,
            next_fetch_time,
            retries_since_fetch,
            fetch_interval_days,
            num_outlinks,
            score,
            next_score,
        })
    }
}
