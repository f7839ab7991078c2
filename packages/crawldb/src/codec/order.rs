//! Total orders over encoded records.
//!
//! Each physical table is sorted under exactly one `TableOrder`, recorded in
//! its header as a `u8`. The raw-byte path and the decoded path of every
//! order must agree on all valid encodings.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::codec::{LinkRecord, PageRecord, Record};
use crate::error::{Result, StoreError};

/// Entity kind stored under an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    Page,
    Link,
    /// Opaque keys, ordered bytewise.
    Raw,
}

impl Entity {
    pub fn name(&self) -> &'static str {
        match self {
            Entity::Page => "page",
            Entity::Link => "link",
            Entity::Raw => "raw",
        }
    }
}

/// Table sort order (stored as u8 in table headers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TableOrder {
    /// Pages by URL.
    PagesByUrl = 0,
    /// Pages by content hash, then URL.
    PagesByHash = 1,
    /// Links by target URL, then source hash.
    LinksByUrl = 2,
    /// Links by source hash, then target URL.
    LinksByHash = 3,
    /// Opaque byte strings, lexicographic.
    RawBytes = 4,
}

impl TableOrder {
    pub const ALL: [TableOrder; 5] = [
        TableOrder::PagesByUrl,
        TableOrder::PagesByHash,
        TableOrder::LinksByUrl,
        TableOrder::LinksByHash,
        TableOrder::RawBytes,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::PagesByUrl),
            1 => Some(Self::PagesByHash),
            2 => Some(Self::LinksByUrl),
            3 => Some(Self::LinksByHash),
            4 => Some(Self::RawBytes),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableOrder::PagesByUrl => "pages_by_url",
            TableOrder::PagesByHash => "pages_by_hash",
            TableOrder::LinksByUrl => "links_by_url",
            TableOrder::LinksByHash => "links_by_hash",
            TableOrder::RawBytes => "raw_bytes",
        }
    }

    pub fn entity(&self) -> Entity {
        match self {
            TableOrder::PagesByUrl | TableOrder::PagesByHash => Entity::Page,
            TableOrder::LinksByUrl | TableOrder::LinksByHash => Entity::Link,
            TableOrder::RawBytes => Entity::Raw,
        }
    }

    /// Compare two encoded keys without decoding them.
    pub fn compare_raw(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        match self {
            TableOrder::PagesByUrl => PageRecord::raw_cmp_by_url(a, b),
            TableOrder::PagesByHash => PageRecord::raw_cmp_by_hash(a, b),
            TableOrder::LinksByUrl => LinkRecord::raw_cmp_by_url(a, b),
            TableOrder::LinksByHash => LinkRecord::raw_cmp_by_source(a, b),
            TableOrder::RawBytes => Ok(a.cmp(b)),
        }
    }

    /// Compare two encoded keys by decoding them fully first.
    ///
    /// Slower reference path for [`compare_raw`](Self::compare_raw).
    pub fn compare_decoded(&self, a: &[u8], b: &[u8]) -> Result<Ordering> {
        match self {
            TableOrder::PagesByUrl => Ok(PageRecord::cmp_by_url(
                &PageRecord::decode(a)?,
                &PageRecord::decode(b)?,
            )),
            TableOrder::PagesByHash => Ok(PageRecord::cmp_by_hash(
                &PageRecord::decode(a)?,
                &PageRecord::decode(b)?,
            )),
            TableOrder::LinksByUrl => Ok(LinkRecord::cmp_by_url(
                &LinkRecord::decode(a)?,
                &LinkRecord::decode(b)?,
            )),
            TableOrder::LinksByHash => Ok(LinkRecord::cmp_by_source(
                &LinkRecord::decode(a)?,
                &LinkRecord::decode(b)?,
            )),
            TableOrder::RawBytes => Ok(a.cmp(b)),
        }
    }

    /// Check that this order stores records of type `R`.
    pub fn expect_entity<R: Record>(&self) -> Result<()> {
        if self.entity() != R::ENTITY {
            return Err(StoreError::InvalidFormat(format!(
                "{} table holds {} records, not {}",
                self.name(),
                self.entity().name(),
                R::ENTITY.name()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_roundtrip() {
        for order in TableOrder::ALL {
            assert_eq!(TableOrder::from_u8(order as u8), Some(order));
        }
        assert_eq!(TableOrder::from_u8(5), None);
        assert_eq!(TableOrder::from_u8(255), None);
    }

    #[test]
    fn test_entities() {
        assert_eq!(TableOrder::PagesByHash.entity(), Entity::Page);
        assert_eq!(TableOrder::LinksByUrl.entity(), Entity::Link);
        assert!(TableOrder::PagesByUrl.expect_entity::<PageRecord>().is_ok());
        assert!(TableOrder::PagesByUrl.expect_entity::<LinkRecord>().is_err());
    }

    #[test]
    fn test_raw_and_decoded_agree_on_pages() {
        let pages = [
            PageRecord::new("b", 1).unwrap(),
            PageRecord::new("a", 2).unwrap(),
            PageRecord::new("a", 1).unwrap(),
            PageRecord::new("", u128::MAX).unwrap(),
        ];
        for order in [TableOrder::PagesByUrl, TableOrder::PagesByHash] {
            for a in &pages {
                for b in &pages {
                    let (ea, eb) = (a.encode(), b.encode());
                    assert_eq!(
                        order.compare_raw(&ea, &eb).unwrap(),
                        order.compare_decoded(&ea, &eb).unwrap(),
                        "{:?} disagrees on {:?} vs {:?}",
                        order,
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_hash_order_is_numeric_not_little_endian() {
        // 256 > 1 numerically; a little-endian byte compare would say otherwise.
        let a = PageRecord::new("x", 256).unwrap().encode();
        let b = PageRecord::new("x", 1).unwrap().encode();
        assert_eq!(
            TableOrder::PagesByHash.compare_raw(&a, &b).unwrap(),
            Ordering::Greater
        );
    }
}
