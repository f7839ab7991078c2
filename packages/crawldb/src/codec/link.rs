//! Hyperlink record.
//!
//! ```text
//! Version  Field                Encoding
//! 1        version              u8
//! 1        from_id              u128 BE (content digest of the source page)
//! 1        domain_id            u64 BE  (digest of the source domain)
//! 1        to_url               u16 BE length + UTF-8
//! 1        anchor_text          u16 BE length + UTF-8
//! 2        target_has_outlink   u8       (default false)
//! ```

use std::cmp::Ordering;

use crate::codec::order::Entity;
use crate::codec::{
    check_str_len, put_str, str_at, truncate_on_char_boundary, FieldReader, Record,
};
use crate::error::{Result, StoreError};

/// Current link record format version.
pub const LINK_VERSION: u8 = 2;

/// Anchor text is cut to this many bytes when a link is built.
pub const MAX_ANCHOR_LEN: usize = 256;

pub(crate) const FROM_OFFSET: usize = 1;
pub(crate) const DOMAIN_OFFSET: usize = FROM_OFFSET + 16;
pub(crate) const URL_OFFSET: usize = DOMAIN_OFFSET + 8;

const ENTITY: &str = "link";

/// A hyperlink between two pages.
///
/// Build links with [`LinkRecord::new`], which also cuts the anchor text.
/// A link assembled from a struct literal must pass
/// [`LinkRecord::validate`] before it is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub from_id: u128,
    pub domain_id: u64,
    pub to_url: String,
    pub anchor_text: String,
    pub target_has_outlink: bool,
}

impl LinkRecord {
    /// Build a link, truncating the anchor text to [`MAX_ANCHOR_LEN`] bytes.
    pub fn new(
        from_id: u128,
        domain_id: u64,
        to_url: impl Into<String>,
        anchor_text: &str,
    ) -> Result<Self> {
        let link = Self {
            from_id,
            domain_id,
            to_url: to_url.into(),
            anchor_text: truncate_on_char_boundary(anchor_text, MAX_ANCHOR_LEN).to_string(),
            target_has_outlink: false,
        };
        link.validate()?;
        Ok(link)
    }

    /// Check that the link encodes without loss: the target fits a `u16`
    /// length prefix and the anchor is at most [`MAX_ANCHOR_LEN`] bytes.
    pub fn validate(&self) -> Result<()> {
        check_str_len(&self.to_url, "link target")?;
        if self.anchor_text.len() > MAX_ANCHOR_LEN {
            return Err(StoreError::InvalidFormat(format!(
                "anchor text of {} bytes exceeds {}",
                self.anchor_text.len(),
                MAX_ANCHOR_LEN
            )));
        }
        Ok(())
    }

    /// Lookup key for the by-URL order: first link pointing at `to_url`.
    pub fn probe_url(to_url: &str) -> Self {
        Self {
            from_id: 0,
            domain_id: 0,
            to_url: to_url.to_string(),
            anchor_text: String::new(),
            target_has_outlink: false,
        }
    }

    /// Lookup key for the by-source order: first link out of `from_id`.
    pub fn probe_source(from_id: u128) -> Self {
        Self {
            from_id,
            domain_id: 0,
            to_url: String::new(),
            anchor_text: String::new(),
            target_has_outlink: false,
        }
    }

    /// Order by target URL, then source hash.
    pub fn cmp_by_url(a: &Self, b: &Self) -> Ordering {
        a.to_url
            .as_bytes()
            .cmp(b.to_url.as_bytes())
            .then_with(|| a.from_id.cmp(&b.from_id))
    }

    /// Order by source hash, then target URL.
    pub fn cmp_by_source(a: &Self, b: &Self) -> Ordering {
        a.from_id
            .cmp(&b.from_id)
            .then_with(|| a.to_url.as_bytes().cmp(b.to_url.as_bytes()))
    }

    fn raw_from(bytes: &[u8]) -> Result<&[u8]> {
        if bytes.len() < URL_OFFSET {
            return Err(StoreError::Truncated(ENTITY));
        }
        Ok(&bytes[FROM_OFFSET..DOMAIN_OFFSET])
    }

    /// Target URL bytes of an encoded link.
    pub fn raw_to_url(bytes: &[u8]) -> Result<&[u8]> {
        Ok(str_at(bytes, URL_OFFSET, ENTITY)?.0)
    }

    /// Source digest of an encoded link.
    pub fn raw_from_id(bytes: &[u8]) -> Result<u128> {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(Self::raw_from(bytes)?);
        Ok(u128::from_be_bytes(buf))
    }

    /// Raw-byte equivalent of [`cmp_by_url`](Self::cmp_by_url).
    pub fn raw_cmp_by_url(a: &[u8], b: &[u8]) -> Result<Ordering> {
        let (url_a, _) = str_at(a, URL_OFFSET, ENTITY)?;
        let (url_b, _) = str_at(b, URL_OFFSET, ENTITY)?;
        let by_url = url_a.cmp(url_b);
        if by_url != Ordering::Equal {
            return Ok(by_url);
        }
        Ok(Self::raw_from(a)?.cmp(Self::raw_from(b)?))
    }

    /// Raw-byte equivalent of [`cmp_by_source`](Self::cmp_by_source).
    pub fn raw_cmp_by_source(a: &[u8], b: &[u8]) -> Result<Ordering> {
        let by_from = Self::raw_from(a)?.cmp(Self::raw_from(b)?);
        if by_from != Ordering::Equal {
            return Ok(by_from);
        }
        let (url_a, _) = str_at(a, URL_OFFSET, ENTITY)?;
        let (url_b, _) = str_at(b, URL_OFFSET, ENTITY)?;
        Ok(url_a.cmp(url_b))
    }

    /// Encode at an older format version.
    pub fn encode_version(&self, version: u8) -> Result<Vec<u8>> {
        if version == 0 || version > LINK_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "cannot encode link at version {}",
                version
            )));
        }
        let mut out = Vec::with_capacity(URL_OFFSET + 5 + self.to_url.len() + self.anchor_text.len());
        out.push(version);
        out.extend_from_slice(&self.from_id.to_be_bytes());
        out.extend_from_slice(&self.domain_id.to_be_bytes());
        put_str(&mut out, &self.to_url);
        put_str(&mut out, &self.anchor_text);
        if version >= 2 {
            out.push(self.target_has_outlink as u8);
        }
        Ok(out)
    }
}

impl Record for LinkRecord {
    const ENTITY: Entity = Entity::Link;

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(LINK_VERSION);
        out.extend_from_slice(&self.from_id.to_be_bytes());
        out.extend_from_slice(&self.domain_id.to_be_bytes());
        put_str(out, &self.to_url);
        put_str(out, &self.anchor_text);
        out.push(self.target_has_outlink as u8);
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(bytes, ENTITY);
        let version = r.version(LINK_VERSION)?;
        let from_id = r.u128()?;
        let domain_id = r.u64()?;
        let to_url = r.string()?;
        let anchor_text = r.string()?;
        let target_has_outlink = if version >= 2 { r.bool()? } else { false };
        Ok(Self {
            from_id,
            domain_id,
            to_url,
            anchor_text,
            target_has_outlink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LinkRecord {
        let mut link = LinkRecord::new(42, 7, "http://example.com/b", "read more").unwrap();
        link.target_has_outlink = true;
        link
    }

    #[test]
    fn test_roundtrip() {
        let link = sample();
        let bytes = link.encode();
        assert_eq!(bytes[0], LINK_VERSION);
        assert_eq!(LinkRecord::decode(&bytes).unwrap(), link);
    }

    #[test]
    fn test_validate_catches_hand_built_links() {
        assert!(sample().validate().is_ok());
        assert!(LinkRecord::new(1, 1, "t".repeat(70_000), "").is_err());

        let mut link = sample();
        link.anchor_text = "a".repeat(MAX_ANCHOR_LEN + 1);
        assert!(matches!(link.validate().unwrap_err(), StoreError::InvalidFormat(_)));
    }

    #[test]
    fn test_version_1_defaults_outlink_flag() {
        let decoded = LinkRecord::decode(&sample().encode_version(1).unwrap()).unwrap();
        assert!(!decoded.target_has_outlink);
        assert_eq!(decoded.anchor_text, "read more");
    }

    #[test]
    fn test_version_too_new() {
        let mut bytes = sample().encode();
        bytes[0] = LINK_VERSION + 1;
        assert!(matches!(
            LinkRecord::decode(&bytes).unwrap_err(),
            StoreError::VersionTooNew { entity: "link", .. }
        ));
    }

    #[test]
    fn test_anchor_truncated_at_construction() {
        let anchor = "é".repeat(MAX_ANCHOR_LEN);
        let link = LinkRecord::new(1, 1, "u", &anchor).unwrap();
        assert!(link.anchor_text.len() <= MAX_ANCHOR_LEN);
        assert_eq!(link.anchor_text.len(), MAX_ANCHOR_LEN);
        assert!(link.anchor_text.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_decode_does_not_truncate() {
        let mut link = sample();
        link.anchor_text = "a".repeat(MAX_ANCHOR_LEN * 2);
        let decoded = LinkRecord::decode(&link.encode()).unwrap();
        assert_eq!(decoded.anchor_text.len(), MAX_ANCHOR_LEN * 2);
    }

    #[test]
    fn test_raw_orders() {
        let a = LinkRecord::new(2, 0, "a", "").unwrap().encode();
        let b = LinkRecord::new(1, 0, "b", "").unwrap().encode();
        assert_eq!(LinkRecord::raw_cmp_by_url(&a, &b).unwrap(), Ordering::Less);
        assert_eq!(LinkRecord::raw_cmp_by_source(&a, &b).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_raw_by_url_breaks_ties_on_source() {
        let a = LinkRecord::new(1, 0, "same", "").unwrap().encode();
        let b = LinkRecord::new(2, 0, "same", "").unwrap().encode();
        assert_eq!(LinkRecord::raw_cmp_by_url(&a, &b).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_raw_field_access() {
        let link = sample();
        let bytes = link.encode();
        assert_eq!(LinkRecord::raw_to_url(&bytes).unwrap(), link.to_url.as_bytes());
        assert_eq!(LinkRecord::raw_from_id(&bytes).unwrap(), 42);
    }

    #[test]
    fn test_raw_cmp_truncated() {
        let good = sample().encode();
        assert!(LinkRecord::raw_cmp_by_source(&good, &good[..10]).is_err());
    }
}
