//! Error types for the crawl store

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} record version {version} is newer than supported version {max}")]
    VersionTooNew {
        entity: &'static str,
        version: u8,
        max: u8,
    },

    #[error("Truncated {0} record")]
    Truncated(&'static str),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Key out of order at entry {index} for {order} table")]
    OutOfOrder { order: &'static str, index: u64 },

    #[error("Edit log slot {0} is already closed")]
    AlreadyClosed(String),

    #[error("Edit log slot {0} already exists")]
    SlotExists(String),

    #[error("Edit log slot {0} is missing")]
    SlotMissing(String),

    #[error("Barrier for {0} has not completed")]
    BarrierIncomplete(String),

    #[error("Contributions for {0} must be merged before they are deleted")]
    MergeRequired(String),

    #[error("Contributor {contributor} wrote {actual} entries but its marker records {expected}")]
    CountMismatch {
        contributor: u32,
        expected: u64,
        actual: u64,
    },

    #[error("Store '{store}' is marked complete but {missing} is missing")]
    IncompleteAfterSignal { store: String, missing: String },

    #[error(
        "Partial delete of '{label}': {deleted} artifacts removed, {remaining} remain \
         (manual recovery required): {source}"
    )]
    PartialDeleteFailure {
        label: String,
        deleted: usize,
        remaining: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Timed out after {waited_ms}ms waiting for {path}")]
    Timeout { path: String, waited_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Stable error code for consumers that report errors by name.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::VersionTooNew { .. } => "VERSION_TOO_NEW",
            StoreError::Truncated(_) => "TRUNCATED",
            StoreError::InvalidFormat(_) => "INVALID_FORMAT",
            StoreError::OutOfOrder { .. } => "OUT_OF_ORDER",
            StoreError::AlreadyClosed(_) => "ALREADY_CLOSED",
            StoreError::SlotExists(_) => "SLOT_EXISTS",
            StoreError::SlotMissing(_) => "SLOT_MISSING",
            StoreError::BarrierIncomplete(_) => "BARRIER_INCOMPLETE",
            StoreError::MergeRequired(_) => "MERGE_REQUIRED",
            StoreError::CountMismatch { .. } => "COUNT_MISMATCH",
            StoreError::IncompleteAfterSignal { .. } => "INCOMPLETE_AFTER_SIGNAL",
            StoreError::PartialDeleteFailure { .. } => "PARTIAL_DELETE_FAILURE",
            StoreError::Timeout { .. } => "TIMEOUT",
            StoreError::Io(_) => "IO_ERROR",
            StoreError::Json(_) => "JSON_ERROR",
        }
    }

    /// True for states that leave durable data inconsistent and need an
    /// operator, as opposed to a failed operation that can simply be redone.
    pub fn is_fatal_store_state(&self) -> bool {
        matches!(
            self,
            StoreError::IncompleteAfterSignal { .. } | StoreError::PartialDeleteFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_for_protocol_errors() {
        let errors = [
            StoreError::AlreadyClosed("s".into()),
            StoreError::SlotMissing("s".into()),
            StoreError::SlotExists("s".into()),
            StoreError::BarrierIncomplete("s".into()),
            StoreError::MergeRequired("s".into()),
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_fatal_store_states() {
        let partial = StoreError::PartialDeleteFailure {
            label: "crawl".into(),
            deleted: 1,
            remaining: 3,
            source: Box::new(StoreError::SlotMissing("x".into())),
        };
        assert!(partial.is_fatal_store_state());
        assert!(partial.to_string().contains("manual recovery"));

        let incomplete = StoreError::IncompleteAfterSignal {
            store: "crawl".into(),
            missing: "shards/0001/pages_by_url.tbl".into(),
        };
        assert!(incomplete.is_fatal_store_state());
        assert!(!StoreError::Truncated("page").is_fatal_store_state());
    }

    #[test]
    fn test_version_too_new_message() {
        let err = StoreError::VersionTooNew {
            entity: "page",
            version: 9,
            max: 4,
        };
        assert_eq!(err.code(), "VERSION_TOO_NEW");
        assert!(err.to_string().contains("version 9"));
    }
}
