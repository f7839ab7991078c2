//! Edit-log slot addressing.

use std::fmt;

/// Namespace directory holding every edit log.
pub const EDITLOG_ROOT: &str = "editlog";

/// One contributor's slot for one target shard under one label.
///
/// ```text
/// editlog/<label>/shard-NNNN/contrib-NNNN.log    unsorted table of edits
/// editlog/<label>/shard-NNNN/contrib-NNNN.done   completion marker
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotId {
    pub target_shard: u32,
    pub contributor: u32,
    pub label: String,
}

impl SlotId {
    pub fn new(target_shard: u32, contributor: u32, label: impl Into<String>) -> Self {
        Self {
            target_shard,
            contributor,
            label: label.into(),
        }
    }

    /// Directory shared by every contributor to this shard and label.
    pub fn shard_dir(label: &str, target_shard: u32) -> String {
        format!("{}/{}/shard-{:04}", EDITLOG_ROOT, label, target_shard)
    }

    fn stem(&self) -> String {
        format!(
            "{}/contrib-{:04}",
            Self::shard_dir(&self.label, self.target_shard),
            self.contributor
        )
    }

    pub fn log_path(&self) -> String {
        format!("{}.log", self.stem())
    }

    pub fn done_path(&self) -> String {
        format!("{}.done", self.stem())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[shard {}, contributor {}]",
            self.label, self.target_shard, self.contributor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let slot = SlotId::new(3, 12, "fetch");
        assert_eq!(slot.log_path(), "editlog/fetch/shard-0003/contrib-0012.log");
        assert_eq!(slot.done_path(), "editlog/fetch/shard-0003/contrib-0012.done");
        assert_eq!(slot.to_string(), "fetch[shard 3, contributor 12]");
    }
}
