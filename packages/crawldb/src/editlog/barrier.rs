//! Edit-log barrier and merge reader.
//!
//! A barrier covers every contributor's slot for one `(target shard,
//! label)` pair. It waits until all completion markers are visible, then
//! concatenates the logs in contributor-index order into an [`EditSink`].
//! The merged stream is not re-sorted.
//!
//! Cleanup is not atomic across contributors: a failure partway through
//! [`delete_contributions`](EditLogBarrier::delete_contributions) reports
//! `PartialDeleteFailure` and the slot set needs an operator.

use std::collections::HashSet;
use std::time::Instant;

use crate::codec::{CompletionMarker, TableOrder};
use crate::config::{PollConfig, StoreConfig};
use crate::editlog::slot::SlotId;
use crate::editlog::EditSink;
use crate::error::{Result, StoreError};
use crate::namespace::Namespace;
use crate::table::TableReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BarrierState {
    Waiting,
    Complete { total: u64 },
    Merged { total: u64 },
}

pub struct EditLogBarrier<'a, N: Namespace + ?Sized> {
    ns: &'a N,
    target_shard: u32,
    label: String,
    contributor_count: u32,
    poll: PollConfig,
    counts: Vec<u64>,
    state: BarrierState,
}

impl<'a, N: Namespace + ?Sized> EditLogBarrier<'a, N> {
    /// Barrier over contributors `0..contributor_count` (at least one).
    pub fn new(
        ns: &'a N,
        target_shard: u32,
        label: impl Into<String>,
        contributor_count: u32,
        poll: PollConfig,
    ) -> Result<Self> {
        let label = label.into();
        if contributor_count == 0 {
            return Err(StoreError::InvalidFormat(format!(
                "barrier for {} needs at least one contributor",
                label
            )));
        }
        Ok(Self {
            ns,
            target_shard,
            label,
            contributor_count,
            poll,
            counts: Vec::new(),
            state: BarrierState::Waiting,
        })
    }

    /// Barrier that waits with the store's `barrier_wait` settings.
    pub fn from_config(
        ns: &'a N,
        target_shard: u32,
        label: impl Into<String>,
        contributor_count: u32,
        config: &StoreConfig,
    ) -> Result<Self> {
        Self::new(
            ns,
            target_shard,
            label,
            contributor_count,
            config.barrier_wait,
        )
    }

    fn slot(&self, contributor: u32) -> SlotId {
        SlotId::new(self.target_shard, contributor, self.label.clone())
    }

    fn describe(&self) -> String {
        format!("{}[shard {}]", self.label, self.target_shard)
    }

    pub fn contributor_count(&self) -> u32 {
        self.contributor_count
    }

    /// Cached total once the barrier has completed.
    pub fn total(&self) -> Option<u64> {
        match self.state {
            BarrierState::Waiting => None,
            BarrierState::Complete { total } | BarrierState::Merged { total } => Some(total),
        }
    }

    /// Per-contributor entry counts, empty until the barrier completes.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Contributors whose completion marker is not yet visible.
    pub fn pending(&self) -> Result<Vec<u32>> {
        let present: HashSet<String> = self
            .ns
            .list(&SlotId::shard_dir(&self.label, self.target_shard))?
            .into_iter()
            .collect();
        Ok((0..self.contributor_count)
            .filter(|&c| !present.contains(&self.slot(c).done_path()))
            .collect())
    }

    /// Block until every contributor's marker is visible and return the
    /// summed entry count. Later calls return the cached total.
    pub fn await_completion(&mut self) -> Result<u64> {
        if let Some(total) = self.total() {
            return Ok(total);
        }

        let started = Instant::now();
        loop {
            let pending = self.pending()?;
            let Some(&first) = pending.first() else { break };
            if let Some(deadline) = self.poll.deadline() {
                if started.elapsed() >= deadline {
                    let waited_ms = started.elapsed().as_millis() as u64;
                    tracing::warn!(
                        barrier = %self.describe(),
                        pending = pending.len(),
                        waited_ms,
                        "barrier deadline expired"
                    );
                    return Err(StoreError::Timeout {
                        path: self.slot(first).done_path(),
                        waited_ms,
                    });
                }
            }
            tracing::debug!(barrier = %self.describe(), pending = pending.len(), "waiting for contributors");
            std::thread::sleep(self.poll.interval());
        }

        let mut counts = Vec::with_capacity(self.contributor_count as usize);
        for contributor in 0..self.contributor_count {
            let bytes = self.ns.read(&self.slot(contributor).done_path())?;
            counts.push(CompletionMarker::decode(&bytes)?.count);
        }
        let total: u64 = counts.iter().sum();
        self.counts = counts;
        self.state = BarrierState::Complete { total };
        tracing::info!(
            barrier = %self.describe(),
            contributors = self.contributor_count,
            total,
            "edit-log barrier complete"
        );
        Ok(total)
    }

    fn open_log(&self, contributor: u32) -> Result<TableReader> {
        let slot = self.slot(contributor);
        let path = slot.log_path();
        if !self.ns.exists(&path)? {
            return Err(StoreError::SlotMissing(slot.to_string()));
        }
        TableReader::from_table_bytes(self.ns.open_table_bytes(&path)?)
    }

    /// Copy every contributor's entries into `sink`, contributor 0 first.
    ///
    /// The key order comes from contributor 0's table header; every other
    /// log must match it and hold exactly the count its marker records.
    /// All logs are validated before the sink sees anything.
    pub fn merge_into<S>(&mut self, sink: &mut S) -> Result<u64>
    where
        S: EditSink + ?Sized,
    {
        let total = match self.state {
            BarrierState::Waiting => return Err(StoreError::BarrierIncomplete(self.describe())),
            BarrierState::Complete { total } | BarrierState::Merged { total } => total,
        };

        let mut logs = Vec::with_capacity(self.contributor_count as usize);
        let mut order: Option<TableOrder> = None;
        for (contributor, &expected) in (0..self.contributor_count).zip(&self.counts) {
            let log = self.open_log(contributor)?;
            let shared = *order.get_or_insert(log.order());
            if log.order() != shared {
                return Err(StoreError::InvalidFormat(format!(
                    "{} holds {} keys, contributor 0 holds {}",
                    self.slot(contributor),
                    log.order().name(),
                    shared.name()
                )));
            }
            if log.len() != expected {
                return Err(StoreError::CountMismatch {
                    contributor,
                    expected,
                    actual: log.len(),
                });
            }
            logs.push(log);
        }
        let order = order.ok_or_else(|| StoreError::SlotMissing(self.slot(0).to_string()))?;

        sink.begin(order, total)?;
        for log in &logs {
            for entry in log.cursor() {
                let entry = entry?;
                sink.accept(entry.key, entry.value)?;
            }
        }

        self.state = BarrierState::Merged { total };
        tracing::info!(
            barrier = %self.describe(),
            order = order.name(),
            total,
            "merged edit logs"
        );
        Ok(total)
    }

    /// Remove every contributor's log and marker. Requires a prior merge.
    ///
    /// Markers go first so an interrupted delete never leaves a marker
    /// whose log is gone. Returns the number of artifacts removed.
    pub fn delete_contributions(&mut self) -> Result<usize> {
        if !matches!(self.state, BarrierState::Merged { .. }) {
            return Err(StoreError::MergeRequired(self.describe()));
        }

        let mut artifacts = Vec::with_capacity(2 * self.contributor_count as usize);
        for contributor in 0..self.contributor_count {
            let slot = self.slot(contributor);
            artifacts.push(slot.done_path());
            artifacts.push(slot.log_path());
        }

        let mut deleted = 0usize;
        for (i, path) in artifacts.iter().enumerate() {
            let result = match self.ns.exists(path) {
                Ok(false) => continue,
                Ok(true) => self.ns.delete(path),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                if deleted == 0 {
                    return Err(e);
                }
                let remaining = artifacts.len() - i;
                tracing::warn!(
                    barrier = %self.describe(),
                    deleted,
                    remaining,
                    error = %e,
                    "partial delete of edit-log contributions"
                );
                return Err(StoreError::PartialDeleteFailure {
                    label: self.label.clone(),
                    deleted,
                    remaining,
                    source: Box::new(e),
                });
            }
            deleted += 1;
        }

        tracing::info!(barrier = %self.describe(), deleted, "deleted edit-log contributions");
        Ok(deleted)
    }
}
