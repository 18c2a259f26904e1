//! Active instance batches keyed by launch time.

use cirrus_core::{Rejection, Timestamp};
use std::collections::BTreeMap;

/// Launch timestamp -> running instance count. Never holds a zero count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceLedger {
    batches: BTreeMap<Timestamp, u32>,
}

impl InstanceLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch launched at `at`. A second launch at the same instant replaces
    /// the earlier count rather than adding to it; a count of zero drops the entry.
    pub fn record_launch(&mut self, at: Timestamp, count: u32) {
        if count == 0 {
            self.batches.remove(&at);
        } else {
            self.batches.insert(at, count);
        }
    }

    /// Stop `count` instances of the batch launched at `launched_at`.
    pub fn stop(&mut self, launched_at: Timestamp, count: u32) -> Result<(), Rejection> {
        let Some(running) = self.batches.get_mut(&launched_at) else {
            return Err(Rejection::InvalidInstanceReference);
        };
        if *running < count {
            return Err(Rejection::InvalidInstanceReference);
        }
        *running -= count;
        if *running == 0 {
            self.batches.remove(&launched_at);
        }
        Ok(())
    }

    /// Running count of the batch launched at `launched_at`.
    pub fn count_at(&self, launched_at: &Timestamp) -> Option<u32> {
        self.batches.get(launched_at).copied()
    }

    /// Instances running across all batches.
    pub fn total(&self) -> u64 {
        self.batches.values().map(|c| u64::from(*c)).sum()
    }

    /// True when nothing is running.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// Servers auto-stopped or period closed with nothing carried over.
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Batches in launch order.
    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, u32)> + '_ {
        self.batches.iter().map(|(t, c)| (*t, *c))
    }
}
