//! Publisher counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated by publish cycles.
#[derive(Debug, Default)]
pub struct PublisherStats {
    cycles: AtomicU64,
    published: AtomicU64,
    skipped: AtomicU64,
    failed_writes: AtomicU64,
    superseded: AtomicU64,
    discarded: AtomicU64,
}

/// Point-in-time copy of [`PublisherStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStatsSnapshot {
    /// Cycles started.
    pub cycles: u64,
    /// Positions written to the store.
    pub published: u64,
    /// Cycles skipped because the position or user could not be resolved.
    pub skipped: u64,
    /// Writes rejected by the store.
    pub failed_writes: u64,
    /// Cycles dropped because a newer cycle had already written.
    pub superseded: u64,
    /// Cycles whose result arrived after tracking stopped.
    pub discarded: u64,
}

impl PublisherStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cycle_started(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write_failed(&self) {
        self.failed_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> PublisherStatsSnapshot {
        PublisherStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
