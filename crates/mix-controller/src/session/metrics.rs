//! In-process session metrics.
//!
//! Plain atomics shared between the actor and the supervisor; snapshotted
//! for shutdown logging and diagnostics. No exporter is wired here.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Shared conference gauges and counters.
#[derive(Debug, Default)]
pub struct ConferenceMetrics {
    peers: AtomicU32,
    pending: AtomicU32,
    mix_active: AtomicBool,
    joins_total: AtomicU64,
    leaves_total: AtomicU64,
    deferred_joins_total: AtomicU64,
}

/// Point-in-time copy of the metrics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub peers: u32,
    pub pending: u32,
    pub mix_active: bool,
    pub joins_total: u64,
    pub leaves_total: u64,
    pub deferred_joins_total: u64,
}

impl ConferenceMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_peers(&self, peers: u32) {
        self.peers.store(peers, Ordering::Relaxed);
    }

    #[must_use]
    pub fn peers(&self) -> u32 {
        self.peers.load(Ordering::Relaxed)
    }

    pub fn set_pending(&self, pending: u32) {
        self.pending.store(pending, Ordering::Relaxed);
    }

    pub fn set_mix_active(&self, active: bool) {
        self.mix_active.store(active, Ordering::Relaxed);
    }

    #[must_use]
    pub fn mix_active(&self) -> bool {
        self.mix_active.load(Ordering::Relaxed)
    }

    pub fn record_join(&self) {
        self.joins_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leave(&self) {
        self.leaves_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deferred_join(&self) {
        self.deferred_joins_total.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            peers: self.peers.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            mix_active: self.mix_active.load(Ordering::Relaxed),
            joins_total: self.joins_total.load(Ordering::Relaxed),
            leaves_total: self.leaves_total.load(Ordering::Relaxed),
            deferred_joins_total: self.deferred_joins_total.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let metrics = ConferenceMetrics::new();
        metrics.set_peers(3);
        metrics.set_mix_active(true);
        metrics.record_join();
        metrics.record_join();
        metrics.record_leave();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.peers, 3);
        assert!(snapshot.mix_active);
        assert_eq!(snapshot.joins_total, 2);
        assert_eq!(snapshot.leaves_total, 1);
        assert_eq!(snapshot.deferred_joins_total, 0);
    }
}
