//! Lock-free claim counters.
//!
//! Protection checks update these via atomic operations: no locks, no
//! allocations, no blocking on the hot path. The dashboard reads them at its
//! own pace.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::{Duration, Instant};

use claims_engine::Decision;

/// Atomic claim counters. A handful of `fetch_add`s per update.
pub struct Metrics {
    // Lookups
    lookups: AtomicU64,
    lookup_ns_sum: AtomicU64,

    // Lookup latency histogram
    hist_under_1us: AtomicU64,
    hist_1_10us: AtomicU64,
    hist_10_100us: AtomicU64,
    hist_100us_1ms: AtomicU64,
    hist_over_1ms: AtomicU64,

    // Protection decisions
    checks: AtomicU64,
    denials: AtomicU64,
    overrides: AtomicU64,

    // Mutations
    commits: AtomicU64,
    rejections: AtomicU64,
    rollbacks: AtomicU64,
    transfers_expired: AtomicU64,

    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            lookups: AtomicU64::new(0),
            lookup_ns_sum: AtomicU64::new(0),
            hist_under_1us: AtomicU64::new(0),
            hist_1_10us: AtomicU64::new(0),
            hist_10_100us: AtomicU64::new(0),
            hist_100us_1ms: AtomicU64::new(0),
            hist_over_1ms: AtomicU64::new(0),
            checks: AtomicU64::new(0),
            denials: AtomicU64::new(0),
            overrides: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            transfers_expired: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_lookup(&self, duration: Duration) {
        self.lookups.fetch_add(1, Relaxed);
        self.lookup_ns_sum
            .fetch_add(duration.as_nanos() as u64, Relaxed);

        let us = duration.as_micros() as u64;
        match us {
            0 => {
                self.hist_under_1us.fetch_add(1, Relaxed);
            }
            1..=9 => {
                self.hist_1_10us.fetch_add(1, Relaxed);
            }
            10..=99 => {
                self.hist_10_100us.fetch_add(1, Relaxed);
            }
            100..=999 => {
                self.hist_100us_1ms.fetch_add(1, Relaxed);
            }
            _ => {
                self.hist_over_1ms.fetch_add(1, Relaxed);
            }
        }
    }

    pub fn record_decision(&self, decision: Decision) {
        self.checks.fetch_add(1, Relaxed);
        match decision {
            Decision::Denied => {
                self.denials.fetch_add(1, Relaxed);
            }
            Decision::Override => {
                self.overrides.fetch_add(1, Relaxed);
            }
            _ => {}
        }
    }

    /// A flag check with no acting player.
    pub fn record_flag_check(&self, allowed: bool) {
        self.checks.fetch_add(1, Relaxed);
        if !allowed {
            self.denials.fetch_add(1, Relaxed);
        }
    }

    pub fn record_commit(&self) {
        self.commits.fetch_add(1, Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Relaxed);
    }

    pub fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Relaxed);
    }

    pub fn record_expiry(&self) {
        self.transfers_expired.fetch_add(1, Relaxed);
    }

    /// Read all counters into a serializable snapshot.
    pub fn snapshot(&self, gauges: Gauges) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            lookups_total: self.lookups.load(Relaxed),
            lookup_ns_sum: self.lookup_ns_sum.load(Relaxed),
            checks_total: self.checks.load(Relaxed),
            denials_total: self.denials.load(Relaxed),
            overrides_total: self.overrides.load(Relaxed),
            commits_total: self.commits.load(Relaxed),
            rejections_total: self.rejections.load(Relaxed),
            rollbacks_total: self.rollbacks.load(Relaxed),
            transfers_expired: self.transfers_expired.load(Relaxed),
            gauges,
            hist: [
                self.hist_under_1us.load(Relaxed),
                self.hist_1_10us.load(Relaxed),
                self.hist_10_100us.load(Relaxed),
                self.hist_100us_1ms.load(Relaxed),
                self.hist_over_1ms.load(Relaxed),
            ],
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time sizes read from the index.
#[derive(Clone, Copy, Default, Serialize)]
pub struct Gauges {
    pub worlds: u64,
    pub claims: u64,
    pub partitions: u64,
    pub overrides_enabled: u64,
}

/// Serializable snapshot of all metrics at a point in time.
/// The client computes rates by diffing consecutive snapshots.
#[derive(Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub lookups_total: u64,
    pub lookup_ns_sum: u64,
    pub checks_total: u64,
    pub denials_total: u64,
    pub overrides_total: u64,
    pub commits_total: u64,
    pub rejections_total: u64,
    pub rollbacks_total: u64,
    pub transfers_expired: u64,
    pub gauges: Gauges,
    /// `[<1μs, 1-10μs, 10-100μs, 100μs-1ms, >1ms]`
    pub hist: [u64; 5],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_are_bucketed() {
        let m = Metrics::new();
        m.record_decision(Decision::Owner);
        m.record_decision(Decision::Denied);
        m.record_decision(Decision::Override);
        m.record_flag_check(false);
        m.record_lookup(Duration::from_nanos(500));
        m.record_lookup(Duration::from_micros(50));

        let s = m.snapshot(Gauges::default());
        assert_eq!(s.checks_total, 4);
        assert_eq!(s.denials_total, 2);
        assert_eq!(s.overrides_total, 1);
        assert_eq!(s.lookups_total, 2);
        assert_eq!(s.hist, [1, 0, 1, 0, 0]);
    }
}
