use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Streaming latency statistics of a single [`super::Worker`], in milliseconds.
///
/// Only the owning Worker writes to it (via [`Self::observe`]), while anyone can read it.
/// All accesses are lock-free: readers can observe a partially applied update
/// (e.g. the new `max` but the old `average`).
///
/// `count` is published with [`Ordering::Release`] after `min` and `max` are updated,
/// and read with [`Ordering::Acquire`]: once a reader sees a sample counted, it also sees
/// `min` and `max` account for it, never their initial sentinels.
#[derive(Debug)]
pub struct LatencyStats {
    min: AtomicI64,
    max: AtomicI64,
    sum: AtomicI64,
    count: AtomicU64,
    average: AtomicI64,
}

/// Point-in-time copy of [`LatencyStats`].
///
/// `min` and `max` are `None` until at least one sample has been observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySnapshot {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub average: i64,
    pub sum: i64,
    pub count: u64,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            min: AtomicI64::new(i64::MAX),
            max: AtomicI64::new(i64::MIN),
            sum: AtomicI64::new(0),
            count: AtomicU64::new(0),
            average: AtomicI64::new(0),
        }
    }

    /// Account for a new latency sample.
    ///
    /// The average is the floor of `sum / count`.
    pub fn observe(&self, latency_ms: i64) {
        self.min.fetch_min(latency_ms, Ordering::Relaxed);
        self.max.fetch_max(latency_ms, Ordering::Relaxed);

        let sum = self.sum.fetch_add(latency_ms, Ordering::Relaxed).wrapping_add(latency_ms);
        let count = self.count.fetch_add(1, Ordering::Release) + 1;

        self.average.store(sum.div_euclid(count as i64), Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn min(&self) -> Option<i64> {
        (self.count() > 0).then(|| self.min.load(Ordering::Relaxed))
    }

    pub fn max(&self) -> Option<i64> {
        (self.count() > 0).then(|| self.max.load(Ordering::Relaxed))
    }

    pub fn average(&self) -> i64 {
        self.average.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        LatencySnapshot {
            min: self.min(),
            max: self.max(),
            average: self.average(),
            sum: self.sum.load(Ordering::Relaxed),
            count: self.count(),
        }
    }
}
