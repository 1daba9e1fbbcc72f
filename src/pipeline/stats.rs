//! Lock-free running statistics over observed events.
//!
//! Counters are individually atomic; a snapshot reads each counter
//! once without pausing ingestion, so the tuple may lag concurrent
//! folds by a bounded amount but never mixes in post-read updates of
//! the same counter.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::event::{HIGH_ENERGY_THRESHOLD_GEV, ParticleEvent};

/// Concurrency-safe running summary of all events folded in.
///
/// `sum`, `max` and `min` are f64 bit patterns stored in `AtomicU64`
/// and updated with compare-exchange loops, so concurrent folds from
/// multiple consumers never take a shared lock.
pub struct EnergyStats {
    count: AtomicU64,
    high_energy_count: AtomicU64,
    sum_bits: AtomicU64,
    max_bits: AtomicU64,
    min_bits: AtomicU64,
    threshold_gev: f64,
}

/// Point-in-time aggregate over all folded events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_events: u64,
    pub avg_energy: f64,
    pub max_energy: f64,
    pub min_energy: f64,
    pub high_energy_count: u64,
}

impl StatsSnapshot {
    /// Defined zero state for an empty population.
    pub const EMPTY: StatsSnapshot = StatsSnapshot {
        total_events: 0,
        avg_energy: 0.0,
        max_energy: 0.0,
        min_energy: 0.0,
        high_energy_count: 0,
    };
}

impl Default for EnergyStats {
    fn default() -> Self {
        Self::new(HIGH_ENERGY_THRESHOLD_GEV)
    }
}

impl EnergyStats {
    /// Create an aggregator with a custom high-energy threshold.
    pub fn new(threshold_gev: f64) -> Self {
        Self {
            count: AtomicU64::new(0),
            high_energy_count: AtomicU64::new(0),
            sum_bits: AtomicU64::new(0.0_f64.to_bits()),
            max_bits: AtomicU64::new(f64::NEG_INFINITY.to_bits()),
            min_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            threshold_gev,
        }
    }

    /// Fold one event into the running summary.
    ///
    /// The count is published last, with release ordering: a snapshot
    /// that observes `count > 0` is guaranteed finite extremes rather
    /// than the infinity sentinels.
    pub fn record(&self, event: &ParticleEvent) {
        let energy = event.energy_gev;
        fetch_update_f64(&self.sum_bits, |sum| sum + energy);
        fetch_update_f64(&self.max_bits, |max| max.max(energy));
        fetch_update_f64(&self.min_bits, |min| min.min(energy));
        if energy >= self.threshold_gev {
            self.high_energy_count.fetch_add(1, Ordering::Relaxed);
        }
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Read a consistent-enough snapshot of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let count = self.count.load(Ordering::Acquire);
        if count == 0 {
            return StatsSnapshot::EMPTY;
        }

        let sum = f64::from_bits(self.sum_bits.load(Ordering::Acquire));
        StatsSnapshot {
            total_events: count,
            avg_energy: sum / count as f64,
            max_energy: f64::from_bits(self.max_bits.load(Ordering::Acquire)),
            min_energy: f64::from_bits(self.min_bits.load(Ordering::Acquire)),
            high_energy_count: self.high_energy_count.load(Ordering::Acquire),
        }
    }
}

impl std::fmt::Debug for EnergyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnergyStats")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Compare-and-swap loop for an f64 stored as bits in an `AtomicU64`.
fn fetch_update_f64(cell: &AtomicU64, update: impl Fn(f64) -> f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = update(f64::from_bits(current)).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => break,
            Err(actual) => current = actual,
        }
    }
}
