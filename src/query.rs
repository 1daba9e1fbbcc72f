//! Query façade: validates and clamps caller-supplied parameters
//! before delegating to the storage port.
//!
//! Out-of-range input is corrected silently, never rejected: callers
//! always get a well-formed answer with documented defaults.

use std::sync::Arc;

use crate::event::{HIGH_ENERGY_THRESHOLD_GEV, ParticleEvent};
use crate::storage::{EventStatistics, EventStore, StorageError};

/// Result limit applied when the caller supplies none (or garbage).
pub const DEFAULT_LIMIT: usize = 10;

/// Hard cap on result size regardless of what the caller asks for.
pub const MAX_LIMIT: usize = 100;

/// Minimum-energy filter applied when the caller supplies none.
pub const DEFAULT_MIN_ENERGY_GEV: f64 = HIGH_ENERGY_THRESHOLD_GEV;

/// Clamp a raw limit parameter: absent or non-positive falls back to
/// [`DEFAULT_LIMIT`], anything above [`MAX_LIMIT`] is capped.
pub fn clamp_limit(raw: Option<i64>) -> usize {
    match raw {
        Some(n) if n > 0 => (n as usize).min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}

/// Clamp a raw minimum-energy parameter: absent, negative or NaN falls
/// back to [`DEFAULT_MIN_ENERGY_GEV`]. No upper clamp.
pub fn clamp_min_energy(raw: Option<f64>) -> f64 {
    match raw {
        Some(e) if e >= 0.0 => e,
        _ => DEFAULT_MIN_ENERGY_GEV,
    }
}

/// Thin service layer between the HTTP handlers and the storage port.
#[derive(Clone)]
pub struct EventQueryService {
    store: Arc<dyn EventStore>,
}

impl EventQueryService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Highest-energy events at or above the (clamped) threshold,
    /// energy descending, at most the (clamped) limit.
    pub async fn high_energy_events(
        &self,
        limit: Option<i64>,
        min_energy: Option<f64>,
    ) -> Result<Vec<ParticleEvent>, StorageError> {
        let limit = clamp_limit(limit);
        let min_energy = clamp_min_energy(min_energy);
        self.store.query_top_energy(limit, min_energy).await
    }

    /// Store-side statistics. The storage port is authoritative for
    /// this view; the pipeline's in-memory aggregator serves
    /// monitoring only.
    pub async fn statistics(&self) -> Result<EventStatistics, StorageError> {
        self.store.statistics().await
    }
}

impl std::fmt::Debug for EventQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueryService").finish_non_exhaustive()
    }
}
