//! The storage port: abstract persistence/query contract.

use async_trait::async_trait;
use serde::Serialize;

use crate::event::ParticleEvent;
use crate::storage::StorageError;

/// Aggregate snapshot computed over persisted events.
///
/// May diverge from the pipeline's in-memory aggregator by at most the
/// batches currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatistics {
    pub total_events: u64,
    pub avg_energy: f64,
    pub max_energy: f64,
    pub min_energy: f64,
    pub high_energy_count: u64,
}

impl EventStatistics {
    /// Defined zero state for an empty store.
    pub const EMPTY: EventStatistics = EventStatistics {
        total_events: 0,
        avg_energy: 0.0,
        max_energy: 0.0,
        min_energy: 0.0,
        high_energy_count: 0,
    };
}

/// Persistence boundary for particle events.
///
/// Implementations own their internal concurrency discipline; every
/// method is safe to call concurrently from multiple consumers.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Persist all given events as a unit.
    ///
    /// Atomic: on failure no partial rows are observable through the
    /// store's own counting or statistics methods.
    async fn insert_batch(&self, events: &[ParticleEvent]) -> Result<(), StorageError>;

    /// Events with `energy_gev >= min_energy`, ordered by energy
    /// descending, ties broken by earliest timestamp, truncated to
    /// `limit`.
    async fn query_top_energy(
        &self,
        limit: usize,
        min_energy: f64,
    ) -> Result<Vec<ParticleEvent>, StorageError>;

    /// Count of persisted events with `energy_gev >= min_energy`.
    async fn count_at_or_above(&self, min_energy: f64) -> Result<u64, StorageError>;

    /// Store-side aggregate snapshot over persisted events.
    async fn statistics(&self) -> Result<EventStatistics, StorageError>;

    /// Depth of any internal write queue, for status reporting.
    /// `None` when the store does not buffer writes.
    fn queue_depth_hint(&self) -> Option<usize> {
        None
    }

    /// Release all resources. Idempotent.
    async fn shutdown(&self) -> Result<(), StorageError>;
}
