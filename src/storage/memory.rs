//! In-memory reference implementation of the storage port.
//!
//! Mirrors the durable store's semantics exactly (ordering, tie-breaks,
//! statistics) so pipeline and API tests can run without a database
//! file.

use std::cmp::Ordering;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;

use async_trait::async_trait;

use crate::event::{HIGH_ENERGY_THRESHOLD_GEV, ParticleEvent};
use crate::storage::{EventStatistics, EventStore, StorageError};

/// Reference store keeping all events in a `Vec` behind an `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    events: RwLock<Vec<ParticleEvent>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with events, for test fixtures.
    pub fn with_events(events: Vec<ParticleEvent>) -> Self {
        Self {
            events: RwLock::new(events),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of persisted events.
    pub fn len(&self) -> usize {
        self.read_events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_events(&self) -> std::sync::RwLockReadGuard<'_, Vec<ParticleEvent>> {
        self.events.read().expect("memory store lock poisoned")
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_batch(&self, events: &[ParticleEvent]) -> Result<(), StorageError> {
        self.ensure_open()?;
        // Single extend under the write lock: all-or-nothing.
        self.events
            .write()
            .expect("memory store lock poisoned")
            .extend_from_slice(events);
        Ok(())
    }

    async fn query_top_energy(
        &self,
        limit: usize,
        min_energy: f64,
    ) -> Result<Vec<ParticleEvent>, StorageError> {
        self.ensure_open()?;
        let mut matching: Vec<ParticleEvent> = self
            .read_events()
            .iter()
            .filter(|e| e.energy_gev >= min_energy)
            .cloned()
            .collect();

        // Energy descending, ties broken by earliest observation.
        matching.sort_by(|a, b| {
            b.energy_gev
                .partial_cmp(&a.energy_gev)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        matching.truncate(limit);
        Ok(matching)
    }

    async fn count_at_or_above(&self, min_energy: f64) -> Result<u64, StorageError> {
        self.ensure_open()?;
        let count = self
            .read_events()
            .iter()
            .filter(|e| e.energy_gev >= min_energy)
            .count();
        Ok(count as u64)
    }

    async fn statistics(&self) -> Result<EventStatistics, StorageError> {
        self.ensure_open()?;
        let events = self.read_events();
        if events.is_empty() {
            return Ok(EventStatistics::EMPTY);
        }

        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        let mut min = f64::INFINITY;
        let mut high = 0u64;
        for e in events.iter() {
            sum += e.energy_gev;
            max = max.max(e.energy_gev);
            min = min.min(e.energy_gev);
            if e.energy_gev >= HIGH_ENERGY_THRESHOLD_GEV {
                high += 1;
            }
        }

        Ok(EventStatistics {
            total_events: events.len() as u64,
            avg_energy: sum / events.len() as f64,
            max_energy: max,
            min_energy: min,
            high_energy_count: high,
        })
    }

    async fn shutdown(&self) -> Result<(), StorageError> {
        self.closed.store(true, std::sync::atomic::Ordering::Release);
        Ok(())
    }
}
