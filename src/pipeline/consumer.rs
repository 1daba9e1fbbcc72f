//! Consumer workers: drain batches, persist them, fold statistics.

use std::sync::Arc;
use std::time::Duration;

use crate::event::ParticleEvent;
use crate::pipeline::{EnergyStats, EventBuffer, PipelineError, PipelineMonitor};
use crate::storage::EventStore;

/// Initial retry delay after a failed batch insert.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Upper bound for exponential retry backoff.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Further insert attempts allowed per batch once shutdown has been
/// signaled, before the batch is surfaced as a drain failure.
const MAX_SHUTDOWN_ATTEMPTS: u32 = 3;

/// Run one consumer until the buffer is closed and drained.
///
/// Each cycle drains up to `batch_size` events, persists them through
/// the store, then folds them into the aggregator. A failed insert is
/// retried with the same batch under exponential backoff; the events
/// are held here, never returned to the buffer and never dropped
/// silently.
pub(crate) async fn run_consumer(
    id: usize,
    buffer: Arc<EventBuffer>,
    store: Arc<dyn EventStore>,
    stats: Arc<EnergyStats>,
    monitor: Arc<PipelineMonitor>,
    batch_size: usize,
) {
    let _guard = monitor.consumer_guard();
    tracing::debug!(consumer = id, "Consumer started");

    loop {
        let batch = buffer.drain_batch(batch_size).await;
        if batch.is_empty() {
            // Shutdown signaled and the buffer is fully drained.
            break;
        }

        match persist_with_retry(id, &batch, &store, &buffer, &monitor).await {
            Ok(()) => {
                for event in &batch {
                    stats.record(event);
                }
            }
            Err(PipelineError::DrainFailure {
                undelivered,
                attempts,
            }) => {
                monitor.record_drain_failure(undelivered);
                tracing::error!(
                    consumer = id,
                    undelivered,
                    attempts,
                    "Batch undelivered at shutdown"
                );
            }
            Err(e) => {
                tracing::error!(consumer = id, error = %e, "Unexpected persistence outcome");
            }
        }
    }

    tracing::debug!(consumer = id, "Consumer stopped");
}

/// Persist one batch, retrying the same events until success.
///
/// While the pipeline is running, retries continue indefinitely with
/// capped exponential backoff and the backoff sleep aborts early on
/// shutdown. Once shutdown is signaled, a bounded number of further
/// attempts is made before the batch is reported undelivered.
async fn persist_with_retry(
    id: usize,
    batch: &[ParticleEvent],
    store: &Arc<dyn EventStore>,
    buffer: &Arc<EventBuffer>,
    monitor: &Arc<PipelineMonitor>,
) -> Result<(), PipelineError> {
    let mut attempts: u32 = 0;
    let mut shutdown_attempts: u32 = 0;
    let mut delay = RETRY_BASE_DELAY;

    loop {
        attempts += 1;
        match store.insert_batch(batch).await {
            Ok(()) => {
                if attempts > 1 {
                    tracing::info!(consumer = id, attempts, "Batch persisted after retry");
                }
                monitor.set_storage_healthy(true);
                return Ok(());
            }
            Err(e) => {
                monitor.set_storage_healthy(false);
                tracing::warn!(
                    consumer = id,
                    attempts,
                    batch_len = batch.len(),
                    error = %e,
                    "Batch insert failed, will retry"
                );

                if buffer.is_closed() {
                    shutdown_attempts += 1;
                    if shutdown_attempts >= MAX_SHUTDOWN_ATTEMPTS {
                        return Err(PipelineError::DrainFailure {
                            undelivered: batch.len(),
                            attempts,
                        });
                    }
                    tokio::time::sleep(delay).await;
                } else {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = buffer.closed() => {}
                    }
                }
                delay = (delay * 2).min(RETRY_MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ParticleKind;
    use crate::storage::{MemoryStore, StorageError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn event(energy: f64) -> ParticleEvent {
        ParticleEvent::new(energy, ParticleKind::Photon, false)
    }

    /// Store that fails the first `failures` insert attempts.
    struct FlakyStore {
        inner: MemoryStore,
        remaining_failures: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                remaining_failures: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl EventStore for FlakyStore {
        async fn insert_batch(&self, events: &[ParticleEvent]) -> Result<(), StorageError> {
            let remaining = self.remaining_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::Internal("injected failure".to_string()));
            }
            self.inner.insert_batch(events).await
        }

        async fn query_top_energy(
            &self,
            limit: usize,
            min_energy: f64,
        ) -> Result<Vec<ParticleEvent>, StorageError> {
            self.inner.query_top_energy(limit, min_energy).await
        }

        async fn count_at_or_above(&self, min_energy: f64) -> Result<u64, StorageError> {
            self.inner.count_at_or_above(min_energy).await
        }

        async fn statistics(&self) -> Result<crate::storage::EventStatistics, StorageError> {
            self.inner.statistics().await
        }

        async fn shutdown(&self) -> Result<(), StorageError> {
            self.inner.shutdown().await
        }
    }

    fn pipeline_parts() -> (Arc<EventBuffer>, Arc<EnergyStats>, Arc<PipelineMonitor>) {
        let buffer = Arc::new(EventBuffer::new(64));
        let stats = Arc::new(EnergyStats::default());
        let monitor = Arc::new(PipelineMonitor::new(Arc::clone(&buffer)));
        (buffer, stats, monitor)
    }

    #[tokio::test]
    async fn test_consumer_persists_and_folds() {
        let (buffer, stats, monitor) = pipeline_parts();
        let store = Arc::new(MemoryStore::new());

        for i in 0..10 {
            buffer.submit(event(50.0 + f64::from(i))).await.unwrap();
        }
        buffer.close();

        run_consumer(
            0,
            Arc::clone(&buffer),
            store.clone() as Arc<dyn EventStore>,
            Arc::clone(&stats),
            Arc::clone(&monitor),
            4,
        )
        .await;

        assert_eq!(store.len(), 10);
        assert_eq!(stats.snapshot().total_events, 10);
        assert!(monitor.storage_healthy());
        assert_eq!(monitor.status().undelivered_events, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consumer_retries_same_batch() {
        let (buffer, stats, monitor) = pipeline_parts();
        let store = Arc::new(FlakyStore::new(2));

        for i in 0..4 {
            buffer.submit(event(60.0 + f64::from(i))).await.unwrap();
        }
        buffer.close();

        run_consumer(
            0,
            Arc::clone(&buffer),
            store.clone() as Arc<dyn EventStore>,
            Arc::clone(&stats),
            Arc::clone(&monitor),
            8,
        )
        .await;

        // All events eventually land exactly once despite two failures.
        assert_eq!(store.inner.len(), 4);
        assert_eq!(stats.snapshot().total_events, 4);
        assert!(monitor.storage_healthy());
        assert_eq!(monitor.status().drain_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_reported_not_lost() {
        let (buffer, stats, monitor) = pipeline_parts();
        // More failures than the shutdown attempt budget allows.
        let store = Arc::new(FlakyStore::new(u32::MAX));

        for i in 0..5 {
            buffer.submit(event(70.0 + f64::from(i))).await.unwrap();
        }
        buffer.close();

        run_consumer(
            0,
            Arc::clone(&buffer),
            store as Arc<dyn EventStore>,
            Arc::clone(&stats),
            Arc::clone(&monitor),
            8,
        )
        .await;

        let status = monitor.status();
        assert!(!status.storage_healthy);
        assert_eq!(status.drain_failures, 1);
        assert_eq!(status.undelivered_events, 5);
        // Undelivered events are not folded into the aggregator.
        assert_eq!(stats.snapshot().total_events, 0);
        // Conservation still closes: drained == submitted, with the
        // shortfall accounted for by the drain-failure report.
        assert_eq!(buffer.drained(), buffer.submitted());
    }

    #[tokio::test]
    async fn test_storage_health_recovers_after_retry() {
        let (buffer, stats, monitor) = pipeline_parts();
        let store = Arc::new(FlakyStore::new(1));

        buffer.submit(event(90.0)).await.unwrap();
        buffer.close();

        run_consumer(
            0,
            Arc::clone(&buffer),
            store as Arc<dyn EventStore>,
            stats,
            Arc::clone(&monitor),
            4,
        )
        .await;

        assert!(monitor.storage_healthy());
    }
}
