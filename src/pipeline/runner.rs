//! Pipeline context: construction, worker pools, and teardown.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::pipeline::consumer::run_consumer;
use crate::pipeline::producer::run_producer;
use crate::pipeline::{EnergyStats, EventBuffer, PipelineMonitor};
use crate::storage::EventStore;

/// Outcome of a pipeline shutdown.
///
/// `undelivered_events` is non-zero only when a consumer exhausted its
/// retries against a failing store; those events were reported, never
/// silently lost.
#[derive(Debug, Clone, Copy)]
pub struct DrainReport {
    pub submitted: u64,
    pub drained: u64,
    pub undelivered_events: u64,
    pub drain_failures: u64,
}

impl DrainReport {
    /// Whether every drained event was persisted.
    pub fn is_clean(&self) -> bool {
        self.undelivered_events == 0
    }
}

/// Explicit context object owning all mutable pipeline state.
///
/// Constructed at startup via [`Pipeline::start`], torn down via
/// [`Pipeline::shutdown`]; nothing here is ambient or global.
pub struct Pipeline {
    buffer: Arc<EventBuffer>,
    stats: Arc<EnergyStats>,
    monitor: Arc<PipelineMonitor>,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawn producer and consumer pools against the given store.
    pub fn start(config: &PipelineConfig, store: Arc<dyn EventStore>) -> Self {
        let buffer = Arc::new(EventBuffer::new(config.buffer_capacity));
        let stats = Arc::new(EnergyStats::default());
        let monitor = Arc::new(PipelineMonitor::new(Arc::clone(&buffer)));

        // A batch larger than the buffer can never fill; clamp it.
        let batch_size = config.batch_size.clamp(1, buffer.capacity());

        let mut workers = Vec::with_capacity(config.producers + config.consumers);
        for id in 0..config.producers {
            workers.push(tokio::spawn(run_producer(
                id,
                Arc::clone(&buffer),
                Arc::clone(&monitor),
                config.produce_interval,
            )));
        }
        for id in 0..config.consumers {
            workers.push(tokio::spawn(run_consumer(
                id,
                Arc::clone(&buffer),
                Arc::clone(&store),
                Arc::clone(&stats),
                Arc::clone(&monitor),
                batch_size,
            )));
        }

        tracing::info!(
            producers = config.producers,
            consumers = config.consumers,
            buffer_capacity = buffer.capacity(),
            batch_size,
            "Pipeline started"
        );

        Self {
            buffer,
            stats,
            monitor,
            workers,
        }
    }

    /// Health reporter handle, shared with the HTTP layer.
    pub fn monitor(&self) -> Arc<PipelineMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Running aggregator handle.
    pub fn stats(&self) -> Arc<EnergyStats> {
        Arc::clone(&self.stats)
    }

    /// The shared ingestion buffer.
    pub fn buffer(&self) -> Arc<EventBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Broadcast shutdown, wait for every worker to finish, and report
    /// the final accounting.
    ///
    /// Producers stop on the closed signal; consumers drain and persist
    /// whatever remains buffered before exiting.
    pub async fn shutdown(self) -> DrainReport {
        self.buffer.close();

        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Pipeline worker panicked");
            }
        }

        let status = self.monitor.status();
        let report = DrainReport {
            submitted: self.buffer.submitted(),
            drained: self.buffer.drained(),
            undelivered_events: status.undelivered_events,
            drain_failures: status.drain_failures,
        };

        let summary = self.stats.snapshot();
        tracing::info!(
            submitted = report.submitted,
            drained = report.drained,
            undelivered = report.undelivered_events,
            total_events = summary.total_events,
            avg_energy = summary.avg_energy,
            "Pipeline shut down"
        );

        report
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("workers", &self.workers.len())
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            buffer_capacity: 64,
            batch_size: 8,
            producers: 2,
            consumers: 2,
            produce_interval: Duration::from_millis(1),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pipeline_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = Pipeline::start(&test_config(), store.clone() as Arc<dyn EventStore>);

        // Let the pools run for a while.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let status = pipeline.monitor().status();
        assert_eq!(status.active_producers, 2);
        assert_eq!(status.active_consumers, 2);
        assert!(status.storage_healthy);

        let stats = pipeline.stats();
        let report = pipeline.shutdown().await;

        // Conservation: everything submitted was drained and, with a
        // healthy store, everything drained was persisted and folded.
        assert!(report.submitted > 0);
        assert_eq!(report.submitted, report.drained);
        assert!(report.is_clean());
        assert_eq!(store.len() as u64, report.drained);
        assert_eq!(stats.snapshot().total_events, report.drained);
    }

    #[tokio::test]
    async fn test_batch_size_clamped_to_capacity() {
        let config = PipelineConfig {
            buffer_capacity: 4,
            batch_size: 100,
            producers: 1,
            consumers: 1,
            produce_interval: Duration::from_millis(1),
        };
        let store = Arc::new(MemoryStore::new());
        let pipeline = Pipeline::start(&config, store as Arc<dyn EventStore>);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let report = pipeline.shutdown().await;
        assert_eq!(report.submitted, report.drained);
    }

    #[tokio::test]
    async fn test_shutdown_with_idle_pipeline() {
        let config = PipelineConfig {
            producers: 0,
            consumers: 1,
            ..test_config()
        };
        let store = Arc::new(MemoryStore::new());
        let pipeline = Pipeline::start(&config, store as Arc<dyn EventStore>);

        let report = pipeline.shutdown().await;
        assert_eq!(report.submitted, 0);
        assert_eq!(report.drained, 0);
        assert!(report.is_clean());
    }
}
