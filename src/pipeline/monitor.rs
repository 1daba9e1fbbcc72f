//! Point-in-time pipeline health reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::pipeline::EventBuffer;

/// Read-only composite view of pipeline health.
///
/// Never blocks: every field is an atomic read or a non-blocking
/// buffer probe, recomputed on each call.
pub struct PipelineMonitor {
    buffer: Arc<EventBuffer>,
    active_producers: AtomicUsize,
    active_consumers: AtomicUsize,
    /// True unless the most recent store operation failed and has not
    /// yet succeeded on retry.
    storage_healthy: AtomicBool,
    drain_failures: AtomicU64,
    undelivered_events: AtomicU64,
}

/// Snapshot returned by [`PipelineMonitor::status`].
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub buffer_depth: usize,
    pub active_producers: usize,
    pub active_consumers: usize,
    pub storage_healthy: bool,
    pub drain_failures: u64,
    pub undelivered_events: u64,
}

impl PipelineMonitor {
    pub(crate) fn new(buffer: Arc<EventBuffer>) -> Self {
        Self {
            buffer,
            active_producers: AtomicUsize::new(0),
            active_consumers: AtomicUsize::new(0),
            storage_healthy: AtomicBool::new(true),
            drain_failures: AtomicU64::new(0),
            undelivered_events: AtomicU64::new(0),
        }
    }

    /// Current health snapshot.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            buffer_depth: self.buffer.depth(),
            active_producers: self.active_producers.load(Ordering::Relaxed),
            active_consumers: self.active_consumers.load(Ordering::Relaxed),
            storage_healthy: self.storage_healthy.load(Ordering::Relaxed),
            drain_failures: self.drain_failures.load(Ordering::Relaxed),
            undelivered_events: self.undelivered_events.load(Ordering::Relaxed),
        }
    }

    pub fn storage_healthy(&self) -> bool {
        self.storage_healthy.load(Ordering::Relaxed)
    }

    pub(crate) fn set_storage_healthy(&self, healthy: bool) {
        self.storage_healthy.store(healthy, Ordering::Relaxed);
    }

    pub(crate) fn record_drain_failure(&self, undelivered: usize) {
        self.drain_failures.fetch_add(1, Ordering::Relaxed);
        self.undelivered_events
            .fetch_add(undelivered as u64, Ordering::Relaxed);
    }

    pub(crate) fn producer_guard(self: &Arc<Self>) -> WorkerGuard {
        self.active_producers.fetch_add(1, Ordering::Relaxed);
        WorkerGuard {
            monitor: Arc::clone(self),
            kind: WorkerKind::Producer,
        }
    }

    pub(crate) fn consumer_guard(self: &Arc<Self>) -> WorkerGuard {
        self.active_consumers.fetch_add(1, Ordering::Relaxed);
        WorkerGuard {
            monitor: Arc::clone(self),
            kind: WorkerKind::Consumer,
        }
    }
}

impl std::fmt::Debug for PipelineMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMonitor")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy)]
enum WorkerKind {
    Producer,
    Consumer,
}

/// RAII liveness marker: counts a worker as active for its lifetime,
/// including panic unwinds.
pub(crate) struct WorkerGuard {
    monitor: Arc<PipelineMonitor>,
    kind: WorkerKind,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        let counter = match self.kind {
            WorkerKind::Producer => &self.monitor.active_producers,
            WorkerKind::Consumer => &self.monitor.active_consumers,
        };
        counter.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status() {
        let monitor = Arc::new(PipelineMonitor::new(Arc::new(EventBuffer::new(8))));
        let status = monitor.status();

        assert_eq!(status.buffer_depth, 0);
        assert_eq!(status.active_producers, 0);
        assert_eq!(status.active_consumers, 0);
        assert!(status.storage_healthy);
        assert_eq!(status.drain_failures, 0);
    }

    #[test]
    fn test_worker_guards_track_liveness() {
        let monitor = Arc::new(PipelineMonitor::new(Arc::new(EventBuffer::new(8))));

        let p1 = monitor.producer_guard();
        let p2 = monitor.producer_guard();
        let c1 = monitor.consumer_guard();
        assert_eq!(monitor.status().active_producers, 2);
        assert_eq!(monitor.status().active_consumers, 1);

        drop(p1);
        drop(c1);
        assert_eq!(monitor.status().active_producers, 1);
        assert_eq!(monitor.status().active_consumers, 0);
        drop(p2);
        assert_eq!(monitor.status().active_producers, 0);
    }

    #[test]
    fn test_storage_health_toggles() {
        let monitor = Arc::new(PipelineMonitor::new(Arc::new(EventBuffer::new(8))));
        assert!(monitor.storage_healthy());

        monitor.set_storage_healthy(false);
        assert!(!monitor.status().storage_healthy);
        monitor.set_storage_healthy(true);
        assert!(monitor.status().storage_healthy);
    }

    #[test]
    fn test_drain_failure_accounting() {
        let monitor = Arc::new(PipelineMonitor::new(Arc::new(EventBuffer::new(8))));
        monitor.record_drain_failure(12);
        monitor.record_drain_failure(3);

        let status = monitor.status();
        assert_eq!(status.drain_failures, 2);
        assert_eq!(status.undelivered_events, 15);
    }
}
