//! Bounded FIFO buffer between producers and consumers.
//!
//! Capacity is tracked by two semaphores (free slots, queued items)
//! around a mutex-guarded deque. `Semaphore::close()` doubles as the
//! broadcast shutdown signal: it wakes every suspended submitter and
//! drainer at once.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Notify, Semaphore};

use crate::event::ParticleEvent;
use crate::pipeline::PipelineError;

/// Bounded, FIFO-ordered, thread-safe queue of pending events.
///
/// Invariant: events submitted minus events drained equals `depth()`
/// at every observable instant. First submitted is first drained.
pub struct EventBuffer {
    queue: Mutex<VecDeque<ParticleEvent>>,
    /// Permits for free capacity. Producers acquire one per submit.
    slots: Semaphore,
    /// Permits for queued events. Consumers acquire one per pop.
    items: Semaphore,
    capacity: usize,
    closed: AtomicBool,
    close_notify: Notify,
    submitted: AtomicU64,
    drained: AtomicU64,
}

impl EventBuffer {
    /// Create a buffer with fixed capacity. Capacity must be at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            slots: Semaphore::new(capacity),
            items: Semaphore::new(0),
            capacity,
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
            submitted: AtomicU64::new(0),
            drained: AtomicU64::new(0),
        }
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, suspending while the buffer is full.
    ///
    /// Returns [`PipelineError::Closed`] once [`close`](Self::close)
    /// has been called; the event is handed back to the caller via the
    /// error path rather than dropped silently.
    pub async fn submit(&self, event: ParticleEvent) -> Result<(), PipelineError> {
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| PipelineError::Closed)?;
        // The slot is transferred to the queued event; it is returned
        // to the semaphore when the event is drained.
        permit.forget();

        self.lock_queue().push_back(event);
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.items.add_permits(1);
        Ok(())
    }

    /// Remove up to `max` events in FIFO order, suspending while empty.
    ///
    /// After shutdown, hands out any remaining buffered events and then
    /// returns an empty vec as the completion signal.
    pub async fn drain_batch(&self, max: usize) -> Vec<ParticleEvent> {
        let max = max.max(1);

        match self.items.acquire().await {
            Ok(permit) => {
                permit.forget();
                let mut queue = self.lock_queue();
                // close() can race this acquire: a drainer that observed
                // the closed semaphore may have emptied the deque while
                // this permit was outstanding. An empty pop here means
                // shutdown stole the event; report completion.
                let Some(first) = queue.pop_front() else {
                    return Vec::new();
                };
                let mut batch = Vec::with_capacity(max.min(queue.len() + 1));
                batch.push(first);
                // One permit per extra event; every pop stays checked
                // because permits are not authoritative once closed.
                while batch.len() < max {
                    match self.items.try_acquire() {
                        Ok(extra) => match queue.pop_front() {
                            Some(event) => {
                                extra.forget();
                                batch.push(event);
                            }
                            None => break,
                        },
                        Err(_) => break,
                    }
                }
                drop(queue);

                self.drained.fetch_add(batch.len() as u64, Ordering::Relaxed);
                if !self.closed.load(Ordering::Acquire) {
                    self.slots.add_permits(batch.len());
                }
                batch
            }
            // Closed: permits are no longer authoritative, drain the
            // deque directly until it is empty.
            Err(_) => {
                let mut queue = self.lock_queue();
                let take = max.min(queue.len());
                let batch: Vec<ParticleEvent> = queue.drain(..take).collect();
                drop(queue);
                self.drained.fetch_add(batch.len() as u64, Ordering::Relaxed);
                batch
            }
        }
    }

    /// Instantaneous queue length. Never blocks.
    pub fn depth(&self) -> usize {
        self.lock_queue().len()
    }

    /// Total events that ever entered the buffer.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Total events drained over the buffer's lifetime.
    pub fn drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }

    /// Broadcast shutdown. Idempotent; wakes all suspended producers
    /// and consumers.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.slots.close();
            self.items.close();
            self.close_notify.notify_waiters();
            tracing::debug!(remaining = self.depth(), "Event buffer closed");
        }
    }

    /// Whether shutdown has been signaled.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once shutdown has been signaled. Used by consumers to
    /// abort retry backoff sleeps.
    pub async fn closed(&self) {
        let notified = self.close_notify.notified();
        tokio::pin!(notified);
        // Register before the flag check so a concurrent close() cannot
        // slip between check and await.
        notified.as_mut().enable();
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<ParticleEvent>> {
        self.queue.lock().expect("event buffer lock poisoned")
    }
}

impl std::fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBuffer")
            .field("capacity", &self.capacity)
            .field("depth", &self.depth())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
