//! Producer workers: synthesize detector events and submit them under
//! backpressure.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::event::{ParticleEvent, ParticleKind};
use crate::pipeline::{EventBuffer, PipelineError, PipelineMonitor};

/// Upper bound for synthesized event energies (GeV).
const MAX_SYNTHETIC_ENERGY_GEV: f64 = 200.0;

/// Synthesizes random particle events.
///
/// Energies are uniform over `0..200` GeV so roughly three quarters of
/// generated events clear the 50 GeV high-energy cutoff.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventGenerator;

impl EventGenerator {
    /// Generate one random event.
    pub fn generate(&self) -> ParticleEvent {
        let mut rng = rand::rng();
        let energy = rng.random_range(0.0..MAX_SYNTHETIC_ENERGY_GEV);
        let kind = ParticleKind::ALL[rng.random_range(0..ParticleKind::ALL.len())];
        let flag = rng.random_bool(0.5);
        ParticleEvent::new(energy, kind, flag)
    }
}

/// Run one producer until the pipeline shuts down.
///
/// Backpressure is handled entirely by `submit` suspending on a full
/// buffer; a producer never retries and never drops an event itself.
pub(crate) async fn run_producer(
    id: usize,
    buffer: Arc<EventBuffer>,
    monitor: Arc<PipelineMonitor>,
    interval: Duration,
) {
    let _guard = monitor.producer_guard();
    let generator = EventGenerator;
    tracing::debug!(producer = id, "Producer started");

    loop {
        let event = generator.generate();
        match buffer.submit(event).await {
            Ok(()) => {}
            Err(PipelineError::Closed) => break,
            Err(e) => {
                // submit has no other failure mode; log and stop if one appears.
                tracing::error!(producer = id, error = %e, "Unexpected submit failure");
                break;
            }
        }

        if !interval.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = buffer.closed() => break,
            }
        }
    }

    tracing::debug!(producer = id, "Producer stopped");
}
