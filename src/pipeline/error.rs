//! Pipeline-specific error types.

use thiserror::Error;

/// Errors that can occur in the ingestion pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The buffer was shut down. A termination signal, not a failure:
    /// workers observing it exit cleanly.
    #[error("pipeline closed")]
    Closed,

    /// Persistence failed for a drained batch after retries were
    /// exhausted at shutdown. The events are reported, never silently
    /// dropped.
    #[error("{undelivered} events undelivered after {attempts} attempts")]
    DrainFailure { undelivered: usize, attempts: u32 },
}
