//! Event Ingestion Pipeline
//!
//! Bounded concurrent buffering between producer and consumer pools,
//! with batched persistence and online aggregation:
//!
//! - [`EventBuffer`]: Bounded FIFO queue with backpressure and broadcast shutdown
//! - [`EnergyStats`]: Lock-free running statistics folded by consumers
//! - [`PipelineMonitor`] / [`PipelineStatus`]: Point-in-time health reporting
//! - [`Pipeline`]: Context object owning the worker pools and teardown

mod buffer;
mod consumer;
mod error;
mod monitor;
mod producer;
mod runner;
mod stats;

pub use buffer::EventBuffer;
pub use error::PipelineError;
pub use monitor::{PipelineMonitor, PipelineStatus};
pub use producer::EventGenerator;
pub use runner::{DrainReport, Pipeline};
pub use stats::{EnergyStats, StatsSnapshot};
