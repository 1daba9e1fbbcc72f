//! Collider - Particle Event Pipeline
//!
//! This crate provides the core functionality for the Collider ingestion
//! and aggregation system. It can be used as a library by other Rust
//! projects, or run as a standalone binary with the `collider` executable.
//!
//! # Architecture
//!
//! - **Pipeline**: Bounded producer/consumer stages generating and batching
//!   simulated particle events, with a lock-free running aggregator
//! - **Storage**: DuckDB-based persistence layer behind a swappable port
//! - **Query**: Parameter-clamping façade for the read API
//! - **Server**: REST API for high-energy queries, statistics and status
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use collider::{
//!     config::AppConfig,
//!     pipeline::Pipeline,
//!     storage::{DuckDbStore, EventStore},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load("configs/config.yaml")?;
//!     let store: Arc<dyn EventStore> = Arc::new(DuckDbStore::open(&config.database.path)?);
//!
//!     let pipeline = Pipeline::start(&config.pipeline, Arc::clone(&store));
//!     // ... serve the API ...
//!     let report = pipeline.shutdown().await;
//!     assert!(report.is_clean());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod event;
pub mod pipeline;
pub mod query;
pub mod server;
pub mod storage;

pub use config::AppConfig;
pub use event::{HIGH_ENERGY_THRESHOLD_GEV, ParticleEvent, ParticleKind};
pub use pipeline::{DrainReport, Pipeline, PipelineMonitor, PipelineStatus};
pub use query::EventQueryService;
pub use storage::{DuckDbStore, EventStatistics, EventStore, MemoryStore, StorageError};
