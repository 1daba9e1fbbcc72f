//! Storage Layer
//!
//! Persistence boundary for particle events:
//!
//! - [`EventStore`]: Abstract batch-insert/query contract (the storage port)
//! - [`DuckDbStore`]: Durable DuckDB-backed implementation with a
//!   single-writer connection and an r2d2 read pool
//! - [`MemoryStore`]: In-memory reference implementation used by tests
//! - [`EventStatistics`]: Store-side aggregate snapshot

mod duck;
mod error;
mod memory;
mod schema;
mod store;

pub use duck::DuckDbStore;
pub use error::StorageError;
pub use memory::MemoryStore;
pub use store::{EventStatistics, EventStore};
