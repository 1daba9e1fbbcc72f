//! DuckDB-backed implementation of the storage port.
//!
//! Single-writer discipline: one mutex-guarded connection performs all
//! inserts (each batch in its own transaction), while reads go through
//! an r2d2 connection pool sized to available parallelism.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::DateTime;
use duckdb::{Connection, DuckdbConnectionManager};
use r2d2::Pool;
use uuid::Uuid;

use crate::event::{HIGH_ENERGY_THRESHOLD_GEV, ParticleEvent, ParticleKind};
use crate::storage::schema::init_schema;
use crate::storage::{EventStatistics, EventStore, StorageError};

/// Minimum read pool size.
const MIN_POOL_SIZE: u32 = 2;

/// Maximum read pool size.
const MAX_POOL_SIZE: u32 = 16;

/// Read pool size from available CPU parallelism, clamped.
fn default_pool_size() -> u32 {
    std::thread::available_parallelism()
        .map(|p| (p.get() as u32).clamp(MIN_POOL_SIZE, MAX_POOL_SIZE))
        .unwrap_or(4)
}

/// Durable particle event store on a DuckDB file.
pub struct DuckDbStore {
    writer: Mutex<Connection>,
    read_pool: Pool<DuckdbConnectionManager>,
    db_path: PathBuf,
    closed: AtomicBool,
}

impl DuckDbStore {
    /// Open (or create) a database file with a default-sized read pool.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_pool_size(db_path, default_pool_size())
    }

    /// Open with an explicit read pool size.
    pub fn open_with_pool_size(
        db_path: impl AsRef<Path>,
        pool_size: u32,
    ) -> Result<Self, StorageError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Internal(format!(
                    "failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let writer = Connection::open(&db_path)?;
        init_schema(&writer)?;

        let manager = DuckdbConnectionManager::file(&db_path)?;
        let read_pool = Pool::builder().max_size(pool_size).build(manager)?;

        tracing::info!(path = %db_path.display(), pool_size, "DuckDB store opened");
        Ok(Self {
            writer: Mutex::new(writer),
            read_pool,
            db_path,
            closed: AtomicBool::new(false),
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore")
            .field("path", &self.db_path)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Raw row shape pulled from DuckDB before domain conversion.
type EventRow = (String, i64, f64, String, bool);

fn row_to_event(row: EventRow) -> Result<ParticleEvent, StorageError> {
    let (id, ts, energy, kind, flag) = row;
    Ok(ParticleEvent {
        event_id: Uuid::from_str(&id)
            .map_err(|e| StorageError::InvalidData(format!("bad event id '{id}': {e}")))?,
        timestamp: DateTime::from_timestamp_micros(ts)
            .ok_or_else(|| StorageError::InvalidData(format!("bad timestamp {ts}")))?,
        energy_gev: energy,
        particle_type: ParticleKind::from_str(&kind)
            .map_err(|_| StorageError::InvalidData(format!("unknown particle type '{kind}'")))?,
        flag,
    })
}

#[async_trait]
impl EventStore for DuckDbStore {
    async fn insert_batch(&self, events: &[ParticleEvent]) -> Result<(), StorageError> {
        self.ensure_open()?;
        if events.is_empty() {
            return Ok(());
        }

        let mut conn = self.writer.lock().expect("writer lock poisoned");
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO particle_events (event_id, ts, energy_gev, particle_type, flag)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for event in events {
                stmt.execute(duckdb::params![
                    event.event_id.to_string(),
                    event.timestamp.timestamp_micros(),
                    event.energy_gev,
                    event.particle_type.as_ref(),
                    event.flag,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(count = events.len(), "Event batch inserted");
        Ok(())
    }

    async fn query_top_energy(
        &self,
        limit: usize,
        min_energy: f64,
    ) -> Result<Vec<ParticleEvent>, StorageError> {
        self.ensure_open()?;
        let conn = self.read_pool.get()?;

        let mut stmt = conn.prepare_cached(
            "SELECT event_id, ts, energy_gev, particle_type::VARCHAR, flag
             FROM particle_events
             WHERE energy_gev >= ?
             ORDER BY energy_gev DESC, ts ASC
             LIMIT ?",
        )?;
        let rows = stmt.query_map(duckdb::params![min_energy, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, bool>(4)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row_to_event(row?)?);
        }
        Ok(events)
    }

    async fn count_at_or_above(&self, min_energy: f64) -> Result<u64, StorageError> {
        self.ensure_open()?;
        let conn = self.read_pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM particle_events WHERE energy_gev >= ?",
            [min_energy],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn statistics(&self) -> Result<EventStatistics, StorageError> {
        self.ensure_open()?;
        let conn = self.read_pool.get()?;

        let (count, avg, max, min, high): (i64, Option<f64>, Option<f64>, Option<f64>, i64) = conn
            .query_row(
                "SELECT COUNT(*),
                        AVG(energy_gev),
                        MAX(energy_gev),
                        MIN(energy_gev),
                        COUNT(*) FILTER (WHERE energy_gev >= ?)
                 FROM particle_events",
                [HIGH_ENERGY_THRESHOLD_GEV],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )?;

        if count == 0 {
            return Ok(EventStatistics::EMPTY);
        }
        Ok(EventStatistics {
            total_events: count as u64,
            avg_energy: avg.unwrap_or(0.0),
            max_energy: max.unwrap_or(0.0),
            min_energy: min.unwrap_or(0.0),
            high_energy_count: high as u64,
        })
    }

    async fn shutdown(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute_batch("CHECKPOINT;")?;
        tracing::info!("DuckDB store shut down");
        Ok(())
    }
}
