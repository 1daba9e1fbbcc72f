//! Database schema definitions.

use duckdb::Connection;

use crate::storage::StorageError;

/// SQL statement for creating the particle type enum.
pub const PARTICLE_TYPE_ENUM_DDL: &str = r#"
CREATE TYPE IF NOT EXISTS particle_type_enum AS ENUM (
    'ELECTRON', 'POSITRON', 'MUON', 'PHOTON', 'PROTON', 'NEUTRINO'
);
"#;

/// SQL statement for creating the particle_events table.
///
/// Timestamps are stored as epoch microseconds for prepared statement
/// compatibility; event ids as canonical UUID strings.
pub const PARTICLE_EVENTS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS particle_events (
    event_id      VARCHAR PRIMARY KEY,
    ts            BIGINT NOT NULL,
    energy_gev    DOUBLE NOT NULL,
    particle_type particle_type_enum NOT NULL,
    flag          BOOLEAN NOT NULL
);
"#;

/// Initialize the database schema.
///
/// Creates the enum and table if they don't exist.
pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(PARTICLE_TYPE_ENUM_DDL)?;
    conn.execute_batch(PARTICLE_EVENTS_TABLE_DDL)?;

    tracing::info!("Database schema initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_initialization() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'particle_events'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_enum_rejects_unknown_particle() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO particle_events (event_id, ts, energy_gev, particle_type, flag)
             VALUES ('id-1', 0, 1.0, 'TACHYON', false)",
            [],
        );
        assert!(result.is_err());
    }
}
