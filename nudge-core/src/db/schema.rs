//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: feedback log + learned state documents
    r#"
    -- Suggestion feedback, append-only (bulk-trimmed by id)
    CREATE TABLE IF NOT EXISTS feedback_events (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        action           TEXT NOT NULL,
        task_category    TEXT NOT NULL,
        hour_of_day      INTEGER NOT NULL,
        recorded_at      DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_feedback_events_recorded ON feedback_events(recorded_at);

    -- Learned state, one JSON document per collection
    CREATE TABLE IF NOT EXISTS learning_state (
        key              TEXT PRIMARY KEY,
        value            JSON NOT NULL,
        updated_at       DATETIME NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
