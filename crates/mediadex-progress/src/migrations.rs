//! Progress board schema.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

use crate::error::ProgressError;

/// Run all pending migrations.
///
/// The version check and the migrations share one `BEGIN IMMEDIATE`
/// transaction, so processes opening a fresh file at once apply them once.
pub fn run_migrations(conn: &Connection) -> Result<(), ProgressError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| ProgressError::Storage(format!("Failed to begin migrations: {}", e)))?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ProgressError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ProgressError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(&tx)?;
        info!("Applied migration v1: progress_board");
    }

    tx.commit()
        .map_err(|e| ProgressError::Storage(format!("Failed to commit migrations: {}", e)))?;
    Ok(())
}

/// Version 1: the board plus the clock that stamps every write.
fn apply_v1(conn: &Connection) -> Result<(), ProgressError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS progress (
            key         TEXT PRIMARY KEY NOT NULL,
            -- Untyped: other writers may store anything here.
            value,
            generation  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        -- Monotonic across deletes, so a re-created key never reuses a stamp.
        CREATE TABLE IF NOT EXISTS progress_clock (
            id          INTEGER PRIMARY KEY CHECK (id = 1),
            value       INTEGER NOT NULL
        );
        INSERT OR IGNORE INTO progress_clock (id, value) VALUES (1, 0);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'progress_board');
        ",
    )
    .map_err(|e| ProgressError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
