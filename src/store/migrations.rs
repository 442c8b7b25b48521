//! Schema of the SQLite store, applied in numbered steps on open.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Bring the database up to [`SCHEMA_VERSION`].
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = schema_version(conn)?;
    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    tracing::info!(from = current_version, to = SCHEMA_VERSION, "Database schema upgraded");
    Ok(())
}

/// Highest applied version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to inspect schema")?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .optional()
        .context("Failed to read schema version")?
        .flatten();

    Ok(version.unwrap_or(0))
}

/// Reports and prompts. Metrics and advice are JSON documents; `score` is
/// copied out of the metrics so it can be queried without parsing.
fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Running database migration v1");

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS reports (
            id TEXT PRIMARY KEY NOT NULL,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            audio_key TEXT NOT NULL,
            transcript TEXT NOT NULL,
            prompt_text TEXT,
            metrics TEXT NOT NULL,
            score REAL NOT NULL,
            advice TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reports_owner_created
            ON reports(owner_id, created_at);

        CREATE TABLE IF NOT EXISTS prompts (
            id TEXT PRIMARY KEY NOT NULL,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .context("Failed to create v1 schema")?;

    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", params![1])
        .context("Failed to record schema version 1")?;

    Ok(())
}
