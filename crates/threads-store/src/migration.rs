//! Schema migration system.
//!
//! Migrations are static SQL strings keyed by version number. Applied
//! versions are recorded in `_migrations`, so running them again is a no-op.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    /// Strictly increasing (1, 2, 3, ...).
    version: u32,
    description: &'static str,
    /// May contain multiple statements separated by `;`.
    sql: &'static str,
}

/// All migrations in order. Append new ones at the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "users and threads",
        sql: r#"
            CREATE TABLE users (
                storage_key TEXT PRIMARY KEY,
                id          TEXT NOT NULL UNIQUE,
                username    TEXT NOT NULL UNIQUE,
                name        TEXT NOT NULL,
                bio         TEXT NOT NULL DEFAULT '',
                image       TEXT NOT NULL DEFAULT '',
                onboarded   BOOLEAN NOT NULL DEFAULT 0,
                created_at  INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );
            CREATE INDEX idx_users_created ON users(created_at);

            CREATE TABLE threads (
                id          TEXT PRIMARY KEY,
                author_key  TEXT NOT NULL REFERENCES users(storage_key),
                text        TEXT NOT NULL,
                parent_id   TEXT REFERENCES threads(id),
                created_at  INTEGER NOT NULL
            );
            CREATE INDEX idx_threads_author ON threads(author_key);
            CREATE INDEX idx_threads_parent ON threads(parent_id);
        "#,
    },
];

/// Apply every migration newer than the recorded version.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        if let Err(err) = apply(conn, migration) {
            warn!(version = migration.version, %err, "migration rolled back");
            return Err(err);
        }
    }

    Ok(())
}

/// Return the latest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to read current version: {e}"),
    })
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })
}

/// Run one migration and record it, atomically. Dropping the transaction
/// on any error rolls the schema change back.
fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );
    let failed = |step: &str, e: rusqlite::Error| StoreError::Migration {
        version: migration.version,
        message: format!("{step}: {e}"),
    };

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| failed("begin", e))?;
    tx.execute_batch(migration.sql)
        .map_err(|e| failed("schema", e))?;
    tx.execute(
        "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.version,
            migration.description,
            chrono::Utc::now().timestamp()
        ],
    )
    .map_err(|e| failed("record", e))?;
    tx.commit().map_err(|e| failed("commit", e))
}

// ── tests ────────────────────────────────────────────────────────────
