//! Local SQLite database backing the persistent key-value store.
//!
//! Uses rusqlite with WAL mode. Provides schema migrations, the raw
//! `kv_store` helpers and the shared connection state used by
//! [`crate::storage::SqliteStore`].

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{OfflineError, Result};

/// Database connection shared by every store handle.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 1;

const DB_FILE_NAME: &str = "offline.db";

/// Initialize the database at `{data_dir}/offline.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. An open failure is returned as-is;
/// only a file SQLite reports as corrupt or not a database is moved aside
/// (never deleted) before a single retry.
pub fn init(data_dir: &Path) -> Result<DbState> {
    fs::create_dir_all(data_dir)
        .map_err(|e| OfflineError::Storage(format!("Failed to create data dir: {e}")))?;

    let db_path = data_dir.join(DB_FILE_NAME);
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(e) if is_corruption(&e) => {
            let aside = quarantine(&db_path)?;
            warn!(
                "Database at {} is unreadable ({e}); moved to {} and starting fresh",
                db_path.display(),
                aside.display()
            );
            open_and_configure(&db_path).map_err(|e| {
                OfflineError::Storage(format!("Database open failed after quarantine: {e}"))
            })?
        }
        Err(e) => {
            error!("Database open failed: {e}");
            return Err(OfflineError::Storage(format!("Database open failed: {e}")));
        }
    };

    run_migrations(&conn).map_err(OfflineError::Storage)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

fn is_corruption(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

/// Rename the database file and its WAL/SHM companions to
/// `offline.db.corrupt-{unix_millis}*`. Returns the new main file path.
fn quarantine(db_path: &Path) -> Result<PathBuf> {
    let suffix = format!("corrupt-{}", Utc::now().timestamp_millis());
    let aside = db_path.with_extension(format!("db.{suffix}"));

    fs::rename(db_path, &aside).map_err(|e| {
        OfflineError::Storage(format!("Failed to move corrupt database aside: {e}"))
    })?;
    for companion in ["wal", "shm"] {
        let from = db_path.with_extension(format!("db-{companion}"));
        if from.exists() {
            let to = db_path.with_extension(format!("db.{suffix}-{companion}"));
            if let Err(e) = fs::rename(&from, &to) {
                warn!("Failed to move {} aside: {e}", from.display());
            }
        }
    }
    Ok(aside)
}

/// Open a migrated in-memory database. Nothing survives the process.
pub fn open_in_memory() -> Result<DbState> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    run_migrations(&conn).map_err(OfflineError::Storage)?;

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;

    Ok(conn)
}

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )
    .map_err(|e| format!("create schema_version: {e}"))?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Migration v1: single-key value table.
fn migrate_v1(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now'))
        );

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )
    .map_err(|e| {
        error!("Migration v1 failed: {e}");
        format!("migration v1: {e}")
    })?;

    info!("Applied migration v1");
    Ok(())
}

// ---------------------------------------------------------------------------
// Key-value helpers
// ---------------------------------------------------------------------------

/// Read the value stored under `key`.
pub fn kv_get(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

/// Insert or replace the value stored under `key`. A single statement, so
/// the previous value is either fully kept or fully replaced.
pub fn kv_set(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
