//! Local SQLite database layer for the ordering kiosk.
//!
//! Uses rusqlite with WAL mode. Everything the kiosk must remember across a
//! reload lives here: JSON state slots (cart snapshot, previous-orders
//! history, cached menu), the order outbox, and local settings. Provides
//! schema migrations and the shared connection state.

use rusqlite::{params, Connection};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Shared database state. The connection mutex is not reentrant; helpers in
/// this crate acquire it for the duration of a single statement and never
/// call each other while holding it.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Initialize the database at `{data_dir}/kiosk.db`.
///
/// Creates the directory if needed, opens the connection, sets pragmas,
/// and runs any pending migrations. On corruption or open failure,
/// deletes the file and retries once.
pub fn init(data_dir: &Path) -> Result<DbState, String> {
    fs::create_dir_all(data_dir).map_err(|e| format!("Failed to create data dir: {e}"))?;

    let db_path = data_dir.join("kiosk.db");
    info!("Opening database at {}", db_path.display());

    let conn = match open_and_configure(&db_path) {
        Ok(c) => c,
        Err(first_err) => {
            warn!(
                "Database open failed ({}), deleting and retrying once",
                first_err
            );
            if db_path.exists() {
                let _ = fs::remove_file(&db_path);
                // Also remove WAL/SHM files if present
                let wal = db_path.with_extension("db-wal");
                let shm = db_path.with_extension("db-shm");
                let _ = fs::remove_file(&wal);
                let _ = fs::remove_file(&shm);
            }
            open_and_configure(&db_path)
                .map_err(|e| format!("Database open failed after retry: {e}"))?
        }
    };

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path,
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, String> {
    let conn = Connection::open(path).map_err(|e| format!("sqlite open: {e}"))?;

    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .map_err(|e| format!("pragma setup: {e}"))?;

    Ok(conn)
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

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
    if current < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// v1: settings, JSON state slots, and the order outbox.
fn migrate_v1(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "BEGIN;
         CREATE TABLE IF NOT EXISTS local_settings (
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT,
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (setting_category, setting_key)
         );
         CREATE TABLE IF NOT EXISTS state_slots (
            slot_key TEXT PRIMARY KEY,
            data TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now'))
         );
         CREATE TABLE IF NOT EXISTS outbox (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            temp_id INTEGER NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
         );
         INSERT INTO schema_version (version) VALUES (1);
         COMMIT;",
    )
    .map_err(|e| format!("migration v1: {e}"))
}

/// v2: per-entry failure bookkeeping on the outbox.
fn migrate_v2(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "BEGIN;
         ALTER TABLE outbox ADD COLUMN last_error TEXT;
         CREATE INDEX IF NOT EXISTS idx_outbox_created_at ON outbox(created_at);
         INSERT INTO schema_version (version) VALUES (2);
         COMMIT;",
    )
    .map_err(|e| format!("migration v2: {e}"))
}

// ---------------------------------------------------------------------------
// JSON state slots
// ---------------------------------------------------------------------------

/// Read a JSON slot by key. Returns `None` on miss; a parse failure is
/// logged and treated as a miss so corrupt state never wedges the kiosk.
pub fn read_slot(db: &DbState, slot_key: &str) -> Option<Value> {
    let conn = match db.conn.lock() {
        Ok(c) => c,
        Err(e) => {
            error!("state slot lock failed: {e}");
            return None;
        }
    };

    let json_str: Option<String> = conn
        .query_row(
            "SELECT data FROM state_slots WHERE slot_key = ?1",
            params![slot_key],
            |row| row.get(0),
        )
        .ok();

    match json_str {
        Some(s) => match serde_json::from_str::<Value>(&s) {
            Ok(v) => Some(v),
            Err(e) => {
                error!("state_slots[{slot_key}] JSON parse error: {e}");
                None
            }
        },
        None => None,
    }
}

/// Write a JSON slot wholesale. A single upsert statement, so the write is
/// atomic with respect to other readers of the slot.
pub fn write_slot(db: &DbState, slot_key: &str, data: &Value) -> Result<(), String> {
    let json_str =
        serde_json::to_string(data).map_err(|e| format!("serialize slot {slot_key}: {e}"))?;
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO state_slots (slot_key, data, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(slot_key) DO UPDATE SET
            data = excluded.data,
            updated_at = excluded.updated_at",
        params![slot_key, json_str],
    )
    .map_err(|e| format!("upsert state_slots[{slot_key}]: {e}"))?;
    Ok(())
}

/// Remove a slot. Succeeds silently when the slot does not exist.
pub fn clear_slot(db: &DbState, slot_key: &str) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "DELETE FROM state_slots WHERE slot_key = ?1",
        params![slot_key],
    )
    .map_err(|e| format!("clear state_slots[{slot_key}]: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Local settings
// ---------------------------------------------------------------------------

/// Read a single setting value.
pub fn setting_get(db: &DbState, category: &str, key: &str) -> Option<String> {
    let conn = db.conn.lock().ok()?;
    conn.query_row(
        "SELECT setting_value FROM local_settings \
         WHERE setting_category = ?1 AND setting_key = ?2",
        params![category, key],
        |row| row.get::<_, String>(0),
    )
    .ok()
}

/// Upsert a single setting value.
pub fn setting_set(db: &DbState, category: &str, key: &str, value: &str) -> Result<(), String> {
    let conn = db.conn.lock().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(setting_category, setting_key) DO UPDATE SET
            setting_value = excluded.setting_value,
            updated_at = excluded.updated_at",
        params![category, key, value],
    )
    .map_err(|e| format!("set local setting: {e}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// Open an in-memory database with migrations applied (mirrors
/// `open_and_configure` minus WAL, which in-memory databases do not use).
#[cfg(test)]
pub(crate) fn test_db_state() -> DbState {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )
    .expect("pragma setup");
    run_migrations(&conn).expect("run_migrations should succeed in test");
    DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
