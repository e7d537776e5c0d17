//! `sqlite` store: persistent configuration entries in a single SQLite file.
//!
//! ```text
//! app_config(key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at TEXT NOT NULL)
//! ```
//!
//! Writes are buffered in memory until `save_changes`, which flushes them
//! under a savepoint: its own transaction, or nested inside the caller's open
//! one.  A failed flush leaves the buffered writes in place for a retry.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, trace};

use crate::error::AppError;
use crate::guard;
use super::super::store::{
    ConfigEntry, ConfigStore, Transaction, TransactionBackend, TransactionGate,
};

const SCHEMA_VERSION: i64 = 1;

struct Inner {
    conn: Connection,
    /// key -> `Some(value)` for a write, `None` for a delete.
    pending: BTreeMap<String, Option<String>>,
}

pub struct SqliteStore {
    inner: Mutex<Inner>,
    gate: TransactionGate,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`, creating parent
    /// directories as needed.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!("sqlite: cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Store(format!("sqlite: open {}: {e}", db_path.display())))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::Store(format!("sqlite: set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| AppError::Store(format!("sqlite: set busy_timeout: {e}")))?;

        debug!(path = %db_path.display(), "sqlite store opened");
        Self::from_connection(conn, Some(db_path.to_path_buf()))
    }

    /// Private in-memory database; contents vanish with the store.
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Store(format!("sqlite: open in-memory: {e}")))?;
        Self::from_connection(conn, None)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, AppError> {
        init_schema(&conn)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                pending: BTreeMap::new(),
            }),
            gate: TransactionGate::new(),
            db_path,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::Store("sqlite store lock poisoned".into()))
    }
}

impl Inner {
    fn visible(&self, key: &str) -> Result<Option<String>, AppError> {
        if let Some(change) = self.pending.get(key) {
            return Ok(change.clone());
        }
        self.conn
            .query_row(
                "SELECT value FROM app_config WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| AppError::Store(format!("sqlite: get {key}: {e}")))
    }
}

impl ConfigStore for SqliteStore {
    fn store_type(&self) -> &str {
        "sqlite"
    }

    fn get_entity(&self, key: &str) -> Result<Option<ConfigEntry>, AppError> {
        let inner = self.lock()?;
        Ok(inner.visible(key)?.map(|v| ConfigEntry::new(key, v)))
    }

    fn get_entities(&self, prefix: &str) -> Result<Vec<ConfigEntry>, AppError> {
        let inner = self.lock()?;
        let mut stmt = inner
            .conn
            .prepare(
                "SELECT key, value FROM app_config
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )
            .map_err(|e| AppError::Store(format!("sqlite: prepare get_entities: {e}")))?;
        let rows = stmt
            .query_map(params![prefix], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| AppError::Store(format!("sqlite: query get_entities: {e}")))?;

        let mut merged = BTreeMap::new();
        for row in rows {
            let (k, v) =
                row.map_err(|e| AppError::Store(format!("sqlite: map get_entities row: {e}")))?;
            merged.insert(k, v);
        }
        for (k, change) in inner.pending.iter().filter(|(k, _)| k.starts_with(prefix)) {
            match change {
                Some(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                None => {
                    merged.remove(k);
                }
            }
        }
        Ok(merged
            .into_iter()
            .map(|(key, value)| ConfigEntry { key, value })
            .collect())
    }

    fn set_entity(&self, entry: ConfigEntry) -> Result<(), AppError> {
        guard::not_empty("key", &entry.key)?;
        self.lock()?.pending.insert(entry.key, Some(entry.value));
        Ok(())
    }

    fn delete_entity(&self, key: &str) -> Result<bool, AppError> {
        let mut inner = self.lock()?;
        if inner.visible(key)?.is_none() {
            return Ok(false);
        }
        inner.pending.insert(key.to_string(), None);
        Ok(true)
    }

    fn save_changes(&self) -> Result<(), AppError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if inner.pending.is_empty() {
            return Ok(());
        }

        // Outside a transaction the savepoint commits on release; inside the
        // caller's transaction it only nests, and the caller decides.
        // Dropping it on error undoes a partial flush.
        let sp = inner
            .conn
            .savepoint()
            .map_err(|e| AppError::Store(format!("sqlite: begin save_changes: {e}")))?;
        flush(&sp, &inner.pending)?;
        sp.commit()
            .map_err(|e| AppError::Store(format!("sqlite: commit save_changes: {e}")))?;

        let count = inner.pending.len();
        inner.pending.clear();
        trace!(changes = count, "sqlite store: save_changes");
        Ok(())
    }

    fn begin_transaction(&self) -> Result<Transaction<'_>, AppError> {
        Transaction::begin(self, &self.gate)
    }
}

impl TransactionBackend for SqliteStore {
    fn tx_begin(&self) -> Result<(), AppError> {
        self.lock()?
            .conn
            .execute_batch("BEGIN")
            .map_err(|e| AppError::Store(format!("sqlite: begin: {e}")))
    }

    fn tx_commit(&self) -> Result<(), AppError> {
        self.lock()?
            .conn
            .execute_batch("COMMIT")
            .map_err(|e| AppError::Store(format!("sqlite: commit: {e}")))
    }

    fn tx_rollback(&self) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.pending.clear();
        inner
            .conn
            .execute_batch("ROLLBACK")
            .map_err(|e| AppError::Store(format!("sqlite: rollback: {e}")))
    }
}

fn init_schema(conn: &Connection) -> Result<(), AppError> {
    let version: i64 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(|e| AppError::Store(format!("sqlite: read schema version: {e}")))?;

    if version == 0 {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS app_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            PRAGMA user_version = 1;
            ",
        )
        .map_err(|e| AppError::Store(format!("sqlite: initialize schema: {e}")))?;
        return Ok(());
    }

    if version != SCHEMA_VERSION {
        return Err(AppError::Store(format!(
            "sqlite: unsupported schema version {version}, expected {SCHEMA_VERSION}"
        )));
    }

    Ok(())
}

fn flush(conn: &Connection, pending: &BTreeMap<String, Option<String>>) -> Result<(), AppError> {
    let now = now_iso8601();
    for (key, change) in pending {
        match change {
            Some(value) => {
                conn.execute(
                    "INSERT INTO app_config (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE
                     SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, now],
                )
                .map_err(|e| AppError::Store(format!("sqlite: upsert {key}: {e}")))?;
            }
            None => {
                conn.execute("DELETE FROM app_config WHERE key = ?1", params![key])
                    .map_err(|e| AppError::Store(format!("sqlite: delete {key}: {e}")))?;
            }
        }
    }
    Ok(())
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
