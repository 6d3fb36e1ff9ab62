//! SQLite persistence.
//!
//! One [`rusqlite::Connection`] sits behind a mutex; async callers hand a
//! closure to [`Store::call`], which runs it on the blocking pool. The
//! per-entity modules expose plain functions over `&Connection` so they can
//! be composed inside a single transaction (the sync endpoint does this).
//!
//! Timestamps are stored through rusqlite's chrono support, JSON payloads
//! as text.

pub mod automations;
pub mod comments;
pub mod databases;
pub mod migrations;
pub mod mood;
pub mod notifications;
pub mod pages;
pub mod shares;
pub mod sync;
pub mod timeline;
pub mod users;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::logging::OpTimer;

/// Errors raised by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle to the ClearMind database.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    path: Arc<str>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Store {
    /// Opens (creating if needed) the database at `path` and migrates it.
    ///
    /// `:memory:` opens a private in-memory database.
    pub fn open(path: &str) -> StoreResult<Self> {
        let timer = OpTimer::new("store", "open");

        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn
        };
        conn.busy_timeout(Duration::from_secs(5))?;

        let applied = migrations::apply_migrations(&conn)?;
        tracing::debug!(path = %path, applied, "Store migrated");
        timer.finish();

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Arc::from(path),
        })
    }

    /// Throwaway in-memory store.
    pub fn in_memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Runs `f` with exclusive access to the connection on the blocking pool.
    ///
    /// The closure may return any error a [`StoreError`] converts into, so
    /// handlers can mix store calls with their own checks.
    pub async fn call<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| E::from(StoreError::Join(e)))?
    }

    /// Cheap liveness probe used by `/ready`.
    pub async fn ping(&self) -> StoreResult<i64> {
        self.call(|conn| -> StoreResult<i64> { Ok(migrations::get_current_version(conn)?) })
            .await
    }
}

/// Serializes a value for a JSON text column.
pub(crate) fn to_json_text<T: Serialize + ?Sized>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Reads a JSON text column.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a nullable JSON text column.
pub(crate) fn optional_json_column<T: DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Next free position among rows matching `scope_sql` (a `WHERE` clause
/// with a single `?1` parameter).
pub(crate) fn next_position(
    conn: &Connection,
    table: &str,
    scope_sql: &str,
    scope: &dyn rusqlite::ToSql,
) -> rusqlite::Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(position) + 1, 0) FROM {table} WHERE {scope_sql}");
    conn.query_row(&sql, [scope], |row| row.get(0))
}

/// Escapes `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
