//! SQLite source reader.
//!
//! Implements [`TableReader`] over a single read-only rusqlite connection.
//! rusqlite is synchronous, so every query runs on the blocking pool and
//! streamed pages are handed back with `blocking_send`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::identifier::quote_ident;
use crate::core::schema::LogicalTable;
use crate::core::traits::{TableReader, READ_CHANNEL_CAPACITY};
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Read-only reader over the source SQLite file.
pub struct SqliteReader {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteReader {
    /// Open the configured database file read-only.
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        let path = config.path.clone();
        let open_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || Self::open(&open_path))
            .await
            .map_err(|e| MigrateError::Config(format!("opening SQLite source: {}", e)))??;

        info!("Opened SQLite source: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    fn open(path: &Path) -> Result<Connection> {
        if !path.is_file() {
            return Err(MigrateError::Source(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                Some(format!("no database file at {}", path.display())),
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, context: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&lock(&conn)))
            .await
            .map_err(|e| MigrateError::transfer(context, e.to_string()))?
    }
}

/// A panic while holding the lock leaves the connection itself intact.
fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl TableReader for SqliteReader {
    fn read_table(&self, table: LogicalTable, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(READ_CHANNEL_CAPACITY);
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn);
            if let Err(e) = stream_table(&guard, table, batch_size.max(1), &tx) {
                let _ = tx.blocking_send(Err(e));
            }
        });

        rx
    }

    async fn get_row_count(&self, table: LogicalTable) -> Result<i64> {
        self.with_conn("sqlite row count", move |conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table.name())?);
            let count: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
            Ok(count)
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn("sqlite ping", |conn| {
            conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        // The connection closes when the last handle is dropped.
        debug!("Released SQLite source: {}", self.path.display());
    }
}

/// Send a table as pages of at most `batch_size` rows, ordered by id.
///
/// Returns early without error if the receiver goes away.
fn stream_table(
    conn: &Connection,
    table: LogicalTable,
    batch_size: usize,
    tx: &mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let sql = format!(
        "SELECT * FROM {} ORDER BY {}",
        quote_ident(table.name())?,
        quote_ident(table.primary_key())?
    );
    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query([])?;
    let mut page = Vec::with_capacity(batch_size);
    let mut sent = 0usize;

    while let Some(r) = rows.next()? {
        let mut row = Row::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            row.push(name.clone(), convert_value(r.get_ref(idx)?));
        }
        page.push(row);

        if page.len() == batch_size {
            let full = std::mem::replace(&mut page, Vec::with_capacity(batch_size));
            if tx.blocking_send(Ok(Batch::new(full))).is_err() {
                return Ok(());
            }
            sent += 1;
        }
    }

    if !page.is_empty() {
        if tx.blocking_send(Ok(Batch::new(page))).is_err() {
            return Ok(());
        }
        sent += 1;
    }

    debug!("{}: streamed {} pages from sqlite", table, sent);
    Ok(())
}

fn convert_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::I64(i),
        ValueRef::Real(f) => SqlValue::F64(f),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Bytes(b.to_vec()),
    }
}
