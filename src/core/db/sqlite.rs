/// SQLite driver
///
/// Maps the session credentials onto an embedded SQLite database: `host` is
/// the directory holding database files and `database` is the file name (or
/// `:memory:`). SQLite has no accounts, so the user is only a session label
/// and the password is accepted but unused.
use crate::core::db::{
    CellValue, ConnectionConfig, DbConnection, Driver, QueryResult, DATE_FORMAT,
};
use crate::core::{Result, WhisperError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::{types::ValueRef, Connection, InterruptHandle, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::debug;

const MEMORY_DATABASE: &str = ":memory:";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens SQLite databases that already exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl SqliteDriver {
    /// Resolves the file a config points at.
    pub fn database_path(config: &ConnectionConfig) -> PathBuf {
        if config.database() == MEMORY_DATABASE {
            return PathBuf::from(MEMORY_DATABASE);
        }
        let host = config.host().trim();
        let base = if host.is_empty() { "." } else { host };
        Path::new(base).join(config.database())
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn scheme(&self) -> &'static str {
        "sqlite"
    }

    fn open(&self, config: &ConnectionConfig) -> Result<SqliteConnection> {
        let path = Self::database_path(config);
        // No SQLITE_OPEN_CREATE: an unknown database is an error, not a new file.
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&path, flags).map_err(|e| {
            WhisperError::Connection(format!("cannot open '{}': {}", path.display(), e))
        })?;

        // Reading the schema forces SQLite to validate the file header.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| {
            WhisperError::Connection(format!("cannot read '{}': {}", path.display(), e))
        })?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| WhisperError::Connection(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| WhisperError::Connection(e.to_string()))?;

        debug!(path = %path.display(), "sqlite database opened");
        Ok(SqliteConnection { inner: Some(conn) })
    }
}

/// A live SQLite session.
#[derive(Debug)]
pub struct SqliteConnection {
    inner: Option<Connection>,
}

impl SqliteConnection {
    /// Wraps an already opened rusqlite connection.
    pub fn from_connection(conn: Connection) -> Self {
        SqliteConnection { inner: Some(conn) }
    }
}

impl DbConnection for SqliteConnection {
    fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn query(&mut self, sql: &str, timeout: Option<Duration>) -> Result<QueryResult> {
        let conn = self
            .inner
            .as_ref()
            .ok_or_else(|| WhisperError::Connection("connection is closed".to_string()))?;

        let watchdog = timeout.map(|limit| Watchdog::arm(conn.get_interrupt_handle(), limit));
        let outcome = read_result_set(conn, sql);
        let fired = watchdog.map_or(false, Watchdog::disarm);

        match timeout {
            Some(limit) if fired && outcome.is_err() => Err(WhisperError::Timeout(limit)),
            _ => outcome,
        }
    }

    fn close(mut self) -> Result<()> {
        match self.inner.take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| WhisperError::Connection(e.to_string())),
            None => Ok(()),
        }
    }
}

/// Interrupts the connection if the statement outlives its time limit.
struct Watchdog {
    cancel: mpsc::Sender<()>,
    handle: thread::JoinHandle<bool>,
}

impl Watchdog {
    fn arm(interrupt: InterruptHandle, limit: Duration) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let handle = thread::spawn(move || match cancelled.recv_timeout(limit) {
            Err(RecvTimeoutError::Timeout) => {
                interrupt.interrupt();
                true
            }
            _ => false,
        });
        Watchdog { cancel, handle }
    }

    /// Stops the watchdog and reports whether it fired.
    fn disarm(self) -> bool {
        let _ = self.cancel.send(());
        self.handle.join().unwrap_or(false)
    }
}

/// Prepares, runs and drains one statement. The statement is finalized when
/// this returns, whichever path it takes.
fn read_result_set(conn: &Connection, sql: &str) -> Result<QueryResult> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| WhisperError::Query(format!("Failed to prepare statement: {}", e)))?;

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let declared: Vec<Option<String>> = stmt
        .columns()
        .iter()
        .map(|column| column.decl_type().map(str::to_uppercase))
        .collect();

    let mut rows = stmt
        .query([])
        .map_err(|e| WhisperError::Query(format!("Query execution failed: {}", e)))?;

    let mut values = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| WhisperError::Query(format!("Result processing failed: {}", e)))?
    {
        let mut cells = Vec::with_capacity(columns.len());
        for (index, decl_type) in declared.iter().enumerate() {
            let value = row
                .get_ref(index)
                .map_err(|e| WhisperError::Query(format!("Result processing failed: {}", e)))?;
            cells.push(decode_value(value, decl_type.as_deref()));
        }
        values.push(cells);
    }

    QueryResult::new(columns, values)
}

/// Converts a SQLite value into a typed cell, using the declared column type
/// to recover booleans and dates that SQLite stores as integers and text.
pub fn decode_value(value: ValueRef<'_>, declared: Option<&str>) -> CellValue {
    let declared = declared.unwrap_or("");
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(i) if declared.contains("BOOL") => CellValue::Boolean(i != 0),
        ValueRef::Integer(i) => CellValue::Integer(i),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if declared.contains("DATETIME") || declared.contains("TIMESTAMP") {
                if let Some(datetime) = parse_datetime(&text) {
                    return CellValue::DateTime(datetime);
                }
            } else if declared.contains("DATE") {
                if let Ok(date) = NaiveDate::parse_from_str(&text, DATE_FORMAT) {
                    return CellValue::Date(date);
                }
            }
            CellValue::Text(text.into_owned())
        }
        ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
    }
}

/// Parses the timestamp layouts SQLite's date functions produce. Offsets are
/// normalized to UTC.
fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    const LAYOUTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|datetime| datetime.naive_utc())
        })
}
