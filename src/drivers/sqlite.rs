//! SQLite adapter on top of `rusqlite` (bundled SQLite).
//!
//! URL forms:
//! - `sqlite::memory:`, `sqlite:memory:`, `sqlite:` → in-memory database
//! - `sqlite:path/to/db`, `sqlite:///abs/path/to/db` → file database
//!
//! Named parameters (`:name`, `@name`, `$name`) are supported.

use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::connection::Connection;
use crate::cursor::RowSource;
use crate::error::{Error, Result};
use crate::registry::DriverFactory;
use crate::resultset::{Cursor, CursorResultSet, StatsResult};
use crate::row::{ColumnMetadata, OwnedRow, Row};
use crate::statement::Statement;
use crate::url::ConnectionUrl;
use crate::value::{Value, ValueKind};

const DRIVER: &str = "sqlite";

/// Factory for the `sqlite` and `sqlite3` schemes.
#[derive(Debug, Default)]
pub struct SqliteDriver;

impl DriverFactory for SqliteDriver {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn supported_schemes(&self) -> &[&str] {
        &["sqlite", "sqlite3"]
    }

    fn create_connection(&self, url: &ConnectionUrl) -> Result<Box<dyn Connection>> {
        Ok(Box::new(SqliteConnection::open(url)?))
    }
}

/// An open SQLite database.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open the database named by `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the file cannot be opened.
    pub fn open(url: &ConnectionUrl) -> Result<Self> {
        let target = url.target();
        let conn = if is_memory_target(target) {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(file_path(target))
        }
        .map_err(|e| Error::Connection {
            url: url.as_str().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(driver = DRIVER, target, "opened database");
        Ok(Self { conn })
    }

    fn total_changes(&self) -> Result<u64> {
        let changes: i64 = self
            .conn
            .query_row("SELECT total_changes()", [], |row| row.get(0))
            .map_err(native_error)?;
        Ok(u64::try_from(changes).unwrap_or(0))
    }
}

fn is_memory_target(target: &str) -> bool {
    matches!(target, "" | ":memory:" | "memory:")
}

/// `///abs/path` → `/abs/path`, `//rel` → `rel`, anything else unchanged.
fn file_path(target: &str) -> &str {
    target.strip_prefix("//").unwrap_or(target)
}

/// Zero the connection's last insert rowid. Only a successful INSERT sets
/// it again, so after running SQL it holds the id generated by that SQL,
/// even when an earlier insert produced the same rowid.
fn reset_generated_id(conn: &rusqlite::Connection) {
    // SAFETY: `conn` owns a valid handle for the duration of the call.
    unsafe { rusqlite::ffi::sqlite3_set_last_insert_rowid(conn.handle(), 0) }
}

fn generated_id(conn: &rusqlite::Connection) -> u64 {
    u64::try_from(conn.last_insert_rowid()).unwrap_or(0)
}

fn native_error(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(failure, message) => Error::execution(
            failure.extended_code,
            message.clone().unwrap_or_else(|| failure.to_string()),
        ),
        _ => Error::execution("SQLITE", e.to_string()),
    }
}

impl Connection for SqliteConnection {
    fn driver_name(&self) -> &'static str {
        DRIVER
    }

    fn execute(&mut self, sql: &str) -> Result<StatsResult> {
        tracing::trace!(driver = DRIVER, sql, "execute");
        let changes_before = self.total_changes()?;
        reset_generated_id(&self.conn);

        let outcome = self.conn.execute_batch(sql);

        let stats = StatsResult::new(
            self.total_changes()?.saturating_sub(changes_before),
            generated_id(&self.conn),
        );
        outcome.map(|()| stats).map_err(|e| Error::batch(stats, native_error(e)))
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        tracing::trace!(driver = DRIVER, sql, "prepare");
        let stmt = self.conn.prepare(sql).map_err(|e| Error::Prepare {
            message: e.to_string(),
        })?;
        Ok(Box::new(SqliteStatement {
            conn: &self.conn,
            stmt,
        }))
    }
}

/// A prepared SQLite statement. SQLite keeps bindings across executions.
pub struct SqliteStatement<'c> {
    conn: &'c rusqlite::Connection,
    stmt: rusqlite::Statement<'c>,
}

impl SqliteStatement<'_> {
    fn columns(&self) -> Vec<ColumnMetadata> {
        self.stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, column)| {
                ColumnMetadata::new(
                    column.name(),
                    column.decl_type().map_or(ValueKind::None, declared_kind),
                    ordinal,
                )
            })
            .collect()
    }
}

/// Kind implied by a declared column type, following SQLite's affinity
/// rules. NUMERIC affinity stays unknown.
fn declared_kind(decl_type: &str) -> ValueKind {
    let decl = decl_type.to_ascii_uppercase();
    if decl.contains("INT") {
        ValueKind::Int64
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        ValueKind::String
    } else if decl.contains("BLOB") {
        ValueKind::Blob
    } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
        ValueKind::Double
    } else if decl.contains("BOOL") {
        ValueKind::Bool
    } else {
        ValueKind::None
    }
}

fn to_sql(value: Value) -> SqlValue {
    match value {
        Value::Unset | Value::Null => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
        Value::Bool(b) => SqlValue::Integer(i64::from(b)),
        Value::Int(i) => SqlValue::Integer(i64::from(i)),
        Value::Int64(i) => SqlValue::Integer(i),
        Value::Double(d) => SqlValue::Real(d),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(d) => Value::Double(d),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

impl Statement for SqliteStatement<'_> {
    fn driver(&self) -> &'static str {
        DRIVER
    }

    fn parameter_count(&self) -> usize {
        self.stmt.parameter_count()
    }

    /// Accepts the name with or without its `:`, `@` or `$` prefix.
    fn parameter_index(&self, name: &str) -> Result<usize> {
        let candidates: Vec<String> = if name.starts_with([':', '@', '$', '?']) {
            vec![name.to_string()]
        } else {
            [':', '@', '$'].iter().map(|p| format!("{p}{name}")).collect()
        };
        for candidate in &candidates {
            if let Some(index) = self.stmt.parameter_index(candidate).map_err(native_error)? {
                return Ok(index);
            }
        }
        Err(Error::bind(name, "no such parameter"))
    }

    fn parameter_name(&self, index: usize) -> Result<String> {
        self.stmt
            .parameter_name(index)
            .map(str::to_string)
            .ok_or_else(|| Error::bind(index, "parameter has no name"))
    }

    fn bind_slot(&mut self, index: usize, value: Value) -> Result<()> {
        self.stmt
            .raw_bind_parameter(index, to_sql(value))
            .map_err(|e| Error::bind(index, e.to_string()))
    }

    fn execute(&mut self) -> Result<Box<dyn CursorResultSet + '_>> {
        if self.stmt.column_count() == 0 {
            reset_generated_id(self.conn);
            let affected = self.stmt.raw_execute().map_err(native_error)?;
            let stats = StatsResult::new(affected as u64, generated_id(self.conn));
            return Ok(Box::new(Cursor::empty(stats)));
        }

        let columns = self.columns();
        let width = columns.len();
        let source = SqliteRows {
            rows: self.stmt.raw_query(),
            width,
            current: None,
        };
        Ok(Box::new(Cursor::open(columns, Box::new(source))?.infer_missing_kinds()))
    }
}

/// Native row loop. Each fetched row is copied out of SQLite's buffers
/// before the next step.
struct SqliteRows<'s> {
    rows: rusqlite::Rows<'s>,
    width: usize,
    current: Option<OwnedRow>,
}

impl RowSource for SqliteRows<'_> {
    fn fetch(&mut self) -> Result<bool> {
        self.current = match self.rows.next().map_err(native_error)? {
            Some(row) => {
                let values = (0..self.width)
                    .map(|i| row.get_ref(i).map(from_sql))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(native_error)?;
                Some(OwnedRow::new(values))
            }
            None => None,
        };
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<&(dyn Row + 'static)> {
        self.current.as_ref().map(|r| r as &(dyn Row + 'static))
    }
}
