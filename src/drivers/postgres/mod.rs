//! PostgreSQL adapter on top of the synchronous `postgres` client.
//!
//! Accepts `postgres://`, `postgresql://` and `pg://` URLs. The URL is
//! handed to the client with its scheme normalized to `postgresql`.
//!
//! Parameters are positional (`$1`, `$2`, ...). The client has no way to
//! map names to positions, so name-based binding fails with
//! [`Error::Unsupported`].

mod conversion;

pub use conversion::{decode, kind_of, PgParam};

use postgres::fallible_iterator::FallibleIterator;
use postgres::types::ToSql;
use postgres::{Client, NoTls, SimpleQueryMessage};

use crate::connection::Connection;
use crate::cursor::RowSource;
use crate::error::{Error, Result};
use crate::registry::DriverFactory;
use crate::resultset::{Cursor, CursorResultSet, StatsResult};
use crate::row::{ColumnMetadata, Row};
use crate::statement::Statement;
use crate::url::ConnectionUrl;
use crate::value::Value;

const DRIVER: &str = "postgres";

/// Factory for the `postgres`, `postgresql` and `pg` schemes.
#[derive(Debug, Default)]
pub struct PostgresDriver;

impl DriverFactory for PostgresDriver {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn supported_schemes(&self) -> &[&str] {
        &["postgres", "postgresql", "pg"]
    }

    fn create_connection(&self, url: &ConnectionUrl) -> Result<Box<dyn Connection>> {
        Ok(Box::new(PostgresConnection::connect(url)?))
    }
}

/// Connection string understood by the client: the URL with its scheme
/// replaced by `postgresql`.
fn client_params(url: &ConnectionUrl) -> String {
    format!("postgresql:{}", url.target())
}

fn native_error(e: postgres::Error) -> Error {
    let code = e
        .code()
        .map(|state| state.code().to_string())
        .unwrap_or_else(|| "CLIENT".to_string());
    let message = e
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| e.to_string());
    Error::execution(code, message)
}

/// An open PostgreSQL session.
pub struct PostgresConnection {
    client: Client,
}

impl PostgresConnection {
    /// Connect to the server named by `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the connection string is invalid or
    /// the server cannot be reached or rejects the credentials.
    pub fn connect(url: &ConnectionUrl) -> Result<Self> {
        let client = Client::connect(&client_params(url), NoTls).map_err(|e| Error::Connection {
            url: url.as_str().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(driver = DRIVER, "connected");
        Ok(Self { client })
    }
}

impl Connection for PostgresConnection {
    fn driver_name(&self) -> &'static str {
        DRIVER
    }

    /// Runs through the simple query protocol. The server executes a
    /// multi-statement string as one implicit transaction, so a failure
    /// leaves no completed statements to account for.
    fn execute(&mut self, sql: &str) -> Result<StatsResult> {
        tracing::trace!(driver = DRIVER, sql, "execute");
        let messages = self.client.simple_query(sql).map_err(native_error)?;
        let mut stats = StatsResult::default();
        for message in messages {
            if let SimpleQueryMessage::CommandComplete(rows) = message {
                stats.merge(StatsResult::new(rows, 0));
            }
        }
        Ok(stats)
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        tracing::trace!(driver = DRIVER, sql, "prepare");
        let stmt = self.client.prepare(sql).map_err(|e| Error::Prepare {
            message: native_error(e).to_string(),
        })?;
        let slots = vec![Value::Unset; stmt.params().len()];
        Ok(Box::new(PostgresStatement {
            client: &mut self.client,
            stmt,
            slots,
        }))
    }
}

/// A server-side prepared statement plus its bound values.
pub struct PostgresStatement<'c> {
    client: &'c mut Client,
    stmt: postgres::Statement,
    slots: Vec<Value>,
}

impl Statement for PostgresStatement<'_> {
    fn driver(&self) -> &'static str {
        DRIVER
    }

    fn parameter_count(&self) -> usize {
        self.slots.len()
    }

    fn bind_slot(&mut self, index: usize, value: Value) -> Result<()> {
        self.slots[index - 1] = value;
        Ok(())
    }

    fn execute(&mut self) -> Result<Box<dyn CursorResultSet + '_>> {
        if let Some(missing) = self.slots.iter().position(Value::is_unset) {
            return Err(Error::bind(missing + 1, "parameter not bound"));
        }
        let params: Vec<PgParam<'_>> = self.slots.iter().map(PgParam).collect();
        let params = params.iter().map(|p| p as &dyn ToSql);

        if self.stmt.columns().is_empty() {
            let affected = self
                .client
                .execute_raw(&self.stmt, params)
                .map_err(native_error)?;
            return Ok(Box::new(Cursor::empty(StatsResult::new(affected, 0))));
        }

        let columns = self
            .stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, column)| {
                ColumnMetadata::new(column.name(), kind_of(column.type_()), ordinal)
            })
            .collect();
        let rows = self
            .client
            .query_raw(&self.stmt, params)
            .map_err(native_error)?;
        Ok(Box::new(Cursor::open(
            columns,
            Box::new(PostgresRows {
                rows,
                current: None,
            }),
        )?))
    }
}

/// A result row as received from the server. Cells are decoded on access.
pub struct PostgresRow(postgres::Row);

impl Row for PostgresRow {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        if index >= self.0.len() {
            return Err(Error::Index {
                index,
                len: self.0.len(),
            });
        }
        decode(&self.0, index)
    }
}

struct PostgresRows<'c> {
    rows: postgres::RowIter<'c>,
    current: Option<PostgresRow>,
}

impl RowSource for PostgresRows<'_> {
    fn fetch(&mut self) -> Result<bool> {
        self.current = self.rows.next().map_err(native_error)?.map(PostgresRow);
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<&(dyn Row + 'static)> {
        self.current.as_ref().map(|r| r as &(dyn Row + 'static))
    }
}
