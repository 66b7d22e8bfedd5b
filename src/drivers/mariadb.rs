//! MariaDB/MySQL adapter on top of the synchronous `mysql` client.
//!
//! Accepts `mysql://`, `mariadb://`, `maria://` and `my://` URLs. The URL is
//! handed to the client with its scheme normalized to `mysql`, so client
//! options go in the query string (`?prefer_socket=false`).
//!
//! Compiled in with the `mariadb` feature, or loaded at run time as the
//! `sqlport_driver_mysql` module built from `modules/mysql`.
//!
//! Parameters are positional (`?`). Name-based binding fails with
//! [`Error::Unsupported`].

use std::rc::Rc;

use mysql::consts::{ColumnFlags, ColumnType};
use mysql::prelude::Queryable;
use mysql::{Conn, Params};

use crate::connection::Connection;
use crate::cursor::RowSource;
use crate::error::{Error, Result};
use crate::registry::DriverFactory;
use crate::resultset::{Cursor, CursorResultSet, StatsResult};
use crate::row::{ColumnMetadata, Row};
use crate::statement::Statement;
use crate::url::ConnectionUrl;
use crate::value::{Value, ValueKind};

const DRIVER: &str = "mariadb";

/// Factory for the `mysql`, `mariadb`, `maria` and `my` schemes.
#[derive(Debug, Default)]
pub struct MariadbDriver;

impl DriverFactory for MariadbDriver {
    fn name(&self) -> &'static str {
        DRIVER
    }

    fn supported_schemes(&self) -> &[&str] {
        &["mysql", "mariadb", "maria", "my"]
    }

    fn create_connection(&self, url: &ConnectionUrl) -> Result<Box<dyn Connection>> {
        Ok(Box::new(MariadbConnection::connect(url)?))
    }
}

fn client_url(url: &ConnectionUrl) -> String {
    format!("mysql:{}", url.target())
}

fn native_error(e: mysql::Error) -> Error {
    match e {
        mysql::Error::MySqlError(e) => Error::execution(e.code, e.message),
        other => Error::execution("CLIENT", other.to_string()),
    }
}

/// Value kind of a result column, from its wire type, flags and display
/// length. `TINYINT(1)` is a boolean; string and blob types are blobs only
/// when the column is binary.
pub fn kind_of(ty: ColumnType, flags: ColumnFlags, length: u32) -> ValueKind {
    match ty {
        ColumnType::MYSQL_TYPE_TINY if length == 1 => ValueKind::Bool,
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_YEAR => ValueKind::Int,
        ColumnType::MYSQL_TYPE_LONGLONG => ValueKind::Int64,
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => ValueKind::Double,
        ColumnType::MYSQL_TYPE_STRING
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB => {
            if flags.contains(ColumnFlags::BINARY_FLAG) {
                ValueKind::Blob
            } else {
                ValueKind::String
            }
        }
        ColumnType::MYSQL_TYPE_NULL => ValueKind::Null,
        _ => ValueKind::Unsupported,
    }
}

fn column_metadata(column: &mysql::Column, ordinal: usize) -> ColumnMetadata {
    let kind = kind_of(column.column_type(), column.flags(), column.column_length());
    let mut meta = ColumnMetadata::new(column.name_str(), kind, ordinal);
    meta.origin_name = column.org_name_str().into_owned();
    meta.origin_table_name = column.org_table_str().into_owned();
    meta
}

fn integer(kind: ValueKind, i: i64) -> Value {
    match kind {
        ValueKind::Bool => Value::Bool(i != 0),
        ValueKind::Int => i32::try_from(i).map_or(Value::Int64(i), Value::Int),
        _ => Value::Int64(i),
    }
}

/// Decode one binary-protocol cell of a column declared as `kind`.
pub fn decode(kind: ValueKind, cell: &mysql::Value) -> Result<Value> {
    match cell {
        mysql::Value::NULL => Ok(Value::Null),
        mysql::Value::Int(i) => Ok(integer(kind, *i)),
        mysql::Value::UInt(u) => i64::try_from(*u).map(|i| integer(kind, i)).map_err(|_| {
            Error::conversion(kind, ValueKind::Int64, format!("{u} exceeds the signed 64-bit range"))
        }),
        mysql::Value::Float(f) => Ok(Value::Double(f64::from(*f))),
        mysql::Value::Double(d) => Ok(Value::Double(*d)),
        mysql::Value::Bytes(bytes) => match kind {
            ValueKind::Blob => Ok(Value::Blob(bytes.clone())),
            ValueKind::String => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
            _ => Err(Error::conversion(
                kind,
                ValueKind::None,
                "column type has no value mapping",
            )),
        },
        _ => Err(Error::conversion(
            ValueKind::Unsupported,
            ValueKind::None,
            "temporal values have no mapping",
        )),
    }
}

fn encode(value: &Value) -> mysql::Value {
    match value {
        Value::Unset | Value::Null => mysql::Value::NULL,
        Value::Text(s) => mysql::Value::Bytes(s.clone().into_bytes()),
        Value::Blob(b) => mysql::Value::Bytes(b.clone()),
        Value::Bool(b) => mysql::Value::Int(i64::from(*b)),
        Value::Int(i) => mysql::Value::Int(i64::from(*i)),
        Value::Int64(i) => mysql::Value::Int(*i),
        Value::Double(d) => mysql::Value::Double(*d),
    }
}

/// An open MariaDB/MySQL session.
pub struct MariadbConnection {
    conn: Conn,
}

impl MariadbConnection {
    /// Connect to the server named by `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the URL is invalid or the server
    /// cannot be reached or rejects the credentials.
    pub fn connect(url: &ConnectionUrl) -> Result<Self> {
        let conn = Conn::new(client_url(url).as_str()).map_err(|e| Error::Connection {
            url: url.as_str().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(driver = DRIVER, "connected");
        Ok(Self { conn })
    }
}

impl Connection for MariadbConnection {
    fn driver_name(&self) -> &'static str {
        DRIVER
    }

    /// Runs every statement of `sql` and drains each result, summing the
    /// affected rows and keeping the last non-zero generated id.
    fn execute(&mut self, sql: &str) -> Result<StatsResult> {
        tracing::trace!(driver = DRIVER, sql, "execute");
        let mut result = self.conn.query_iter(sql).map_err(native_error)?;
        let mut stats = StatsResult::default();
        while let Some(set) = result.iter() {
            let step = StatsResult::new(set.affected_rows(), set.last_insert_id().unwrap_or(0));
            for row in set {
                if let Err(e) = row {
                    return Err(Error::batch(stats, native_error(e)));
                }
            }
            stats.merge(step);
        }
        Ok(stats)
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        tracing::trace!(driver = DRIVER, sql, "prepare");
        let stmt = self.conn.prep(sql).map_err(|e| Error::Prepare {
            message: native_error(e).to_string(),
        })?;
        let slots = vec![Value::Unset; usize::from(stmt.num_params())];
        Ok(Box::new(MariadbStatement {
            conn: &mut self.conn,
            stmt,
            slots,
        }))
    }
}

/// A server-side prepared statement plus its bound values.
pub struct MariadbStatement<'c> {
    conn: &'c mut Conn,
    stmt: mysql::Statement,
    slots: Vec<Value>,
}

impl Statement for MariadbStatement<'_> {
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
        let params = if self.slots.is_empty() {
            Params::Empty
        } else {
            Params::Positional(self.slots.iter().map(encode).collect())
        };

        if self.stmt.num_columns() == 0 {
            let result = self.conn.exec_iter(&self.stmt, params).map_err(native_error)?;
            let stats = StatsResult::new(
                result.affected_rows(),
                result.last_insert_id().unwrap_or(0),
            );
            return Ok(Box::new(Cursor::empty(stats)));
        }

        let columns: Vec<ColumnMetadata> = self
            .stmt
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, column)| column_metadata(column, ordinal))
            .collect();
        let kinds: Rc<[ValueKind]> = columns.iter().map(|c| c.declared_kind).collect();
        let rows = self.conn.exec_iter(&self.stmt, params).map_err(native_error)?;
        Ok(Box::new(Cursor::open(
            columns,
            Box::new(MariadbRows {
                rows,
                kinds,
                current: None,
            }),
        )?))
    }
}

/// A result row as received from the server. Cells are decoded on access.
pub struct MariadbRow {
    row: mysql::Row,
    kinds: Rc<[ValueKind]>,
}

impl Row for MariadbRow {
    fn len(&self) -> usize {
        self.row.len()
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        if index >= self.row.len() {
            return Err(Error::Index {
                index,
                len: self.row.len(),
            });
        }
        match self.row.as_ref(index) {
            Some(cell) => decode(self.kinds[index], cell),
            None => Ok(Value::Null),
        }
    }
}

struct MariadbRows<I> {
    rows: I,
    kinds: Rc<[ValueKind]>,
    current: Option<MariadbRow>,
}

impl<I> RowSource for MariadbRows<I>
where
    I: Iterator<Item = mysql::Result<mysql::Row>>,
{
    fn fetch(&mut self) -> Result<bool> {
        self.current = match self.rows.next() {
            Some(row) => Some(MariadbRow {
                row: row.map_err(native_error)?,
                kinds: Rc::clone(&self.kinds),
            }),
            None => None,
        };
        Ok(self.current.is_some())
    }

    fn current(&self) -> Option<&(dyn Row + 'static)> {
        self.current.as_ref().map(|r| r as &(dyn Row + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::empty(), 1, ValueKind::Bool)]
    #[case(ColumnType::MYSQL_TYPE_TINY, ColumnFlags::empty(), 4, ValueKind::Int)]
    #[case(ColumnType::MYSQL_TYPE_LONG, ColumnFlags::empty(), 11, ValueKind::Int)]
    #[case(ColumnType::MYSQL_TYPE_YEAR, ColumnFlags::empty(), 4, ValueKind::Int)]
    #[case(ColumnType::MYSQL_TYPE_LONGLONG, ColumnFlags::empty(), 20, ValueKind::Int64)]
    #[case(ColumnType::MYSQL_TYPE_FLOAT, ColumnFlags::empty(), 12, ValueKind::Double)]
    #[case(ColumnType::MYSQL_TYPE_VAR_STRING, ColumnFlags::empty(), 80, ValueKind::String)]
    #[case(ColumnType::MYSQL_TYPE_BLOB, ColumnFlags::BINARY_FLAG, 65535, ValueKind::Blob)]
    #[case(ColumnType::MYSQL_TYPE_BLOB, ColumnFlags::empty(), 65535, ValueKind::String)]
    #[case(ColumnType::MYSQL_TYPE_NULL, ColumnFlags::empty(), 0, ValueKind::Null)]
    #[case(ColumnType::MYSQL_TYPE_DATETIME, ColumnFlags::empty(), 19, ValueKind::Unsupported)]
    #[case(ColumnType::MYSQL_TYPE_NEWDECIMAL, ColumnFlags::empty(), 10, ValueKind::Unsupported)]
    fn test_kind_of(
        #[case] ty: ColumnType,
        #[case] flags: ColumnFlags,
        #[case] length: u32,
        #[case] kind: ValueKind,
    ) {
        assert_eq!(kind_of(ty, flags, length), kind);
    }

    #[rstest]
    #[case(ValueKind::Bool, mysql::Value::Int(1), Value::Bool(true))]
    #[case(ValueKind::Int, mysql::Value::Int(-7), Value::Int(-7))]
    #[case(ValueKind::Int, mysql::Value::UInt(4_000_000_000), Value::Int64(4_000_000_000))]
    #[case(ValueKind::Int64, mysql::Value::Int(9), Value::Int64(9))]
    #[case(ValueKind::Double, mysql::Value::Float(0.5), Value::Double(0.5))]
    #[case(ValueKind::String, mysql::Value::Bytes(b"Hello".to_vec()), Value::Text("Hello".into()))]
    #[case(ValueKind::Blob, mysql::Value::Bytes(vec![0, 1]), Value::Blob(vec![0, 1]))]
    #[case(ValueKind::String, mysql::Value::NULL, Value::Null)]
    fn test_decode(#[case] kind: ValueKind, #[case] cell: mysql::Value, #[case] expected: Value) {
        assert_eq!(decode(kind, &cell).unwrap(), expected);
    }

    #[rstest]
    fn test_decode_rejects_unmapped_cells() {
        assert!(matches!(
            decode(ValueKind::Unsupported, &mysql::Value::Bytes(b"1.50".to_vec())),
            Err(Error::Conversion { .. })
        ));
        assert!(matches!(
            decode(ValueKind::Unsupported, &mysql::Value::Date(2024, 1, 2, 0, 0, 0, 0)),
            Err(Error::Conversion { .. })
        ));
        assert!(decode(ValueKind::Int64, &mysql::Value::UInt(u64::MAX)).is_err());
    }

    #[rstest]
    fn test_encode_keeps_tags() {
        assert_eq!(encode(&Value::Bool(true)), mysql::Value::Int(1));
        assert_eq!(encode(&Value::Text("a".into())), mysql::Value::Bytes(b"a".to_vec()));
        assert_eq!(encode(&Value::Null), mysql::Value::NULL);
    }

    #[rstest]
    #[case("mysql://root@localhost:3306/db", "mysql://root@localhost:3306/db")]
    #[case("maria://localhost/db", "mysql://localhost/db")]
    #[case("my://u:p@127.0.0.1/db?prefer_socket=false", "mysql://u:p@127.0.0.1/db?prefer_socket=false")]
    fn test_client_url_normalizes_scheme(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(client_url(&ConnectionUrl::parse(url).unwrap()), expected);
    }

    #[rstest]
    fn test_factory_schemes() {
        assert_eq!(
            MariadbDriver.supported_schemes(),
            &["mysql", "mariadb", "maria", "my"]
        );
    }

    #[rstest]
    fn test_unreachable_server_is_connection_error() {
        let url = ConnectionUrl::parse("mysql://nobody@127.0.0.1:1/none?prefer_socket=false").unwrap();
        assert!(matches!(
            MariadbConnection::connect(&url),
            Err(Error::Connection { .. })
        ));
    }
}
