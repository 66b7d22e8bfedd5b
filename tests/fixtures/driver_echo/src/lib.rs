//! Driver module used by the dynamic loading tests.
//!
//! `echo:<anything>` connects without I/O. `execute` reports one affected
//! row per statement. A prepared statement yields a single row holding the
//! connection target followed by its bound values.

use sqlport::{
    ColumnMetadata, Connection, ConnectionUrl, Cursor, CursorResultSet, DriverFactory, Error,
    OwnedRow, Result, Row, RowSource, Statement, StatsResult, Value, ValueKind,
};

pub struct EchoDriver;

impl DriverFactory for EchoDriver {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn supported_schemes(&self) -> &[&str] {
        &["echo", "parrot"]
    }

    fn create_connection(&self, url: &ConnectionUrl) -> Result<Box<dyn Connection>> {
        Ok(Box::new(EchoConnection {
            target: url.target().to_string(),
        }))
    }
}

struct EchoConnection {
    target: String,
}

impl Connection for EchoConnection {
    fn driver_name(&self) -> &'static str {
        "echo"
    }

    fn execute(&mut self, sql: &str) -> Result<StatsResult> {
        let statements = sql.split(';').filter(|s| !s.trim().is_empty()).count();
        Ok(StatsResult::new(statements as u64, 0))
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn Statement + '_>> {
        if sql.trim().is_empty() {
            return Err(Error::Prepare {
                message: "empty statement".into(),
            });
        }
        let count = sql.matches('?').count();
        Ok(Box::new(EchoStatement {
            target: self.target.clone(),
            slots: vec![Value::Unset; count],
        }))
    }
}

struct EchoStatement {
    target: String,
    slots: Vec<Value>,
}

impl Statement for EchoStatement {
    fn driver(&self) -> &'static str {
        "echo"
    }

    fn parameter_count(&self) -> usize {
        self.slots.len()
    }

    fn bind_slot(&mut self, index: usize, value: Value) -> Result<()> {
        self.slots[index - 1] = value;
        Ok(())
    }

    fn execute(&mut self) -> Result<Box<dyn CursorResultSet + '_>> {
        let mut columns = vec![ColumnMetadata::new("target", ValueKind::String, 0)];
        columns.extend(
            (1..=self.slots.len()).map(|i| ColumnMetadata::new(format!("p{i}"), ValueKind::None, i)),
        );
        let mut cells = vec![Value::Text(self.target.clone())];
        cells.extend(self.slots.iter().cloned());
        let source = SingleRow {
            row: Some(OwnedRow::new(cells)),
            fetched: false,
        };
        Ok(Box::new(Cursor::open(columns, Box::new(source))?))
    }
}

struct SingleRow {
    row: Option<OwnedRow>,
    fetched: bool,
}

impl RowSource for SingleRow {
    fn fetch(&mut self) -> Result<bool> {
        if self.fetched {
            self.row = None;
        }
        self.fetched = true;
        Ok(self.row.is_some())
    }

    fn current(&self) -> Option<&(dyn Row + 'static)> {
        self.row.as_ref().map(|r| r as &(dyn Row + 'static))
    }
}

#[cfg(not(feature = "abi-mismatch"))]
sqlport::export_drivers!(EchoDriver);

#[cfg(feature = "abi-mismatch")]
#[unsafe(no_mangle)]
pub extern "C" fn sqlport_abi_version() -> u32 {
    sqlport::SQLPORT_ABI_VERSION + 1
}
