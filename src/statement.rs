//! Prepared statements: parameter binding and the three execution modes.

use crate::error::{Error, Result};
use crate::resultset::{BufferedResultSet, BufferedTable, CursorResultSet};
use crate::row::Row;
use crate::value::{Blob, Value};

/// A compiled, parameterized statement.
///
/// Parameters are addressed 1-based on every backend. Binding again and
/// re-executing reuses the prepared plan; each `execute` starts from a
/// fresh native result.
///
/// Name-based binding is an optional capability. Drivers that cannot map
/// names to positions keep the default `parameter_index` and
/// `parameter_name`, which fail with [`Error::Unsupported`].
pub trait Statement {
    /// Name of the driver that prepared this statement.
    fn driver(&self) -> &'static str;

    /// Number of parameters the statement expects.
    fn parameter_count(&self) -> usize;

    /// 1-based position of the parameter called `name`.
    fn parameter_index(&self, _name: &str) -> Result<usize> {
        Err(Error::Unsupported {
            driver: self.driver(),
            operation: "parameter_index",
        })
    }

    /// Name of the parameter at 1-based `index`.
    fn parameter_name(&self, _index: usize) -> Result<String> {
        Err(Error::Unsupported {
            driver: self.driver(),
            operation: "parameter_name",
        })
    }

    /// Store `value` in slot `index`. Called by [`bind`](Self::bind) after
    /// validation, so `index` is in range and `value` is never unset.
    fn bind_slot(&mut self, index: usize, value: Value) -> Result<()>;

    /// Lazy, streaming execution.
    fn execute(&mut self) -> Result<Box<dyn CursorResultSet + '_>>;

    /// Bind by position, dispatching on the value's tag.
    fn bind(&mut self, index: usize, value: Value) -> Result<()> {
        if value.is_unset() {
            return Err(Error::bind(index, "cannot bind an unset value"));
        }
        let count = self.parameter_count();
        if index == 0 || index > count {
            return Err(Error::bind(
                index,
                format!("index out of range (statement has {count} parameters)"),
            ));
        }
        self.bind_slot(index, value)
    }

    fn bind_null(&mut self, index: usize) -> Result<()> {
        self.bind(index, Value::Null)
    }

    fn bind_text(&mut self, index: usize, value: &str) -> Result<()> {
        self.bind(index, Value::Text(value.to_string()))
    }

    fn bind_blob(&mut self, index: usize, value: Blob) -> Result<()> {
        self.bind(index, Value::Blob(value))
    }

    fn bind_bool(&mut self, index: usize, value: bool) -> Result<()> {
        self.bind(index, Value::Bool(value))
    }

    fn bind_int(&mut self, index: usize, value: i32) -> Result<()> {
        self.bind(index, Value::Int(value))
    }

    fn bind_int64(&mut self, index: usize, value: i64) -> Result<()> {
        self.bind(index, Value::Int64(value))
    }

    fn bind_double(&mut self, index: usize, value: f64) -> Result<()> {
        self.bind(index, Value::Double(value))
    }

    /// Bind by parameter name. Fails with [`Error::Unsupported`] on drivers
    /// without name support.
    fn bind_named(&mut self, name: &str, value: Value) -> Result<()> {
        let index = self.parameter_index(name)?;
        self.bind(index, value)
    }

    fn bind_null_named(&mut self, name: &str) -> Result<()> {
        self.bind_named(name, Value::Null)
    }

    /// Invoke `f` once per row without materializing the result.
    fn execute_with(&mut self, f: &mut dyn FnMut(&dyn Row) -> Result<()>) -> Result<()> {
        self.execute()?.for_each_row(f)
    }

    /// Pull every row into owned storage.
    fn execute_buffered(&mut self) -> Result<Box<dyn BufferedResultSet>> {
        let cursor = self.execute()?;
        Ok(Box::new(BufferedTable::from_cursor(&*cursor)?))
    }
}
