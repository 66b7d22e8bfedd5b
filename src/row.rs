//! Row access and column metadata.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::value::{Blob, Value, ValueKind};

/// Descriptive metadata of one result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Name of the underlying table column, or `""` when the driver cannot tell.
    pub origin_name: String,
    /// Name of the underlying table, or `""` when the driver cannot tell.
    pub origin_table_name: String,
    pub declared_kind: ValueKind,
    /// 0-based position of the column in the result.
    pub ordinal: usize,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, declared_kind: ValueKind, ordinal: usize) -> Self {
        let name = name.into();
        Self {
            origin_name: name.clone(),
            name,
            origin_table_name: String::new(),
            declared_kind,
            ordinal,
        }
    }
}

/// An ordered, fixed-length sequence of values.
///
/// `get_value` is the canonical accessor and fails with [`Error::Index`]
/// when `index >= len()`.
///
/// # Typed accessors default instead of failing
///
/// The `get_value_*` helpers never fail. An out-of-range index, a
/// conversion error or an absent value all yield the type's default
/// (`""`, `0`, `0.0`, `false`, empty blob). This hides caller bugs such as
/// a wrong column index; use [`Row::get_value`] when the distinction
/// matters.
pub trait Row {
    /// Number of cells, equal to the result's column count.
    fn len(&self) -> usize;

    fn get_value(&self, index: usize) -> Result<Value>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_value_string(&self, index: usize) -> String {
        self.get_value(index).map(|v| v.to_text()).unwrap_or_default()
    }

    fn get_value_blob(&self, index: usize) -> Blob {
        self.get_value(index).map(|v| v.to_blob()).unwrap_or_default()
    }

    fn get_value_bool(&self, index: usize) -> bool {
        self.get_value(index).map(|v| v.to_bool()).unwrap_or_default()
    }

    fn get_value_int(&self, index: usize) -> i32 {
        self.get_value(index)
            .and_then(|v| v.to_int())
            .unwrap_or_default()
    }

    fn get_value_int64(&self, index: usize) -> i64 {
        self.get_value(index)
            .and_then(|v| v.to_int64())
            .unwrap_or_default()
    }

    fn get_value_double(&self, index: usize) -> f64 {
        self.get_value(index)
            .and_then(|v| v.to_double())
            .unwrap_or_default()
    }

    /// All cells in column order.
    fn values(&self) -> Result<Vec<Value>> {
        (0..self.len()).map(|i| self.get_value(i)).collect()
    }
}

/// A row copied into owned storage. Valid for as long as it is held.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct OwnedRow(Vec<Value>);

impl OwnedRow {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Copy every cell out of a (possibly ephemeral) row.
    pub fn from_row(row: &dyn Row) -> Result<Self> {
        row.values().map(Self)
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for OwnedRow {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl Row for OwnedRow {
    fn len(&self) -> usize {
        self.0.len()
    }

    fn get_value(&self, index: usize) -> Result<Value> {
        self.0.get(index).cloned().ok_or(Error::Index {
            index,
            len: self.0.len(),
        })
    }
}
