//! Universal value model and coercion rules.
//!
//! Every cell any driver can produce is represented as a [`Value`]. Two
//! families of conversions exist on top of exact extraction (`as_*`):
//!
//! - `to_*` always yields a value, using lossy defaults (`Null` → `0`, `""`,
//!   `false`, empty blob). Integer and float coercions of non-numeric text
//!   are the one exception and fail with [`Error::Conversion`].
//! - `to_*_opt` yields `None` when no meaningful conversion exists.
//!
//! The rules are the same for every backend. Each conversion matches all
//! eight tags without a wildcard arm, so adding a tag is a compile error
//! until every conversion handles it.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Binary payload.
pub type Blob = Vec<u8>;

/// Kind codes visible through column metadata and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum ValueKind {
    None = -1,
    Null = 0,
    String = 1,
    Blob = 2,
    Bool = 3,
    Int = 4,
    Int64 = 5,
    Double = 6,
    Unsupported = 7,
}

impl ValueKind {
    pub const ALL: [ValueKind; 9] = [
        ValueKind::None,
        ValueKind::Null,
        ValueKind::String,
        ValueKind::Blob,
        ValueKind::Bool,
        ValueKind::Int,
        ValueKind::Int64,
        ValueKind::Double,
        ValueKind::Unsupported,
    ];

    /// Numeric code of this kind.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::None => "NONE",
            ValueKind::Null => "NULL",
            ValueKind::String => "STRING",
            ValueKind::Blob => "BLOB",
            ValueKind::Bool => "BOOL",
            ValueKind::Int => "INT",
            ValueKind::Int64 => "INT64",
            ValueKind::Double => "DOUBLE",
            ValueKind::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed cell or parameter value.
///
/// `Unset` is the state of a binding slot nobody has written yet. Drivers
/// never produce it when reading rows: SQL NULL is always `Null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Unset,
    Null,
    Text(String),
    Blob(Blob),
    Bool(bool),
    Int(i32),
    Int64(i64),
    Double(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Unset => ValueKind::None,
            Value::Null => ValueKind::Null,
            Value::Text(_) => ValueKind::String,
            Value::Blob(_) => ValueKind::Blob,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Int64(_) => ValueKind::Int64,
            Value::Double(_) => ValueKind::Double,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    fn mismatch(&self, expected: ValueKind) -> Error {
        Error::conversion(self.kind(), expected, format!("value is not {expected}"))
    }

    // ------------------------------------------------------------------
    // Exact extraction: the tag must match, no coercion.
    // ------------------------------------------------------------------

    pub fn as_text(&self) -> Result<&str> {
        match self {
            Value::Text(s) => Ok(s),
            _ => Err(self.mismatch(ValueKind::String)),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8]> {
        match self {
            Value::Blob(b) => Ok(b),
            _ => Err(self.mismatch(ValueKind::Blob)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(self.mismatch(ValueKind::Bool)),
        }
    }

    pub fn as_int(&self) -> Result<i32> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => Err(self.mismatch(ValueKind::Int)),
        }
    }

    pub fn as_int64(&self) -> Result<i64> {
        match self {
            Value::Int64(i) => Ok(*i),
            _ => Err(self.mismatch(ValueKind::Int64)),
        }
    }

    pub fn as_double(&self) -> Result<f64> {
        match self {
            Value::Double(d) => Ok(*d),
            _ => Err(self.mismatch(ValueKind::Double)),
        }
    }

    // ------------------------------------------------------------------
    // Coercions
    // ------------------------------------------------------------------

    /// Text form: `""` for unset/null, lowercase hex for blobs,
    /// `TRUE`/`FALSE` for booleans, plain decimal for numbers.
    pub fn to_text(&self) -> String {
        match self {
            Value::Unset | Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => hex::encode(b),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Int64(i) => i.to_string(),
            Value::Double(d) => d.to_string(),
        }
    }

    pub fn to_text_opt(&self) -> Option<String> {
        match self {
            Value::Unset | Value::Null => None,
            Value::Text(_)
            | Value::Blob(_)
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Int64(_)
            | Value::Double(_) => Some(self.to_text()),
        }
    }

    /// Text is true iff it is `true`, `on` or `1` (case-insensitive);
    /// blobs are true iff non-empty; numbers iff nonzero.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Unset | Value::Null => false,
            Value::Text(s) => ["true", "on", "1"]
                .iter()
                .any(|accepted| s.eq_ignore_ascii_case(accepted)),
            Value::Blob(b) => !b.is_empty(),
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Int64(i) => *i != 0,
            Value::Double(d) => *d != 0.0,
        }
    }

    pub fn to_bool_opt(&self) -> Option<bool> {
        match self {
            Value::Unset | Value::Null => None,
            Value::Text(_)
            | Value::Blob(_)
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Int64(_)
            | Value::Double(_) => Some(self.to_bool()),
        }
    }

    /// 32-bit integer coercion.
    ///
    /// Wider numbers saturate at the `i32` bounds and doubles truncate
    /// toward zero. Text must hold a decimal integer that fits in `i32`.
    pub fn to_int(&self) -> Result<i32> {
        match self {
            Value::Unset | Value::Null | Value::Blob(_) => Ok(0),
            Value::Text(s) => s.trim().parse::<i32>().map_err(|e| {
                Error::conversion(ValueKind::String, ValueKind::Int, format!("'{s}': {e}"))
            }),
            Value::Bool(b) => Ok(i32::from(*b)),
            Value::Int(i) => Ok(*i),
            Value::Int64(i) => Ok((*i).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32),
            Value::Double(d) => Ok(*d as i32),
        }
    }

    /// `None` for absent values (unset, null, blob) and for text that does
    /// not parse. Use [`to_int`](Self::to_int) to see the parse error.
    pub fn to_int_opt(&self) -> Option<i32> {
        match self {
            Value::Unset | Value::Null | Value::Blob(_) => None,
            Value::Text(_) | Value::Bool(_) | Value::Int(_) | Value::Int64(_) | Value::Double(_) => {
                self.to_int().ok()
            }
        }
    }

    pub fn to_int64(&self) -> Result<i64> {
        match self {
            Value::Unset | Value::Null | Value::Blob(_) => Ok(0),
            Value::Text(s) => s.trim().parse::<i64>().map_err(|e| {
                Error::conversion(ValueKind::String, ValueKind::Int64, format!("'{s}': {e}"))
            }),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Int(i) => Ok(i64::from(*i)),
            Value::Int64(i) => Ok(*i),
            Value::Double(d) => Ok(*d as i64),
        }
    }

    pub fn to_int64_opt(&self) -> Option<i64> {
        match self {
            Value::Unset | Value::Null | Value::Blob(_) => None,
            Value::Text(_) | Value::Bool(_) | Value::Int(_) | Value::Int64(_) | Value::Double(_) => {
                self.to_int64().ok()
            }
        }
    }

    pub fn to_double(&self) -> Result<f64> {
        match self {
            Value::Unset | Value::Null | Value::Blob(_) => Ok(0.0),
            Value::Text(s) => s.trim().parse::<f64>().map_err(|e| {
                Error::conversion(ValueKind::String, ValueKind::Double, format!("'{s}': {e}"))
            }),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Ok(f64::from(*i)),
            Value::Int64(i) => Ok(*i as f64),
            Value::Double(d) => Ok(*d),
        }
    }

    pub fn to_double_opt(&self) -> Option<f64> {
        match self {
            Value::Unset | Value::Null | Value::Blob(_) => None,
            Value::Text(_) | Value::Bool(_) | Value::Int(_) | Value::Int64(_) | Value::Double(_) => {
                self.to_double().ok()
            }
        }
    }

    /// Text yields its UTF-8 bytes and booleans a single `1`/`0` byte.
    /// Numbers have no byte form and yield an empty blob.
    pub fn to_blob(&self) -> Blob {
        self.to_blob_opt().unwrap_or_default()
    }

    pub fn to_blob_opt(&self) -> Option<Blob> {
        match self {
            Value::Unset | Value::Null => None,
            Value::Text(s) => Some(s.as_bytes().to_vec()),
            Value::Blob(b) => Some(b.clone()),
            Value::Bool(b) => Some(vec![u8::from(*b)]),
            Value::Int(_) | Value::Int64(_) | Value::Double(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Unset | Value::Null => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Blob(b) => serializer.serialize_str(&hex::encode(b)),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i32(*i),
            Value::Int64(i) => serializer.serialize_i64(*i),
            Value::Double(d) => serializer.serialize_f64(*d),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Blob(value.to_vec())
    }
}

impl From<Blob> for Value {
    fn from(value: Blob) -> Self {
        Value::Blob(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
