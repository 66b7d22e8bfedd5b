//! Conversion between [`Value`] and PostgreSQL wire types.
//!
//! Parameters are encoded for whatever type the server inferred for the
//! placeholder, using the value model's coercions. Result cells are decoded
//! by column type.

use std::error::Error as StdError;

use bytes::BytesMut;
use postgres::types::{IsNull, ToSql, Type};

use crate::error::{Error, Result};
use crate::value::{Value, ValueKind};

type BoxError = Box<dyn StdError + Sync + Send>;

/// Value kind a column of type `ty` decodes to.
pub fn kind_of(ty: &Type) -> ValueKind {
    match *ty {
        Type::BOOL => ValueKind::Bool,
        Type::INT2 | Type::INT4 => ValueKind::Int,
        Type::INT8 | Type::OID => ValueKind::Int64,
        Type::FLOAT4 | Type::FLOAT8 => ValueKind::Double,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN | Type::CHAR => {
            ValueKind::String
        }
        Type::BYTEA => ValueKind::Blob,
        _ => ValueKind::Unsupported,
    }
}

/// Decode cell `index` of `row`.
pub fn decode(row: &postgres::Row, index: usize) -> Result<Value> {
    let ty = row.columns()[index].type_();
    let decoded = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index).map(|v| v.map(Value::Bool)),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(index)
            .map(|v| v.map(|i| Value::Int(i32::from(i)))),
        Type::INT4 => row.try_get::<_, Option<i32>>(index).map(|v| v.map(Value::Int)),
        Type::INT8 => row.try_get::<_, Option<i64>>(index).map(|v| v.map(Value::Int64)),
        Type::OID => row
            .try_get::<_, Option<u32>>(index)
            .map(|v| v.map(|i| Value::Int64(i64::from(i)))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(index)
            .map(|v| v.map(|d| Value::Double(f64::from(d)))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index).map(|v| v.map(Value::Double)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => row
            .try_get::<_, Option<String>>(index)
            .map(|v| v.map(Value::Text)),
        Type::CHAR => row
            .try_get::<_, Option<i8>>(index)
            .map(|v| v.map(|c| Value::Text(char::from(c as u8).to_string()))),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(index).map(|v| v.map(Value::Blob)),
        _ => {
            return Err(Error::conversion(
                ValueKind::Unsupported,
                ValueKind::None,
                format!("PostgreSQL type '{ty}' has no value mapping"),
            ));
        }
    };
    decoded
        .map(|v| v.unwrap_or(Value::Null))
        .map_err(|e| Error::conversion(kind_of(ty), kind_of(ty), e.to_string()))
}

/// A bound value encoded for the parameter type the server expects.
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a Value);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        let value = self.0;
        if value.is_null() || value.is_unset() {
            return Ok(IsNull::Yes);
        }
        match *ty {
            Type::BOOL => value.to_bool().to_sql(ty, out),
            Type::INT2 => i16::try_from(value.to_int64()?)?.to_sql(ty, out),
            Type::INT4 => i32::try_from(value.to_int64()?)?.to_sql(ty, out),
            Type::INT8 => value.to_int64()?.to_sql(ty, out),
            Type::OID => u32::try_from(value.to_int64()?)?.to_sql(ty, out),
            Type::FLOAT4 => (value.to_double()? as f32).to_sql(ty, out),
            Type::FLOAT8 => value.to_double()?.to_sql(ty, out),
            Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                value.to_text().to_sql(ty, out)
            }
            Type::CHAR => match value.to_text().as_bytes() {
                [byte] => (*byte as i8).to_sql(ty, out),
                _ => Err(format!("PostgreSQL \"char\" takes exactly one byte, got '{value}'").into()),
            },
            Type::BYTEA => value.to_blob().to_sql(ty, out),
            _ => Err(format!("cannot encode {} value as PostgreSQL type '{ty}'", value.kind()).into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn to_sql_checked(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        self.to_sql(ty, out)
    }
}
