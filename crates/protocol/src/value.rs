//! Tagged scalar values for query rows.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Error returned when a [`FieldValue`] is read as the wrong kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field holds {actual}, not {requested}")]
pub struct TypeMismatch {
    pub requested: &'static str,
    pub actual: &'static str,
}

/// A single column value of a query row.
///
/// A closed set of scalar kinds with kind-checked accessors; reading a
/// value as the wrong kind fails with [`TypeMismatch`] instead of
/// coercing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    I32(i32),
    I64(i64),
    F64(f64),
    Bool(bool),
    #[serde(serialize_with = "to_base64", deserialize_with = "from_base64")]
    Binary(Vec<u8>),
    DateTime(DateTime<Utc>),
}

impl FieldValue {
    /// Name of the kind this value holds.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::I32(_) => "i32",
            FieldValue::I64(_) => "i64",
            FieldValue::F64(_) => "f64",
            FieldValue::Bool(_) => "bool",
            FieldValue::Binary(_) => "binary",
            FieldValue::DateTime(_) => "datetime",
        }
    }

    pub fn as_text(&self) -> Result<&str, TypeMismatch> {
        match self {
            FieldValue::Text(s) => Ok(s),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn as_i32(&self) -> Result<i32, TypeMismatch> {
        match self {
            FieldValue::I32(v) => Ok(*v),
            other => Err(other.mismatch("i32")),
        }
    }

    pub fn as_i64(&self) -> Result<i64, TypeMismatch> {
        match self {
            FieldValue::I64(v) => Ok(*v),
            other => Err(other.mismatch("i64")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, TypeMismatch> {
        match self {
            FieldValue::F64(v) => Ok(*v),
            other => Err(other.mismatch("f64")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, TypeMismatch> {
        match self {
            FieldValue::Bool(v) => Ok(*v),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_binary(&self) -> Result<&[u8], TypeMismatch> {
        match self {
            FieldValue::Binary(v) => Ok(v),
            other => Err(other.mismatch("binary")),
        }
    }

    pub fn as_datetime(&self) -> Result<DateTime<Utc>, TypeMismatch> {
        match self {
            FieldValue::DateTime(v) => Ok(*v),
            other => Err(other.mismatch("datetime")),
        }
    }

    fn mismatch(&self, requested: &'static str) -> TypeMismatch {
        TypeMismatch { requested, actual: self.kind() }
    }
}

fn to_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

fn from_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom)
}
