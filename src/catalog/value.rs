//! Cell values
//!
//! This module defines how a single cell is represented in memory before it
//! is encoded, and after it is decoded.

use serde::Serialize;
use std::fmt;

/// A present cell value
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// String
    Varchar(String),
}

// Floats compare bitwise so that values can be used as map keys in tests
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::Varchar(a), Value::Varchar(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(s) => Some(s),
            _ => None,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int64(_) => "int",
            Value::Float64(_) => "double",
            Value::Varchar(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Varchar(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Varchar(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Varchar(v.to_string())
    }
}

/// A cell that may be absent; absence is distinct from every `Value`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MaybeValue(Option<Value>);

impl MaybeValue {
    /// An absent cell
    pub fn null() -> Self {
        Self(None)
    }

    pub fn new(value: impl Into<Value>) -> Self {
        Self(Some(value.into()))
    }

    pub fn exists(&self) -> bool {
        self.0.is_some()
    }

    pub fn value(&self) -> Option<&Value> {
        self.0.as_ref()
    }

    pub fn into_value(self) -> Option<Value> {
        self.0
    }
}

impl From<Value> for MaybeValue {
    fn from(v: Value) -> Self {
        Self(Some(v))
    }
}

impl From<Option<Value>> for MaybeValue {
    fn from(v: Option<Value>) -> Self {
        Self(v)
    }
}

impl fmt::Display for MaybeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => write!(f, "{}", v),
            None => write!(f, "NULL"),
        }
    }
}
