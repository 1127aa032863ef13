//! Attribute types for REIR
//!
//! This module defines the column types a table can declare and the binary
//! encoding of a single value of each type.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use super::value::Value;
use crate::error::{Error, Result};

/// Byte order of every integer written by the tuple codec
pub type WireOrder = LittleEndian;

/// Width of an encoded integer and of a string length prefix
pub const WORD_SIZE: usize = 8;

bitflags::bitflags! {
    /// Column properties, serialized as a bitmask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttrProperties: u8 {
        const NULLABLE = 1;
        const KEY = 2;
        const UNIQUE = 4;
    }
}

impl AttrProperties {
    /// Parse a property name as written in a tuple type
    pub fn from_property(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "nullable" => Some(Self::NULLABLE),
            "key" => Some(Self::KEY),
            "unique" => Some(Self::UNIQUE),
            _ => None,
        }
    }
}

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    /// 64-bit signed integer
    Integer,
    /// String with a maximum length; 0 means variable length
    String(usize),
    /// Double-precision floating point
    Double,
    /// Date, stored as a 64-bit integer
    Date,
    /// Unrecognised type name
    Unknown,
}

impl AttrType {
    /// Resolve a type name as written in a tuple type
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" => AttrType::Integer,
            "string" => AttrType::String(16),
            "double" => AttrType::Double,
            "date" => AttrType::Date,
            _ => AttrType::Unknown,
        }
    }

    /// Resolve a type name with an optional size parameter, e.g. `string(32)`
    pub fn with_param(name: &str, param: Option<usize>) -> Self {
        match (Self::from_name(name), param) {
            (AttrType::String(_), Some(n)) => AttrType::String(n),
            (ty, _) => ty,
        }
    }

    /// Ordinal used by the catalog serialization format
    pub fn ordinal(&self) -> u8 {
        match self {
            AttrType::Integer => 0,
            AttrType::Double => 1,
            AttrType::String(_) => 2,
            AttrType::Date => 3,
            AttrType::Unknown => 4,
        }
    }

    /// Size parameter used by the catalog serialization format
    pub fn param(&self) -> usize {
        match self {
            AttrType::String(n) => *n,
            _ => 0,
        }
    }

    /// Rebuild a type from its serialized ordinal and parameter
    pub fn from_ordinal(ordinal: u8, param: usize) -> Result<Self> {
        match ordinal {
            0 => Ok(AttrType::Integer),
            1 => Ok(AttrType::Double),
            2 => Ok(AttrType::String(param)),
            3 => Ok(AttrType::Date),
            4 => Ok(AttrType::Unknown),
            _ => Err(Error::Decode(format!("unknown type ordinal {}", ordinal))),
        }
    }

    /// Whether every value of this type occupies the same number of bytes
    pub fn fixed_length(&self) -> bool {
        !matches!(self, AttrType::String(0))
    }

    /// Default size in bytes for this type
    pub fn size(&self) -> Option<usize> {
        match self {
            AttrType::Integer | AttrType::Date | AttrType::Double => Some(WORD_SIZE),
            AttrType::String(n) => Some(*n),
            AttrType::Unknown => None,
        }
    }

    /// Catalog serialization, `(ordinal param)`
    pub fn serialize(&self) -> String {
        format!("({} {})", self.ordinal(), self.param())
    }

    fn mismatch(&self, attribute: &str, value: &Value) -> Error {
        Error::ValueTypeMismatch {
            attribute: attribute.to_string(),
            expected: self.to_string(),
            found: value.type_name().to_string(),
        }
    }

    /// Number of bytes `encode` writes for this value
    pub fn encoded_length(&self, attribute: &str, value: &Value) -> Result<usize> {
        match (self, value) {
            (AttrType::Integer | AttrType::Date, Value::Int64(_)) => Ok(WORD_SIZE),
            (AttrType::String(_), Value::Varchar(s)) => Ok(WORD_SIZE + s.len()),
            (AttrType::Double, _) => Err(Error::EncodeUnsupported("double".to_string())),
            _ => Err(self.mismatch(attribute, value)),
        }
    }

    /// Encode a value at the start of `buf`, returning the bytes written
    pub fn encode(&self, attribute: &str, value: &Value, buf: &mut [u8]) -> Result<usize> {
        let needed = self.encoded_length(attribute, value)?;
        if buf.len() < needed {
            return Err(Error::BufferTooShort {
                needed,
                available: buf.len(),
            });
        }

        match value {
            Value::Int64(v) => WireOrder::write_i64(&mut buf[..WORD_SIZE], *v),
            Value::Varchar(s) => {
                if let AttrType::String(max) = self {
                    if *max > 0 && s.len() > *max {
                        return Err(Error::ValueTooLarge(attribute.to_string()));
                    }
                }
                WireOrder::write_u64(&mut buf[..WORD_SIZE], s.len() as u64);
                buf[WORD_SIZE..needed].copy_from_slice(s.as_bytes());
            }
            Value::Float64(_) => return Err(Error::EncodeUnsupported("double".to_string())),
        }

        Ok(needed)
    }

    /// Decode a value from the start of `buf`, returning it with the bytes read
    pub fn decode(&self, buf: &[u8]) -> Result<(Value, usize)> {
        match self {
            AttrType::Integer | AttrType::Date => {
                let word = take(buf, WORD_SIZE)?;
                Ok((Value::Int64(WireOrder::read_i64(word)), WORD_SIZE))
            }
            AttrType::String(_) => {
                let len = WireOrder::read_u64(take(buf, WORD_SIZE)?);
                let len = usize::try_from(len)
                    .map_err(|_| Error::Decode(format!("string length {} overflows", len)))?;
                let end = WORD_SIZE.checked_add(len).ok_or_else(|| {
                    Error::Decode(format!("string length {} overflows", len))
                })?;
                let bytes = take(buf, end)?;
                let s = std::str::from_utf8(&bytes[WORD_SIZE..])
                    .map_err(|e| Error::Decode(format!("invalid utf-8 in string cell: {}", e)))?;
                Ok((Value::Varchar(s.to_string()), end))
            }
            AttrType::Double => Err(Error::DecodeUnsupported("double".to_string())),
            AttrType::Unknown => Err(Error::DecodeUnsupported("unknown".to_string())),
        }
    }
}

/// Bounds-checked prefix of `buf`
fn take(buf: &[u8], needed: usize) -> Result<&[u8]> {
    buf.get(..needed).ok_or(Error::Truncated {
        needed,
        available: buf.len(),
    })
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrType::Integer => write!(f, "int"),
            AttrType::String(0) => write!(f, "string"),
            AttrType::String(n) => write!(f, "string({})", n),
            AttrType::Double => write!(f, "double"),
            AttrType::Date => write!(f, "date"),
            AttrType::Unknown => write!(f, "unknown"),
        }
    }
}
