//! Schema definitions
//!
//! This module defines attributes (columns) and schemas (tables) together
//! with the row wire format:
//!
//! ```text
//! row   := <table_name> ':' cell*
//! cell  := [presence_byte] value     presence byte only for nullable columns
//! value := int64 | u64 length + raw bytes
//! ```
//!
//! The key region of a row is `<table_name>:` followed by the cells of key
//! columns; the value region is the cells of every other column. Both keep
//! schema declaration order.

use nom::{
    bytes::complete::take_till1,
    character::complete::{char, u64 as parse_u64, u8 as parse_u8},
    combinator::all_consuming,
    multi::many0,
    sequence::{delimited, separated_pair, tuple},
    IResult,
};
use std::fmt;

use super::types::{AttrProperties, AttrType};
use super::value::MaybeValue;
use crate::error::{Error, Result};

/// Byte separating the table name from the cells
pub const KEY_SEPARATOR: u8 = b':';

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub ty: AttrType,
    pub props: AttrProperties,
}

impl Attribute {
    /// Create a new non-nullable, non-key attribute
    pub fn new(name: impl Into<String>, ty: AttrType) -> Self {
        Self {
            name: name.into(),
            ty,
            props: AttrProperties::empty(),
        }
    }

    /// Set nullable property
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.props.set(AttrProperties::NULLABLE, nullable);
        self
    }

    /// Set key property
    pub fn key(mut self, key: bool) -> Self {
        self.props.set(AttrProperties::KEY, key);
        self
    }

    /// Set unique property
    pub fn unique(mut self, unique: bool) -> Self {
        self.props.set(AttrProperties::UNIQUE, unique);
        self
    }

    pub fn with_properties(mut self, props: AttrProperties) -> Self {
        self.props = props;
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.props.contains(AttrProperties::NULLABLE)
    }

    pub fn is_key(&self) -> bool {
        self.props.contains(AttrProperties::KEY)
    }

    pub fn is_unique(&self) -> bool {
        self.props.contains(AttrProperties::UNIQUE)
    }

    pub fn fixed_length(&self) -> bool {
        self.ty.fixed_length()
    }

    /// Size of the type, plus the presence byte for nullable columns
    pub fn default_size(&self) -> Option<usize> {
        let size = self.ty.size()?;
        Some(if self.is_nullable() { size + 1 } else { size })
    }

    /// Number of bytes `encode` writes for this cell
    pub fn encoded_length(&self, cell: &MaybeValue) -> Result<usize> {
        let presence = usize::from(self.is_nullable());
        match cell.value() {
            Some(value) => Ok(presence + self.ty.encoded_length(&self.name, value)?),
            None if self.is_nullable() => Ok(presence),
            None => Err(Error::NullNotAllowed(self.name.clone())),
        }
    }

    /// Encode a cell at the start of `buf`, returning the bytes written
    pub fn encode(&self, cell: &MaybeValue, buf: &mut [u8]) -> Result<usize> {
        let mut offset = 0;

        if self.is_nullable() {
            let byte = buf.first_mut().ok_or(Error::BufferTooShort {
                needed: 1,
                available: 0,
            })?;
            *byte = u8::from(cell.exists());
            offset = 1;
        }

        match cell.value() {
            Some(value) => Ok(offset + self.ty.encode(&self.name, value, &mut buf[offset..])?),
            None if self.is_nullable() => Ok(offset),
            None => Err(Error::NullNotAllowed(self.name.clone())),
        }
    }

    /// Decode a cell from the start of `buf`, returning it with the bytes read
    pub fn decode(&self, buf: &[u8]) -> Result<(MaybeValue, usize)> {
        let mut offset = 0;

        if self.is_nullable() {
            match buf.first() {
                Some(0) => return Ok((MaybeValue::null(), 1)),
                Some(1) => offset = 1,
                Some(other) => {
                    return Err(Error::Decode(format!(
                        "invalid presence byte {} for attribute '{}'",
                        other, self.name
                    )))
                }
                None => {
                    return Err(Error::Truncated {
                        needed: 1,
                        available: 0,
                    })
                }
            }
        }

        let (value, read) = self.ty.decode(&buf[offset..])?;
        Ok((MaybeValue::from(value), offset + read))
    }

    /// Catalog serialization, `(name (ordinal param) flags)`
    pub fn serialize(&self) -> String {
        format!("({} {} {})", self.name, self.ty.serialize(), self.props.bits())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ty, self.name)?;
        if self.is_key() {
            write!(f, " key")?;
        }
        if self.is_nullable() {
            write!(f, " nullable")?;
        }
        if self.is_unique() {
            write!(f, " unique")?;
        }
        Ok(())
    }
}

/// Table schema - an ordered list of attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    attributes: Vec<Attribute>,
}

impl Schema {
    /// Create a new schema
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// Add an attribute at the end of the schema
    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Get attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Attributes that form the key region, in declared order
    pub fn key_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.is_key())
    }

    /// Attributes that form the value region, in declared order
    pub fn value_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| !a.is_key())
    }

    /// `<table_name>:`, the first bytes of every key of this table
    pub fn key_prefix(&self) -> Vec<u8> {
        let mut prefix = self.name.as_bytes().to_vec();
        prefix.push(KEY_SEPARATOR);
        prefix
    }

    /// Half-open key range covering every row of this table
    pub fn key_range(&self) -> (Vec<u8>, Vec<u8>) {
        let start = self.key_prefix();
        let mut end = start.clone();
        // The prefix always ends with the separator, which has a successor
        if let Some(last) = end.last_mut() {
            *last += 1;
        }
        (start, end)
    }

    pub fn has_fixed_key_length(&self) -> bool {
        self.key_attributes().all(Attribute::fixed_length)
    }

    pub fn has_fixed_value_length(&self) -> bool {
        self.value_attributes().all(Attribute::fixed_length)
    }

    /// Length of every key of this table, if the key region is fixed-length
    pub fn fixed_key_length(&self) -> Option<usize> {
        if !self.has_fixed_key_length() {
            return None;
        }
        let cells = self
            .key_attributes()
            .map(Attribute::default_size)
            .sum::<Option<usize>>()?;
        Some(self.name.len() + 1 + cells)
    }

    /// Length of every value of this table, if the value region is fixed-length
    pub fn fixed_value_length(&self) -> Option<usize> {
        if !self.has_fixed_value_length() {
            return None;
        }
        self.value_attributes().map(Attribute::default_size).sum()
    }

    fn check_tuple_size(&self, tuple: &[MaybeValue]) -> Result<()> {
        if tuple.len() != self.attributes.len() {
            return Err(Error::TupleSizeMismatch {
                expected: self.attributes.len(),
                found: tuple.len(),
            });
        }
        Ok(())
    }

    fn cells_length(&self, tuple: &[MaybeValue], key: Option<bool>) -> Result<usize> {
        self.check_tuple_size(tuple)?;
        self.attributes
            .iter()
            .zip(tuple)
            .filter(|(attr, _)| key.map_or(true, |k| attr.is_key() == k))
            .map(|(attr, cell)| attr.encoded_length(cell))
            .sum()
    }

    fn encode_cells(
        &self,
        tuple: &[MaybeValue],
        key: Option<bool>,
        buf: &mut [u8],
        mut offset: usize,
    ) -> Result<usize> {
        for (attr, cell) in self.attributes.iter().zip(tuple) {
            if key.map_or(true, |k| attr.is_key() == k) {
                let available = buf.len();
                let dst = buf
                    .get_mut(offset..)
                    .ok_or(Error::BufferTooShort {
                        needed: offset,
                        available,
                    })?;
                offset += attr.encode(cell, dst)?;
            }
        }
        Ok(offset)
    }

    fn write_prefix(&self, buf: &mut [u8]) -> Result<usize> {
        let prefix = self.key_prefix();
        let available = buf.len();
        let dst = buf.get_mut(..prefix.len()).ok_or(Error::BufferTooShort {
            needed: prefix.len(),
            available,
        })?;
        dst.copy_from_slice(&prefix);
        Ok(prefix.len())
    }

    /// Number of bytes `encode` writes for this tuple
    pub fn encoded_length(&self, tuple: &[MaybeValue]) -> Result<usize> {
        Ok(self.name.len() + 1 + self.cells_length(tuple, None)?)
    }

    /// Encode a full row into `buf`, which must be sized by `encoded_length`
    pub fn encode(&self, tuple: &[MaybeValue], buf: &mut [u8]) -> Result<usize> {
        self.check_tuple_size(tuple)?;
        let offset = self.write_prefix(buf)?;
        self.encode_cells(tuple, None, buf, offset)
    }

    /// Encode a full row into a freshly sized buffer
    pub fn encode_to_vec(&self, tuple: &[MaybeValue]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_length(tuple)?];
        self.encode(tuple, &mut buf)?;
        Ok(buf)
    }

    /// Decode a full row produced by `encode`
    pub fn decode(&self, buf: &[u8]) -> Result<Vec<MaybeValue>> {
        let prefix = self.key_prefix();
        if !buf.starts_with(&prefix) {
            return Err(Error::Decode(format!(
                "row does not start with prefix '{}:'",
                self.name
            )));
        }

        let mut offset = prefix.len();
        let mut tuple = Vec::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            let (cell, read) = attr.decode(&buf[offset..])?;
            tuple.push(cell);
            offset += read;
        }

        if offset != buf.len() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after row of '{}'",
                buf.len() - offset,
                self.name
            )));
        }
        Ok(tuple)
    }

    /// Number of bytes `encode_key` writes for this tuple
    pub fn key_length(&self, tuple: &[MaybeValue]) -> Result<usize> {
        Ok(self.name.len() + 1 + self.cells_length(tuple, Some(true))?)
    }

    /// Number of bytes `encode_value` writes for this tuple
    pub fn value_length(&self, tuple: &[MaybeValue]) -> Result<usize> {
        self.cells_length(tuple, Some(false))
    }

    /// Encode the key region, `<table_name>:` followed by the key cells
    pub fn encode_key(&self, tuple: &[MaybeValue], buf: &mut [u8]) -> Result<usize> {
        self.check_tuple_size(tuple)?;
        let offset = self.write_prefix(buf)?;
        self.encode_cells(tuple, Some(true), buf, offset)
    }

    /// Encode the value region, the non-key cells
    pub fn encode_value(&self, tuple: &[MaybeValue], buf: &mut [u8]) -> Result<usize> {
        self.check_tuple_size(tuple)?;
        self.encode_cells(tuple, Some(false), buf, 0)
    }

    /// Rebuild a tuple in declared order from its key and value regions
    pub fn decode_key_value(&self, key: &[u8], value: &[u8]) -> Result<Vec<MaybeValue>> {
        let prefix = self.key_prefix();
        if !key.starts_with(&prefix) {
            return Err(Error::Decode(format!(
                "key does not belong to table '{}'",
                self.name
            )));
        }

        let mut key_offset = prefix.len();
        let mut value_offset = 0;
        let mut tuple = Vec::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            let cell = if attr.is_key() {
                let (cell, read) = attr.decode(&key[key_offset..])?;
                key_offset += read;
                cell
            } else {
                let (cell, read) = attr.decode(&value[value_offset..])?;
                value_offset += read;
                cell
            };
            tuple.push(cell);
        }
        Ok(tuple)
    }

    /// Catalog serialization, `name:(attr)(attr)...`
    pub fn serialize(&self) -> String {
        let mut out = format!("{}:", self.name);
        for attr in &self.attributes {
            out.push_str(&attr.serialize());
        }
        out
    }

    /// Parse the catalog serialization produced by `serialize`
    pub fn deserialize(input: &str) -> Result<Self> {
        let (_, schema) = all_consuming(parse_schema)(input)
            .map_err(|e| Error::Decode(format!("malformed schema '{}': {}", input, e)))?;
        schema
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}", attr)?;
        }
        write!(f, " }}")
    }
}

// ========== Catalog Format Parser ==========

fn parse_attr_type(input: &str) -> IResult<&str, (u8, u64)> {
    delimited(
        char('('),
        separated_pair(parse_u8, char(' '), parse_u64),
        char(')'),
    )(input)
}

fn parse_attribute(input: &str) -> IResult<&str, (&str, (u8, u64), u8)> {
    let (input, (_, name, _, ty, _, flags, _)) = tuple((
        char('('),
        take_till1(|c: char| c == ' ' || c == '(' || c == ')'),
        char(' '),
        parse_attr_type,
        char(' '),
        parse_u8,
        char(')'),
    ))(input)?;
    Ok((input, (name, ty, flags)))
}

fn parse_schema(input: &str) -> IResult<&str, Result<Schema>> {
    let (input, name) = take_till1(|c: char| c == ':')(input)?;
    let (input, _) = char(':')(input)?;
    let (input, raw) = many0(parse_attribute)(input)?;

    let attributes = raw
        .into_iter()
        .map(|(attr_name, (ordinal, param), flags)| {
            let param = usize::try_from(param)
                .map_err(|_| Error::Decode(format!("type parameter {} overflows", param)))?;
            let ty = AttrType::from_ordinal(ordinal, param)?;
            let props = AttrProperties::from_bits(flags).ok_or_else(|| {
                Error::Decode(format!("unknown property flags {} on '{}'", flags, attr_name))
            })?;
            Ok(Attribute::new(attr_name, ty).with_properties(props))
        })
        .collect::<Result<Vec<_>>>()
        .map(|attributes| Schema::new(name, attributes));

    Ok((input, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new(
            "test",
            vec![
                Attribute::new("a", AttrType::Integer).key(true),
                Attribute::new("b", AttrType::Integer),
                Attribute::new("c", AttrType::Integer).key(true).nullable(true),
                Attribute::new("d", AttrType::String(0)).nullable(true),
            ],
        )
    }

    #[test]
    fn test_schema_ne() {
        let s1 = Schema::new("foo", vec![Attribute::new("a", AttrType::Integer)]);
        let s2 = Schema::new("bar", vec![Attribute::new("a", AttrType::Integer)]);
        let s3 = Schema::new("foo", vec![Attribute::new("a", AttrType::Integer).key(true)]);
        assert_ne!(s1, s2);
        assert_ne!(s1, s3);
        assert_eq!(s1, s1.clone());
    }

    #[test]
    fn test_serialize_format() {
        let schema = Schema::new(
            "t",
            vec![
                Attribute::new("a", AttrType::Integer).key(true),
                Attribute::new("s", AttrType::String(16)).nullable(true),
            ],
        );
        assert_eq!(schema.serialize(), "t:(a (0 0) 2)(s (2 16) 1)");
    }

    #[test]
    fn test_serdes() {
        let schema = sample_schema();
        let restored = Schema::deserialize(&schema.serialize()).unwrap();
        assert_eq!(restored, schema);

        let empty = Schema::new("empty", vec![]);
        assert_eq!(Schema::deserialize(&empty.serialize()).unwrap(), empty);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(matches!(
            Schema::deserialize("t:(a (0 0) 2"),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            Schema::deserialize("t:(a (9 0) 0)"),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            Schema::deserialize("t:(a (0 0) 64)"),
            Err(Error::Decode(_))
        ));
        assert!(Schema::deserialize("no separator").is_err());
    }

    #[test]
    fn test_attribute_codec_int() {
        let attr = Attribute::new("a", AttrType::Integer);
        let cell = MaybeValue::new(-12i64);
        let mut buf = vec![0u8; attr.encoded_length(&cell).unwrap()];
        assert_eq!(attr.encode(&cell, &mut buf).unwrap(), 8);
        assert_eq!(attr.decode(&buf).unwrap(), (cell, 8));
    }

    #[test]
    fn test_attribute_codec_nullable() {
        let attr = Attribute::new("a", AttrType::Integer).nullable(true);
        assert_eq!(attr.default_size(), Some(9));

        let absent = MaybeValue::null();
        let mut buf = vec![0xffu8; attr.encoded_length(&absent).unwrap()];
        assert_eq!(attr.encode(&absent, &mut buf).unwrap(), 1);
        assert_eq!(buf, vec![0]);
        let (decoded, read) = attr.decode(&buf).unwrap();
        assert!(!decoded.exists());
        assert_eq!(read, 1);

        let present = MaybeValue::new(5i64);
        let mut buf = vec![0u8; 9];
        attr.encode(&present, &mut buf).unwrap();
        assert_eq!(buf[0], 1);
        assert_eq!(attr.decode(&buf).unwrap(), (present, 9));
    }

    #[test]
    fn test_null_into_non_nullable() {
        let attr = Attribute::new("a", AttrType::Integer);
        let mut buf = [0u8; 8];
        assert!(matches!(
            attr.encode(&MaybeValue::null(), &mut buf),
            Err(Error::NullNotAllowed(name)) if name == "a"
        ));
    }

    #[test]
    fn test_row_codec() {
        let schema = sample_schema();
        let tuple = vec![
            MaybeValue::new(1i64),
            MaybeValue::new(2i64),
            MaybeValue::null(),
            MaybeValue::new("xyz"),
        ];
        let len = schema.encoded_length(&tuple).unwrap();
        // "test:" + 8 + 8 + 1 + (1 + 8 + 3)
        assert_eq!(len, 5 + 8 + 8 + 1 + 12);

        let buf = schema.encode_to_vec(&tuple).unwrap();
        assert_eq!(&buf[..5], b"test:");
        assert_eq!(schema.decode(&buf).unwrap(), tuple);
    }

    #[test]
    fn test_encode_into_short_buffer() {
        let schema = sample_schema();
        let tuple = vec![
            MaybeValue::new(1i64),
            MaybeValue::new(2i64),
            MaybeValue::new(3i64),
            MaybeValue::null(),
        ];
        let mut buf = vec![0u8; 10];
        assert!(matches!(
            schema.encode(&tuple, &mut buf),
            Err(Error::BufferTooShort { .. })
        ));

        // Room for the prefix only
        let mut buf = vec![0u8; 5];
        assert!(matches!(
            schema.encode(&tuple, &mut buf),
            Err(Error::BufferTooShort {
                needed: 8,
                available: 0
            })
        ));

        // Too short for the "test:" prefix itself
        let mut buf = vec![0u8; 3];
        assert!(matches!(
            schema.encode(&tuple, &mut buf),
            Err(Error::BufferTooShort {
                needed: 5,
                available: 3
            })
        ));
    }

    #[test]
    fn test_tuple_size_mismatch() {
        let schema = sample_schema();
        let result = schema.encoded_length(&[MaybeValue::new(1i64)]);
        assert!(matches!(
            result,
            Err(Error::TupleSizeMismatch {
                expected: 4,
                found: 1
            })
        ));
    }

    #[test]
    fn test_key_value_partition() {
        let schema = Schema::new(
            "orders",
            vec![
                Attribute::new("id", AttrType::Integer).key(true),
                Attribute::new("qty", AttrType::Integer),
                Attribute::new("shop", AttrType::Integer).key(true).nullable(true),
                Attribute::new("price", AttrType::Integer),
            ],
        );
        let tuple = vec![
            MaybeValue::new(10i64),
            MaybeValue::new(20i64),
            MaybeValue::new(30i64),
            MaybeValue::new(40i64),
        ];

        assert_eq!(schema.fixed_key_length(), Some("orders".len() + 1 + 8 + 9));
        assert_eq!(schema.fixed_value_length(), Some(16));
        assert_eq!(schema.key_length(&tuple).unwrap(), 24);
        assert_eq!(schema.value_length(&tuple).unwrap(), 16);

        let mut key = vec![0u8; 24];
        let mut value = vec![0u8; 16];
        assert_eq!(schema.encode_key(&tuple, &mut key).unwrap(), 24);
        assert_eq!(schema.encode_value(&tuple, &mut value).unwrap(), 16);

        assert_eq!(&key[..7], b"orders:");
        assert_eq!(&key[7..15], &10i64.to_le_bytes());
        assert_eq!(key[15], 1);
        assert_eq!(&key[16..], &30i64.to_le_bytes());
        assert_eq!(&value[..8], &20i64.to_le_bytes());
        assert_eq!(&value[8..], &40i64.to_le_bytes());

        assert_eq!(schema.decode_key_value(&key, &value).unwrap(), tuple);
    }

    #[test]
    fn test_variable_length_regions() {
        let schema = Schema::new(
            "t",
            vec![
                Attribute::new("a", AttrType::Integer).key(true),
                Attribute::new("s", AttrType::String(0)),
            ],
        );
        assert!(schema.has_fixed_key_length());
        assert!(!schema.has_fixed_value_length());
        assert_eq!(schema.fixed_value_length(), None);
    }

    #[test]
    fn test_key_range() {
        let schema = Schema::new("t", vec![]);
        let (start, end) = schema.key_range();
        assert_eq!(start, b"t:".to_vec());
        assert_eq!(end, b"t;".to_vec());
        // Keys of a table whose name extends this one fall outside the range
        assert!(b"tx:".to_vec() >= end);
    }

    #[test]
    fn test_decode_wrong_prefix() {
        let schema = Schema::new("t", vec![Attribute::new("a", AttrType::Integer)]);
        let mut buf = b"u:".to_vec();
        buf.extend_from_slice(&1i64.to_le_bytes());
        assert!(matches!(schema.decode(&buf), Err(Error::Decode(_))));
    }
}
