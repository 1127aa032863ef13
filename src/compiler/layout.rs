//! In-memory row layout
//!
//! Rows handed to `emit` or staged for `insert` are laid out as a flat
//! sequence of cells: integers, dates and booleans as one 8-byte word,
//! doubles as an 8-byte float, strings as an 8-byte length followed by the
//! bytes. Nested tuples are laid out inline.

use std::fmt;

use byteorder::ByteOrder;

use crate::catalog::{AttrType, Value, WireOrder, WORD_SIZE};
use crate::error::{Error, Result};
use crate::lang::{PrimaryType, Type};

/// Kind of one flattened cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Int,
    Double,
    Str,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Int => write!(f, "i64"),
            CellKind::Double => write!(f, "f64"),
            CellKind::Str => write!(f, "str"),
        }
    }
}

/// Flattened cell list of a row type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowLayout {
    cells: Vec<CellKind>,
}

impl RowLayout {
    pub fn new(cells: Vec<CellKind>) -> Self {
        Self { cells }
    }

    /// Layout of a value of the given type; arrays have none
    pub fn from_type(ty: &Type) -> Result<Self> {
        let mut cells = Vec::new();
        flatten(ty, &mut cells)?;
        Ok(Self { cells })
    }

    pub fn cells(&self) -> &[CellKind] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Size in bytes when no cell is a string
    pub fn fixed_size(&self) -> Option<usize> {
        self.cells
            .iter()
            .map(|c| match c {
                CellKind::Str => None,
                _ => Some(WORD_SIZE),
            })
            .sum()
    }

    /// Read the cells of a laid out row back
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(self.cells.len());
        let mut offset = 0;
        for cell in &self.cells {
            let rest = bytes.get(offset..).unwrap_or_default();
            let (value, read) = match cell {
                CellKind::Int => AttrType::Integer.decode(rest)?,
                CellKind::Str => AttrType::String(0).decode(rest)?,
                CellKind::Double => {
                    let word = rest.get(..WORD_SIZE).ok_or(Error::Truncated {
                        needed: WORD_SIZE,
                        available: rest.len(),
                    })?;
                    (Value::Float64(WireOrder::read_f64(word)), WORD_SIZE)
                }
            };
            values.push(value);
            offset += read;
        }

        if offset != bytes.len() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after row",
                bytes.len() - offset
            )));
        }
        Ok(values)
    }
}

fn flatten(ty: &Type, cells: &mut Vec<CellKind>) -> Result<()> {
    match ty {
        Type::Primary(PrimaryType::Integer | PrimaryType::Date | PrimaryType::Bool) => {
            cells.push(CellKind::Int)
        }
        Type::Primary(PrimaryType::Double) => cells.push(CellKind::Double),
        Type::Primary(PrimaryType::String) => cells.push(CellKind::Str),
        Type::Tuple(tuple) => {
            for field in &tuple.fields {
                flatten(&field.ty, cells)?;
            }
        }
        Type::Array(_) => {
            return Err(Error::UnsupportedLayout(format!(
                "arrays cannot be laid out in a row ({})",
                ty
            )))
        }
    }
    Ok(())
}

impl fmt::Display for RowLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", cell)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{TupleField, TupleType};

    fn tuple(fields: Vec<Type>) -> Type {
        Type::Tuple(TupleType::new(
            fields.into_iter().map(TupleField::anonymous).collect(),
        ))
    }

    #[test]
    fn test_nested_tuples_flatten() {
        let ty = tuple(vec![
            Type::integer(),
            tuple(vec![Type::bool(), Type::string()]),
            Type::double(),
        ]);
        let layout = RowLayout::from_type(&ty).unwrap();
        assert_eq!(
            layout.cells(),
            &[CellKind::Int, CellKind::Int, CellKind::Str, CellKind::Double]
        );
        assert_eq!(layout.fixed_size(), None);
        assert_eq!(layout.to_string(), "(i64, i64, str, f64)");
    }

    #[test]
    fn test_arrays_rejected() {
        let ty = tuple(vec![Type::array(Type::integer())]);
        assert!(matches!(
            RowLayout::from_type(&ty),
            Err(Error::UnsupportedLayout(_))
        ));
    }

    #[test]
    fn test_decode() {
        let layout = RowLayout::new(vec![CellKind::Int, CellKind::Str]);
        let mut bytes = vec![0u8; 8];
        WireOrder::write_i64(&mut bytes, -7);
        bytes.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 0]);
        bytes.extend_from_slice(b"hi");

        let values = layout.decode(&bytes).unwrap();
        assert_eq!(values, vec![Value::Int64(-7), Value::Varchar("hi".to_string())]);

        bytes.push(0);
        assert!(matches!(layout.decode(&bytes), Err(Error::Decode(_))));
        assert!(matches!(
            layout.decode(&bytes[..4]),
            Err(Error::Truncated { .. })
        ));
    }
}
