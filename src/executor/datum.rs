//! Runtime values held in registers

use std::cmp::Ordering;
use std::fmt;

use byteorder::ByteOrder;

use crate::catalog::{WireOrder, WORD_SIZE};
use crate::compiler::{CellKind, RowLayout};
use crate::error::{Error, Result};
use crate::lang::BinaryOperator;

/// A register value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Datum {
    /// Never written
    #[default]
    Unset,
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Tuple(Vec<Datum>),
    Array(Vec<Datum>),
}

impl Datum {
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Unset => "unset",
            Datum::Int(_) => "int",
            Datum::Double(_) => "double",
            Datum::Bool(_) => "bool",
            Datum::Str(_) => "string",
            Datum::Tuple(_) => "tuple",
            Datum::Array(_) => "array",
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Datum::Int(n) => Ok(*n),
            other => Err(unexpected("int", other)),
        }
    }

    /// Integers are true when non-zero
    pub fn truthy(&self) -> Result<bool> {
        match self {
            Datum::Bool(b) => Ok(*b),
            Datum::Int(n) => Ok(*n != 0),
            other => Err(unexpected("bool", other)),
        }
    }

    /// Apply a binary operator; integer arithmetic wraps
    pub fn binary(op: BinaryOperator, lhs: &Datum, rhs: &Datum) -> Result<Datum> {
        use BinaryOperator::*;

        if op.is_logical() {
            let (l, r) = (lhs.truthy()?, rhs.truthy()?);
            return Ok(Datum::Bool(if op == And { l && r } else { l || r }));
        }

        if op.is_comparison() {
            let ordering = match (lhs, rhs) {
                (Datum::Int(a), Datum::Int(b)) => Some(a.cmp(b)),
                (Datum::Double(a), Datum::Double(b)) => a.partial_cmp(b),
                (Datum::Str(a), Datum::Str(b)) => Some(a.cmp(b)),
                (Datum::Bool(a), Datum::Bool(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch(op, lhs, rhs)),
            };
            let result = match op {
                Eq => ordering == Some(Ordering::Equal),
                NotEq => ordering != Some(Ordering::Equal),
                Lt => ordering == Some(Ordering::Less),
                LtEq => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                Gt => ordering == Some(Ordering::Greater),
                _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            };
            return Ok(Datum::Bool(result));
        }

        match (lhs, rhs) {
            (Datum::Int(a), Datum::Int(b)) => {
                let (a, b) = (*a, *b);
                let value = match op {
                    Add => a.wrapping_add(b),
                    Sub => a.wrapping_sub(b),
                    Mul => a.wrapping_mul(b),
                    Div | Mod if b == 0 => return Err(Error::DivisionByZero),
                    Div => a.wrapping_div(b),
                    Mod => a.wrapping_rem(b),
                    _ => return Err(mismatch(op, lhs, rhs)),
                };
                Ok(Datum::Int(value))
            }
            (Datum::Double(a), Datum::Double(b)) => {
                let value = match op {
                    Add => a + b,
                    Sub => a - b,
                    Mul => a * b,
                    Div => a / b,
                    Mod => a % b,
                    _ => return Err(mismatch(op, lhs, rhs)),
                };
                Ok(Datum::Double(value))
            }
            (Datum::Str(a), Datum::Str(b)) if op == Add => Ok(Datum::Str(format!("{}{}", a, b))),
            _ => Err(mismatch(op, lhs, rhs)),
        }
    }

    /// Lay the value out as a row
    pub fn encode_row(&self, layout: &RowLayout) -> Result<Vec<u8>> {
        let mut leaves = Vec::with_capacity(layout.len());
        self.flatten(&mut leaves)?;
        if leaves.len() != layout.len() {
            return Err(Error::TupleSizeMismatch {
                expected: layout.len(),
                found: leaves.len(),
            });
        }

        let mut out = Vec::with_capacity(layout.fixed_size().unwrap_or(0));
        let mut word = [0u8; WORD_SIZE];
        for (leaf, cell) in leaves.into_iter().zip(layout.cells()) {
            match (cell, leaf) {
                (CellKind::Int, Datum::Int(n)) => WireOrder::write_i64(&mut word, *n),
                (CellKind::Int, Datum::Bool(b)) => WireOrder::write_i64(&mut word, i64::from(*b)),
                (CellKind::Double, Datum::Double(n)) => WireOrder::write_f64(&mut word, *n),
                (CellKind::Str, Datum::Str(s)) => {
                    WireOrder::write_u64(&mut word, s.len() as u64);
                    out.extend_from_slice(&word);
                    out.extend_from_slice(s.as_bytes());
                    continue;
                }
                (cell, leaf) => return Err(unexpected(&cell.to_string(), leaf)),
            }
            out.extend_from_slice(&word);
        }
        Ok(out)
    }

    fn flatten<'a>(&'a self, leaves: &mut Vec<&'a Datum>) -> Result<()> {
        match self {
            Datum::Tuple(fields) => {
                for field in fields {
                    field.flatten(leaves)?;
                }
                Ok(())
            }
            Datum::Array(_) | Datum::Unset => Err(Error::UnsupportedLayout(format!(
                "{} values cannot be laid out in a row",
                self.type_name()
            ))),
            _ => {
                leaves.push(self);
                Ok(())
            }
        }
    }
}

fn unexpected(expected: &str, found: &Datum) -> Error {
    Error::Internal(format!(
        "expected {} value, found {}",
        expected,
        found.type_name()
    ))
}

fn mismatch(op: BinaryOperator, lhs: &Datum, rhs: &Datum) -> Error {
    Error::Internal(format!(
        "operator '{}' applied to {} and {}",
        op,
        lhs.type_name(),
        rhs.type_name()
    ))
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, items: &[Datum]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }

        match self {
            Datum::Unset => write!(f, "<unset>"),
            Datum::Int(n) => write!(f, "{}", n),
            Datum::Double(n) => write!(f, "{}", n),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Str(s) => write!(f, "\"{}\"", s),
            Datum::Tuple(items) => {
                write!(f, "{{")?;
                list(f, items)?;
                write!(f, "}}")
            }
            Datum::Array(items) => {
                write!(f, "[")?;
                list(f, items)?;
                write!(f, "]")
            }
        }
    }
}
