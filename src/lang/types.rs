//! Language types
//!
//! Every analyzed expression carries one of these. Tuples compare
//! structurally: two tuple types are equal when their members match pairwise
//! by name and type, in order.

use std::fmt;

use crate::catalog::{AttrProperties, AttrType, Attribute, Schema};
use crate::error::{Error, Result};

/// Member name given to row literal elements
pub const ANONYMOUS: &str = "(anonymous)";

/// Scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimaryType {
    Integer,
    Double,
    String,
    Date,
    Bool,
}

impl PrimaryType {
    /// Resolve a primary type name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(PrimaryType::Integer),
            "double" => Some(PrimaryType::Double),
            "string" => Some(PrimaryType::String),
            "date" => Some(PrimaryType::Date),
            "bool" => Some(PrimaryType::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for PrimaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryType::Integer => write!(f, "int"),
            PrimaryType::Double => write!(f, "double"),
            PrimaryType::String => write!(f, "string"),
            PrimaryType::Date => write!(f, "date"),
            PrimaryType::Bool => write!(f, "bool"),
        }
    }
}

/// One member of a tuple type
#[derive(Debug, Clone)]
pub struct TupleField {
    pub name: String,
    pub ty: Type,
    pub props: AttrProperties,
    pub size: Option<usize>,
}

impl TupleField {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            props: AttrProperties::empty(),
            size: None,
        }
    }

    pub fn anonymous(ty: Type) -> Self {
        Self::new(ANONYMOUS, ty)
    }

    pub fn is_anonymous(&self) -> bool {
        self.name == ANONYMOUS
    }
}

impl PartialEq for TupleField {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty
    }
}

/// Ordered list of named members
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TupleType {
    pub fields: Vec<TupleField>,
}

impl TupleType {
    pub fn new(fields: Vec<TupleField>) -> Self {
        Self { fields }
    }

    /// Position of a named member
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A language type
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primary(PrimaryType),
    Array(Box<Type>),
    Tuple(TupleType),
}

impl Type {
    pub fn integer() -> Self {
        Type::Primary(PrimaryType::Integer)
    }

    pub fn double() -> Self {
        Type::Primary(PrimaryType::Double)
    }

    pub fn string() -> Self {
        Type::Primary(PrimaryType::String)
    }

    pub fn date() -> Self {
        Type::Primary(PrimaryType::Date)
    }

    pub fn bool() -> Self {
        Type::Primary(PrimaryType::Bool)
    }

    pub fn array(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }

    pub fn primary(&self) -> Option<PrimaryType> {
        match self {
            Type::Primary(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_primary(&self, p: PrimaryType) -> bool {
        self.primary() == Some(p)
    }

    pub fn as_tuple(&self) -> Option<&TupleType> {
        match self {
            Type::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// Whether a value of type `self` may be stored where `target` is declared.
    ///
    /// Identical types always match; tuples also match when every member
    /// type matches and each member of `self` is anonymous or has the same
    /// name, so that row literals can initialize declared tuples.
    pub fn assignable_to(&self, target: &Type) -> bool {
        match (self, target) {
            (Type::Tuple(value), Type::Tuple(declared)) => {
                value.len() == declared.len()
                    && value.fields.iter().zip(&declared.fields).all(|(v, d)| {
                        (v.is_anonymous() || v.name == d.name) && v.ty.assignable_to(&d.ty)
                    })
            }
            (Type::Array(value), Type::Array(declared)) => value.assignable_to(declared),
            _ => self == target,
        }
    }

    /// Tuple type describing the rows of a table
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        let fields = schema
            .attributes()
            .iter()
            .map(|attr| {
                let ty = match attr.ty {
                    AttrType::Integer => Type::integer(),
                    AttrType::Double => Type::double(),
                    AttrType::String(_) => Type::string(),
                    AttrType::Date => Type::date(),
                    AttrType::Unknown => {
                        return Err(Error::UndefinedType(format!(
                            "{}.{}",
                            schema.name(),
                            attr.name
                        )))
                    }
                };
                Ok(TupleField {
                    name: attr.name.clone(),
                    ty,
                    props: attr.props,
                    size: attr.ty.size().filter(|_| matches!(attr.ty, AttrType::String(_))),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Type::Tuple(TupleType::new(fields)))
    }

    /// Schema for a table whose rows have this tuple type
    pub fn to_schema(&self, table: &str) -> Result<Schema> {
        let tuple = self.as_tuple().ok_or_else(|| Error::NotATupleValue {
            action: "defined as tables".to_string(),
            ty: self.to_string(),
        })?;

        let mut schema = Schema::new(table, Vec::with_capacity(tuple.len()));
        for field in &tuple.fields {
            let ty = match field.ty {
                Type::Primary(PrimaryType::Integer) => AttrType::Integer,
                Type::Primary(PrimaryType::Double) => AttrType::Double,
                Type::Primary(PrimaryType::String) => AttrType::String(field.size.unwrap_or(16)),
                Type::Primary(PrimaryType::Date) => AttrType::Date,
                _ => {
                    return Err(Error::UnsupportedColumn {
                        table: table.to_string(),
                        column: field.name.clone(),
                        ty: field.ty.to_string(),
                    })
                }
            };
            schema.add_attribute(Attribute::new(field.name.clone(), ty).with_properties(field.props));
        }
        Ok(schema)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primary(p) => write!(f, "{}", p),
            Type::Array(elem) => write!(f, "[{}]", elem),
            Type::Tuple(tuple) => {
                write!(f, "{{")?;
                for (i, field) in tuple.fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if field.is_anonymous() {
                        write!(f, "{}", field.ty)?;
                    } else {
                        write!(f, "{}:{}", field.ty, field.name)?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: &str, y: &str) -> Type {
        Type::Tuple(TupleType::new(vec![
            TupleField::new(x, Type::integer()),
            TupleField::new(y, Type::integer()),
        ]))
    }

    #[test]
    fn test_tuple_equality_is_structural() {
        assert_eq!(point("x", "y"), point("x", "y"));
        assert_ne!(point("x", "y"), point("y", "x"));

        let mut keyed = point("x", "y");
        if let Type::Tuple(t) = &mut keyed {
            t.fields[0].props = AttrProperties::KEY;
        }
        assert_eq!(keyed, point("x", "y"));
    }

    #[test]
    fn test_anonymous_rows_are_assignable() {
        let literal = Type::Tuple(TupleType::new(vec![
            TupleField::anonymous(Type::integer()),
            TupleField::anonymous(Type::integer()),
        ]));
        assert!(literal.assignable_to(&point("x", "y")));
        assert!(!point("a", "b").assignable_to(&point("x", "y")));
        assert!(!Type::integer().assignable_to(&point("x", "y")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::array(Type::integer()).to_string(), "[int]");
        assert_eq!(point("x", "y").to_string(), "{int:x, int:y}");
    }

    #[test]
    fn test_schema_conversion() {
        let mut ty = point("a", "b");
        if let Type::Tuple(t) = &mut ty {
            t.fields[0].props = AttrProperties::KEY;
        }
        let schema = ty.to_schema("t").unwrap();
        assert_eq!(schema.serialize(), "t:(a (0 0) 2)(b (0 0) 0)");
        assert_eq!(Type::from_schema(&schema).unwrap(), ty);
    }

    #[test]
    fn test_array_column_rejected() {
        let ty = Type::Tuple(TupleType::new(vec![TupleField::new(
            "xs",
            Type::array(Type::integer()),
        )]));
        assert!(matches!(
            ty.to_schema("t"),
            Err(Error::UnsupportedColumn { .. })
        ));
    }
}
