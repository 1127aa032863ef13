//! Catalog module
//!
//! This module contains the schema catalog, schema definitions, column
//! types, cell values and the tuple codec.

pub mod catalog;
pub mod schema;
pub mod types;
pub mod value;

pub use catalog::{schema_key, validate_table_name, Catalog, MemoryCatalog, SCHEMA_KEY_PREFIX};
pub use schema::{Attribute, Schema, KEY_SEPARATOR};
pub use types::{AttrProperties, AttrType, WireOrder, WORD_SIZE};
pub use value::{MaybeValue, Value};
