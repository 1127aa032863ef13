//! Program execution module
//!
//! This module contains the runtime value type and the interpreter that
//! runs generated programs against a storage backend.

pub mod datum;
pub mod executor;

pub use datum::Datum;
pub use executor::{EmittedRow, Execution, Executor, DEFAULT_SEED};
