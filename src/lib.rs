//! REIR - a compiler for a small relational programming language
//!
//! This library provides the components that turn program text into rows:
//! - Language front end (lexer, parser, AST, types)
//! - Type analysis and code generation
//! - Schemas, the tuple codec and the schema catalog
//! - Storage backend contract and an in-memory backend
//! - Program execution and the compile-and-run driver

pub mod backend;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod lang;

pub use driver::{compile_and_run, Compilation, Driver};
pub use error::{Error, Phase, Result};
