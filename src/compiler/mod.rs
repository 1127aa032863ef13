//! Compiler
//!
//! Type analysis and code generation. Analysis annotates the parsed program
//! in place; code generation lowers it to a [`Program`] for the executor.

pub mod analyzer;
pub mod builtins;
pub mod codegen;
pub mod context;
pub mod layout;
pub mod program;

pub use analyzer::analyze;
pub use builtins::Builtin;
pub use codegen::generate;
pub use context::{CompilerContext, LoopContext, Staging, Variable};
pub use layout::{CellKind, RowLayout};
pub use program::{
    BufferId, Constant, CursorId, Frame, Instr, Label, PathStep, Program, ProgramBuilder, Reg,
};
