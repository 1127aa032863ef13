//! Language front end
//!
//! Lexer, parser, AST and the type representation shared by the analyzer
//! and the code generator.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod types;

pub use ast::{
    BinaryOperator, Block, Expr, ExprKind, FieldDecl, JumpKind, Literal, NodeId, Position,
    Primary, Stmt, StmtKind, TypeExpr,
};
pub use lexer::{tokenize, Lexer};
pub use parser::{parse_program, Parser};
pub use token::{Token, TokenKind};
pub use types::{PrimaryType, TupleField, TupleType, Type};
