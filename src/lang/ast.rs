//! Abstract Syntax Tree definitions
//!
//! Expressions and statements are closed sum types. Every expression has a
//! `resolved_type` slot that the analyzer fills in place; every statement
//! has an id the code generator uses to find the storage reserved for it.

use std::fmt;

use super::types::Type;
use crate::backend::Isolation;
use crate::catalog::AttrProperties;

/// Statement identifier, unique within one parsed program
pub type NodeId = usize;

/// Source position of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub row: u32,
    pub col: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

// ========== Types ==========

/// A type as written in the source
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `int`, `double`, `string`, `bool`, `date` or a named tuple type
    Named(String),
    /// `[T]`
    Array(Box<TypeExpr>),
    /// `{ int:a key, string(8):b }`
    Tuple(Vec<FieldDecl>),
}

/// One member of a tuple type as written in the source
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub type_name: String,
    pub size: Option<usize>,
    pub name: String,
    pub props: AttrProperties,
}

// ========== Expressions ==========

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Double(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Double(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A literal or a parenthesized expression
#[derive(Debug, Clone, PartialEq)]
pub enum Primary {
    Literal(Literal),
    Nested(Box<Expr>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
}

impl BinaryOperator {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Sub
                | BinaryOperator::Mul
                | BinaryOperator::Div
                | BinaryOperator::Mod
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::NotEq
                | BinaryOperator::Lt
                | BinaryOperator::LtEq
                | BinaryOperator::Gt
                | BinaryOperator::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Expression variants
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Primary(Primary),
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    PointerOf(Box<Expr>),
    RowLiteral(Vec<Expr>),
    ArrayLiteral(Vec<Expr>),
    VariableReference {
        name: String,
        /// Statement that introduced the variable, set by analysis
        binding: Option<NodeId>,
    },
    FunctionCall {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    ArrayReference {
        parent: Box<Expr>,
        index: Box<Expr>,
    },
    MemberReference {
        parent: Box<Expr>,
        name: String,
        /// Member position, set by analysis
        index: Option<usize>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
}

/// An expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
    pub resolved_type: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Self {
            kind,
            pos,
            resolved_type: None,
        }
    }

    pub fn literal(literal: Literal, pos: Position) -> Self {
        Self::new(ExprKind::Primary(Primary::Literal(literal)), pos)
    }

    pub fn variable(name: impl Into<String>, pos: Position) -> Self {
        Self::new(
            ExprKind::VariableReference {
                name: name.into(),
                binding: None,
            },
            pos,
        )
    }

    pub fn binary(op: BinaryOperator, lhs: Expr, rhs: Expr, pos: Position) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            pos,
        )
    }

    pub fn assign(target: Expr, value: Expr, pos: Position) -> Self {
        Self::new(
            ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            pos,
        )
    }

    /// Whether this expression names a storage location
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::VariableReference { .. } => true,
            ExprKind::MemberReference { parent, .. } | ExprKind::ArrayReference { parent, .. } => {
                parent.is_lvalue()
            }
            ExprKind::Primary(Primary::Nested(inner)) => inner.is_lvalue(),
            _ => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }

        match &self.kind {
            ExprKind::Primary(Primary::Literal(l)) => write!(f, "{}", l),
            ExprKind::Primary(Primary::Nested(e)) => write!(f, "({})", e),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            ExprKind::PointerOf(e) => write!(f, "&{}", e),
            ExprKind::RowLiteral(items) => {
                write!(f, "{{")?;
                list(f, items)?;
                write!(f, "}}")
            }
            ExprKind::ArrayLiteral(items) => {
                write!(f, "[")?;
                list(f, items)?;
                write!(f, "]")
            }
            ExprKind::VariableReference { name, .. } => write!(f, "{}", name),
            ExprKind::FunctionCall { callee, args } => {
                write!(f, "{}(", callee)?;
                list(f, args)?;
                write!(f, ")")
            }
            ExprKind::ArrayReference { parent, index } => write!(f, "{}[{}]", parent, index),
            ExprKind::MemberReference { parent, name, .. } => write!(f, "{}.{}", parent, name),
            ExprKind::Assign { target, value } => write!(f, "{} = {}", target, value),
        }
    }
}

// ========== Statements ==========

/// Loop jump kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Continue,
}

impl fmt::Display for JumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpKind::Break => write!(f, "break"),
            JumpKind::Continue => write!(f, "continue"),
        }
    }
}

/// A sequence of statements; the program itself is one block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

impl Block {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Statement variants
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Block),
    Transaction {
        isolation: Isolation,
        body: Block,
    },
    /// `define <{...}> name`
    Define {
        ty: TypeExpr,
        name: String,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Block,
    },
    Jump(JumpKind),
    Emit(Expr),
    Insert {
        table: String,
        value: Expr,
    },
    Scan {
        table: String,
        binding: String,
        body: Block,
    },
    Let {
        name: String,
        value: Expr,
        declared: Option<TypeExpr>,
    },
    /// `tuple name {...}`
    DefineTuple {
        name: String,
        ty: TypeExpr,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    Expr(Expr),
}

/// A statement node
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub pos: Position,
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(id: NodeId, pos: Position, kind: StmtKind) -> Self {
        Self { id, pos, kind }
    }
}
