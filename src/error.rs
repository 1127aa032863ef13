//! Error types for REIR
//!
//! This module defines all error types raised while compiling and running a
//! program: lexing, parsing, analysis, code generation, the tuple codec,
//! the catalog, the storage backend and the program executor.

use thiserror::Error;

/// The compilation phase an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lex,
    Syntax,
    Type,
    Schema,
    Encode,
    Decode,
    Catalog,
    Backend,
    Runtime,
    Io,
    Internal,
}

/// The main error type for REIR
#[derive(Error, Debug)]
pub enum Error {
    // ========== Lexer Errors ==========
    #[error("Lexer error: unterminated string literal starting at {row}:{col}")]
    UnterminatedString { row: u32, col: u32 },

    #[error("Lexer error: don't use identifier '{text}' inside of number at {row}:{col}")]
    InvalidNumber { text: String, row: u32, col: u32 },

    #[error("Lexer error: unknown escape sequence '\\{escape}' at {row}:{col}")]
    InvalidEscape { escape: char, row: u32, col: u32 },

    // ========== Parser Errors ==========
    #[error("Parse error: unexpected token '{found}', expected {expected} at {row}:{col}")]
    UnexpectedToken {
        expected: String,
        found: String,
        row: u32,
        col: u32,
    },

    #[error("Parse error: unexpected end of input, expected {0}")]
    UnexpectedEof(String),

    #[error("Parse error: invalid literal '{text}' at {row}:{col}")]
    InvalidLiteral { text: String, row: u32, col: u32 },

    #[error("Parse error: unknown isolation level '{0}'")]
    UnknownIsolation(String),

    #[error("Parse error: unknown attribute property '{0}'")]
    UnknownProperty(String),

    // ========== Type Errors ==========
    #[error("Type error: undefined variable '{0}' referenced")]
    UndefinedVariable(String),

    #[error("Type error: undefined type '{0}'")]
    UndefinedType(String),

    #[error("Type error: undefined table '{0}'")]
    UndefinedTable(String),

    #[error("Type error: undefined function '{0}'")]
    UndefinedFunction(String),

    #[error("Type error: member access on non-tuple type {0}")]
    NotATuple(String),

    #[error("Type error: member '{member}' not found in {ty}")]
    MemberNotFound { member: String, ty: String },

    #[error("Type error: index access on non-array type {0}")]
    NotAnArray(String),

    #[error("Type error: cannot convert {from} to {to}")]
    TypeMismatch { from: String, to: String },

    #[error("Type error: operator '{op}' applied to mismatched types {lhs} and {rhs}")]
    OperandMismatch { op: String, lhs: String, rhs: String },

    #[error("Type error: operator '{op}' is not supported for {ty}")]
    UnsupportedOperator { op: String, ty: String },

    #[error("Type error: cannot infer the type of an empty array literal")]
    EmptyArrayLiteral,

    #[error("Type error: {0} cannot be used as a condition")]
    InvalidCondition(String),

    #[error("Type error: {0} is not assignable")]
    NotAssignable(String),

    #[error("Type error: only tuple values can be {action}, found {ty}")]
    NotATupleValue { action: String, ty: String },

    #[error("Type error: function '{function}' expects {expected}, found {found}")]
    ArgumentMismatch {
        function: String,
        expected: String,
        found: String,
    },

    #[error("Type error: '{0}' used outside of a loop")]
    JumpOutsideLoop(String),

    #[error("Type error: nested transactions are not supported")]
    NestedTransaction,

    // ========== Schema Errors ==========
    #[error("Schema error: table '{table}' has a variable-length {region} region")]
    VariableLengthLayout { table: String, region: String },

    #[error("Schema error: tuple size does not match (expected {expected}, found {found})")]
    TupleSizeMismatch { expected: usize, found: usize },

    #[error("Schema error: column '{column}' of table '{table}' has unsupported type {ty}")]
    UnsupportedColumn {
        table: String,
        column: String,
        ty: String,
    },

    #[error("Schema error: invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("Schema error: {0}")]
    UnsupportedLayout(String),

    // ========== Codec Errors ==========
    #[error("Encode error: null value not allowed for attribute '{0}'")]
    NullNotAllowed(String),

    #[error("Encode error: value too large for attribute '{0}'")]
    ValueTooLarge(String),

    #[error("Encode error: attribute '{attribute}' expects {expected}, found {found}")]
    ValueTypeMismatch {
        attribute: String,
        expected: String,
        found: String,
    },

    #[error("Encode error: buffer too short (needed {needed}, available {available})")]
    BufferTooShort { needed: usize, available: usize },

    #[error("Encode error: {0} values cannot be encoded")]
    EncodeUnsupported(String),

    #[error("Decode error: {0} values cannot be decoded")]
    DecodeUnsupported(String),

    #[error("Decode error: truncated input (needed {needed}, available {available})")]
    Truncated { needed: usize, available: usize },

    #[error("Decode error: {0}")]
    Decode(String),

    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' not found")]
    TableNotFound(String),

    // ========== Backend Errors ==========
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend error: key already exists ({0})")]
    DuplicateKey(String),

    #[error("Backend error: no active transaction")]
    NoActiveTransaction,

    #[error("Backend error: transaction {0} is already active")]
    TransactionAlreadyActive(u64),

    // ========== Execution Errors ==========
    #[error("Execution error: division by zero")]
    DivisionByZero,

    #[error("Execution error: index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },

    #[error("Execution error: step limit of {0} exceeded")]
    StepLimitExceeded(u64),

    // ========== I/O Errors ==========
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The phase this error belongs to
    pub fn phase(&self) -> Phase {
        use Error::*;
        match self {
            UnterminatedString { .. } | InvalidNumber { .. } | InvalidEscape { .. } => Phase::Lex,
            UnexpectedToken { .. }
            | UnexpectedEof(_)
            | InvalidLiteral { .. }
            | UnknownIsolation(_)
            | UnknownProperty(_) => Phase::Syntax,
            UndefinedVariable(_)
            | UndefinedType(_)
            | UndefinedTable(_)
            | UndefinedFunction(_)
            | NotATuple(_)
            | MemberNotFound { .. }
            | NotAnArray(_)
            | TypeMismatch { .. }
            | OperandMismatch { .. }
            | UnsupportedOperator { .. }
            | EmptyArrayLiteral
            | InvalidCondition(_)
            | NotAssignable(_)
            | NotATupleValue { .. }
            | ArgumentMismatch { .. }
            | JumpOutsideLoop(_)
            | NestedTransaction => Phase::Type,
            VariableLengthLayout { .. }
            | TupleSizeMismatch { .. }
            | UnsupportedColumn { .. }
            | InvalidTableName(_)
            | UnsupportedLayout(_) => Phase::Schema,
            NullNotAllowed(_)
            | ValueTooLarge(_)
            | ValueTypeMismatch { .. }
            | BufferTooShort { .. }
            | EncodeUnsupported(_) => Phase::Encode,
            DecodeUnsupported(_) | Truncated { .. } | Decode(_) => Phase::Decode,
            TableNotFound(_) => Phase::Catalog,
            Backend(_) | DuplicateKey(_) | NoActiveTransaction | TransactionAlreadyActive(_) => {
                Phase::Backend
            }
            DivisionByZero | IndexOutOfBounds { .. } | StepLimitExceeded(_) => Phase::Runtime,
            IoError(_) | Serialization(_) => Phase::Io,
            Internal(_) => Phase::Internal,
        }
    }
}

/// Result type alias for REIR operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UndefinedVariable("x".to_string());
        assert_eq!(err.to_string(), "Type error: undefined variable 'x' referenced");

        let err = Error::UnexpectedToken {
            expected: "'{'".to_string(),
            found: "emit".to_string(),
            row: 2,
            col: 7,
        };
        assert_eq!(
            err.to_string(),
            "Parse error: unexpected token 'emit', expected '{' at 2:7"
        );
    }

    #[test]
    fn test_error_phase() {
        assert_eq!(Error::UnterminatedString { row: 1, col: 1 }.phase(), Phase::Lex);
        assert_eq!(Error::EmptyArrayLiteral.phase(), Phase::Type);
        assert_eq!(
            Error::TupleSizeMismatch {
                expected: 2,
                found: 3
            }
            .phase(),
            Phase::Schema
        );
        assert_eq!(Error::NullNotAllowed("a".into()).phase(), Phase::Encode);
        assert_eq!(Error::Decode("bad".into()).phase(), Phase::Decode);
        assert_eq!(Error::DuplicateKey("t:".into()).phase(), Phase::Backend);
        assert_eq!(Error::DivisionByZero.phase(), Phase::Runtime);
    }
}
