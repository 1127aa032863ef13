//! Token definitions
//!
//! This module defines all tokens that can appear in a REIR program.

use std::fmt;

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ========== Keywords ==========
    Int,
    Define,
    Let,
    Transaction,
    Serializable,
    If,
    Else,
    For,
    Emit,
    Insert,
    Scan,
    Break,
    Continue,
    Tuple,

    // ========== Literals ==========
    /// Identifier (variable, table, member or type name)
    Identifier,
    /// Integer literal
    Number,
    /// Floating-point literal
    Float,
    /// Double-quoted string literal
    String,

    // ========== Symbols ==========
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Colon,
    Semicolon,

    // ========== Operators ==========
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `=`
    Assign,
    Dot,
    /// `&`, used as the pointer-of prefix
    Ampersand,
    /// `<`, also the opening angle of a row type
    OpenAngle,
    /// `>`, also the closing angle of a row type
    CloseAngle,
    EqEq,
    NotEq,
    LessEq,
    GreaterEq,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AndAnd,
    OrOr,

    // ========== Special ==========
    /// Operator run that matches no known operator
    Invalid,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Check if this token kind is a reserved word
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Int
                | TokenKind::Define
                | TokenKind::Let
                | TokenKind::Transaction
                | TokenKind::Serializable
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::Emit
                | TokenKind::Insert
                | TokenKind::Scan
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Tuple
        )
    }

    /// Try to convert a name run to a keyword (case-insensitive)
    pub fn from_keyword(s: &str) -> Option<TokenKind> {
        match s.to_uppercase().as_str() {
            "INT" => Some(TokenKind::Int),
            "DEFINE" => Some(TokenKind::Define),
            "LET" => Some(TokenKind::Let),
            "TRANSACTION" => Some(TokenKind::Transaction),
            "SERIALIZABLE" => Some(TokenKind::Serializable),
            "IF" => Some(TokenKind::If),
            "ELSE" => Some(TokenKind::Else),
            "FOR" => Some(TokenKind::For),
            "EMIT" => Some(TokenKind::Emit),
            "INSERT" => Some(TokenKind::Insert),
            "SCAN" => Some(TokenKind::Scan),
            "BREAK" => Some(TokenKind::Break),
            "CONTINUE" => Some(TokenKind::Continue),
            "TUPLE" => Some(TokenKind::Tuple),
            _ => None,
        }
    }

    /// Map a single-character symbol
    pub fn from_symbol(c: char) -> Option<TokenKind> {
        match c {
            '{' => Some(TokenKind::OpenBrace),
            '}' => Some(TokenKind::CloseBrace),
            '(' => Some(TokenKind::OpenParen),
            ')' => Some(TokenKind::CloseParen),
            '[' => Some(TokenKind::OpenBracket),
            ']' => Some(TokenKind::CloseBracket),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        }
    }

    /// Map a complete operator run; unknown runs are `Invalid`
    pub fn from_operator(run: &str) -> TokenKind {
        match run {
            "+" => TokenKind::Plus,
            "-" => TokenKind::Minus,
            "*" => TokenKind::Star,
            "/" => TokenKind::Slash,
            "%" => TokenKind::Percent,
            "=" => TokenKind::Assign,
            "." => TokenKind::Dot,
            "&" => TokenKind::Ampersand,
            "<" => TokenKind::OpenAngle,
            ">" => TokenKind::CloseAngle,
            "==" => TokenKind::EqEq,
            "!=" => TokenKind::NotEq,
            "<=" => TokenKind::LessEq,
            ">=" => TokenKind::GreaterEq,
            "+=" => TokenKind::PlusAssign,
            "-=" => TokenKind::MinusAssign,
            "*=" => TokenKind::StarAssign,
            "/=" => TokenKind::SlashAssign,
            "%=" => TokenKind::PercentAssign,
            "&&" => TokenKind::AndAnd,
            "||" => TokenKind::OrOr,
            _ => TokenKind::Invalid,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Int => "INT",
            TokenKind::Define => "DEFINE",
            TokenKind::Let => "LET",
            TokenKind::Transaction => "TRANSACTION",
            TokenKind::Serializable => "SERIALIZABLE",
            TokenKind::If => "IF",
            TokenKind::Else => "ELSE",
            TokenKind::For => "FOR",
            TokenKind::Emit => "EMIT",
            TokenKind::Insert => "INSERT",
            TokenKind::Scan => "SCAN",
            TokenKind::Break => "BREAK",
            TokenKind::Continue => "CONTINUE",
            TokenKind::Tuple => "TUPLE",
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::OpenBrace => "'{'",
            TokenKind::CloseBrace => "'}'",
            TokenKind::OpenParen => "'('",
            TokenKind::CloseParen => "')'",
            TokenKind::OpenBracket => "'['",
            TokenKind::CloseBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Semicolon => "';'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Assign => "'='",
            TokenKind::Dot => "'.'",
            TokenKind::Ampersand => "'&'",
            TokenKind::OpenAngle => "'<'",
            TokenKind::CloseAngle => "'>'",
            TokenKind::EqEq => "'=='",
            TokenKind::NotEq => "'!='",
            TokenKind::LessEq => "'<='",
            TokenKind::GreaterEq => "'>='",
            TokenKind::PlusAssign => "'+='",
            TokenKind::MinusAssign => "'-='",
            TokenKind::StarAssign => "'*='",
            TokenKind::SlashAssign => "'/='",
            TokenKind::PercentAssign => "'%='",
            TokenKind::AndAnd => "'&&'",
            TokenKind::OrOr => "'||'",
            TokenKind::Invalid => "invalid operator",
            TokenKind::Eof => "EOF",
        };
        write!(f, "{}", s)
    }
}

/// A token with its source text and position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token (string literals hold the unescaped contents)
    pub text: String,
    /// Line, starting at 1
    pub row: u32,
    /// Column, starting at 1
    pub col: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            kind,
            text: text.into(),
            row,
            col,
        }
    }

    pub fn eof(row: u32, col: u32) -> Self {
        Self::new(TokenKind::Eof, "", row, col)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::String => write!(f, "\"{}\"", self.text),
            _ => write!(f, "{}", self.text),
        }
    }
}
