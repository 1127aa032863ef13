//! Lexer (Tokenizer)
//!
//! This module converts program text into a stream of tokens. The scanner is
//! keyed on character class: whitespace separates tokens, a quote opens a
//! string, single-character symbols are emitted immediately, operator
//! characters accumulate into a run that is looked up once it ends, digits
//! form numbers and everything else forms names.

use super::token::{Token, TokenKind};
use crate::error::{Error, Result};

const SYMBOL_CHARS: &str = "{}()[],:;";
const OPERATOR_CHARS: &str = "+-*/%=!<>.&|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Whitespace,
    Quote,
    Symbol,
    Operator,
    Digit,
    Name,
}

fn classify(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Whitespace
    } else if c == '"' {
        CharClass::Quote
    } else if SYMBOL_CHARS.contains(c) {
        CharClass::Symbol
    } else if OPERATOR_CHARS.contains(c) {
        CharClass::Operator
    } else if c.is_ascii_digit() {
        CharClass::Digit
    } else {
        CharClass::Name
    }
}

/// Program lexer
pub struct Lexer {
    /// Input characters
    input: Vec<char>,
    /// Current position in input
    position: usize,
    /// Current line, starting at 1
    row: u32,
    /// Current column, starting at 1
    col: u32,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            row: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input; the last token is always `Eof`
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();

        if self.is_at_end() {
            return Ok(Token::eof(self.row, self.col));
        }

        let (row, col) = (self.row, self.col);
        let ch = self.current_char();

        match classify(ch) {
            CharClass::Symbol => {
                self.advance();
                let kind = TokenKind::from_symbol(ch)
                    .ok_or_else(|| Error::Internal(format!("unmapped symbol '{}'", ch)))?;
                Ok(Token::new(kind, ch.to_string(), row, col))
            }
            CharClass::Quote => self.read_string(row, col),
            CharClass::Operator => Ok(self.read_operator(row, col)),
            CharClass::Digit => self.read_number(row, col),
            CharClass::Name => Ok(self.read_name(row, col)),
            CharClass::Whitespace => Err(Error::Internal(
                "whitespace left after skipping trivia".to_string(),
            )),
        }
    }

    // ========== Helper Methods ==========

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input.get(self.position).copied().unwrap_or('\0')
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(&c) = self.input.get(self.position) {
            if c == '\n' {
                self.row += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.position += 1;
        }
    }

    fn at_line_comment(&self) -> bool {
        !self.is_at_end() && self.current_char() == '/' && self.peek_char() == Some('/')
    }

    /// Skip whitespace and `//` line comments
    fn skip_trivia(&mut self) {
        loop {
            while !self.is_at_end() && classify(self.current_char()) == CharClass::Whitespace {
                self.advance();
            }
            if self.at_line_comment() {
                while !self.is_at_end() && self.current_char() != '\n' {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, row: u32, col: u32) -> Result<Token> {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            if self.is_at_end() {
                return Err(Error::UnterminatedString { row, col });
            }
            let c = self.current_char();
            match c {
                '"' => {
                    self.advance();
                    break;
                }
                '\\' => {
                    let (esc_row, esc_col) = (self.row, self.col);
                    self.advance();
                    if self.is_at_end() {
                        return Err(Error::UnterminatedString { row, col });
                    }
                    let escape = self.current_char();
                    let unescaped = match escape {
                        'n' => '\n',
                        't' => '\t',
                        '"' => '"',
                        '\\' => '\\',
                        _ => {
                            return Err(Error::InvalidEscape {
                                escape,
                                row: esc_row,
                                col: esc_col,
                            })
                        }
                    };
                    value.push(unescaped);
                    self.advance();
                }
                _ => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        Ok(Token::new(TokenKind::String, value, row, col))
    }

    fn read_operator(&mut self, row: u32, col: u32) -> Token {
        let mut run = String::new();

        while !self.is_at_end()
            && classify(self.current_char()) == CharClass::Operator
            && !self.at_line_comment()
        {
            run.push(self.current_char());
            self.advance();
        }

        Token::new(TokenKind::from_operator(&run), run, row, col)
    }

    fn read_number(&mut self, row: u32, col: u32) -> Result<Token> {
        let mut text = String::new();
        let mut kind = TokenKind::Number;

        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            text.push(self.current_char());
            self.advance();
        }

        // Fractional part only when a digit follows the dot
        if !self.is_at_end()
            && self.current_char() == '.'
            && self.peek_char().is_some_and(|c| c.is_ascii_digit())
        {
            kind = TokenKind::Float;
            text.push('.');
            self.advance();
            while !self.is_at_end() && self.current_char().is_ascii_digit() {
                text.push(self.current_char());
                self.advance();
            }
        }

        if !self.is_at_end() && classify(self.current_char()) == CharClass::Name {
            let (bad_row, bad_col) = (self.row, self.col);
            let name = self.read_name(bad_row, bad_col);
            return Err(Error::InvalidNumber {
                text: name.text,
                row: bad_row,
                col: bad_col,
            });
        }

        Ok(Token::new(kind, text, row, col))
    }

    fn read_name(&mut self, row: u32, col: u32) -> Token {
        let mut text = String::new();

        while !self.is_at_end() {
            match classify(self.current_char()) {
                CharClass::Name | CharClass::Digit => {
                    text.push(self.current_char());
                    self.advance();
                }
                _ => break,
            }
        }

        let kind = TokenKind::from_keyword(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, row, col)
    }
}

/// Tokenize a complete program
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_let_statement() {
        assert_eq!(
            kinds("let x = 123"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_define_row_type() {
        assert_eq!(
            kinds("define<{int:a key, int:b}> t"),
            vec![
                TokenKind::Define,
                TokenKind::OpenAngle,
                TokenKind::OpenBrace,
                TokenKind::Int,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Comma,
                TokenKind::Int,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::CloseBrace,
                TokenKind::CloseAngle,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_multi_char_operators() {
        assert_eq!(
            kinds("a == b != c <= d >= e && f || g += 1"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqEq,
                TokenKind::Identifier,
                TokenKind::NotEq,
                TokenKind::Identifier,
                TokenKind::LessEq,
                TokenKind::Identifier,
                TokenKind::GreaterEq,
                TokenKind::Identifier,
                TokenKind::AndAnd,
                TokenKind::Identifier,
                TokenKind::OrOr,
                TokenKind::Identifier,
                TokenKind::PlusAssign,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_invalid_operator_runs() {
        assert_eq!(
            kinds("x =- 1"),
            vec![
                TokenKind::Identifier,
                TokenKind::Invalid,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("!")[0], TokenKind::Invalid);
        assert_eq!(kinds("|")[0], TokenKind::Invalid);
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(kinds("EMIT Emit emit")[..3], [TokenKind::Emit; 3]);
    }

    #[test]
    fn test_names_may_contain_digits() {
        let tokens = tokenize("row2.x1").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, "row2");
        assert_eq!(tokens[1].kind, TokenKind::Dot);
        assert_eq!(tokens[2].text, "x1");
    }

    #[test]
    fn test_letter_inside_number() {
        let result = tokenize("let x = 12ab");
        match result {
            Err(Error::InvalidNumber { text, row, col }) => {
                assert_eq!(text, "ab");
                assert_eq!((row, col), (1, 11));
            }
            other => panic!("Expected InvalidNumber, got {:?}", other),
        }
    }

    #[test]
    fn test_string_literal() {
        let tokens = tokenize(r#"print_string("foo\n")"#).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].text, "foo\n");
    }

    #[test]
    fn test_unterminated_string() {
        let result = tokenize("let s = \"abc");
        assert!(matches!(
            result,
            Err(Error::UnterminatedString { row: 1, col: 9 })
        ));
    }

    #[test]
    fn test_float_literal() {
        let tokens = tokenize("1.5 p.x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].text, "1.5");
        assert_eq!(tokens[2].kind, TokenKind::Dot);
    }

    #[test]
    fn test_positions_and_comments() {
        let tokens = tokenize("let x = 1 // first\n  emit {x}").unwrap();
        let emit = tokens.iter().find(|t| t.kind == TokenKind::Emit).unwrap();
        assert_eq!((emit.row, emit.col), (2, 3));
        assert!(tokens.iter().all(|t| t.text != "first"));
    }
}
