//! Parser
//!
//! Recursive descent over the token stream with one token of lookahead. A
//! program is an implicit block of statements.
//!
//! Binary operators are not precedence-climbed: each one takes the whole
//! remainder of the expression as its right-hand side, so `1 - 2 - 3`
//! parses as `1 - (2 - 3)`. Parentheses restore any other grouping.

use tracing::debug;

use super::ast::*;
use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use crate::backend::Isolation;
use crate::catalog::AttrProperties;
use crate::error::{Error, Result};

/// Program parser
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    next_id: NodeId,
}

impl Parser {
    /// Create a new parser from program text
    pub fn new(source: &str) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        debug!(tokens = tokens.len(), "lexing finished");
        Ok(Self::from_tokens(tokens))
    }

    /// Create a parser over an existing token stream
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (row, col) = tokens.last().map_or((1, 1), |t| (t.row, t.col));
            tokens.push(Token::eof(row, col));
        }
        Self {
            tokens,
            position: 0,
            next_id: 0,
        }
    }

    /// Parse the whole program as one block
    pub fn parse(&mut self) -> Result<Block> {
        let mut statements = Vec::new();

        loop {
            self.skip_semicolons();
            if self.is_at_end() {
                break;
            }
            statements.push(self.parse_statement()?);
        }

        debug!(statements = statements.len(), "parsing finished");
        Ok(Block::new(statements))
    }

    /// Parse a single statement
    pub fn parse_statement(&mut self) -> Result<Stmt> {
        let pos = self.pos();
        let kind = match self.current().kind {
            TokenKind::OpenBrace => StmtKind::Block(self.parse_block()?),
            TokenKind::Transaction => self.parse_transaction()?,
            TokenKind::Let => self.parse_let()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Define => self.parse_define()?,
            TokenKind::Tuple => self.parse_define_tuple()?,
            TokenKind::Emit => {
                self.advance();
                StmtKind::Emit(self.parse_expr()?)
            }
            TokenKind::Insert => {
                self.advance();
                let table = self.expect_identifier()?;
                StmtKind::Insert {
                    table,
                    value: self.parse_expr()?,
                }
            }
            TokenKind::Scan => self.parse_scan()?,
            TokenKind::Break => {
                self.advance();
                StmtKind::Jump(JumpKind::Break)
            }
            TokenKind::Continue => {
                self.advance();
                StmtKind::Jump(JumpKind::Continue)
            }
            TokenKind::OpenBracket
            | TokenKind::OpenParen
            | TokenKind::Ampersand
            | TokenKind::Number
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Identifier => StmtKind::Expr(self.parse_expr()?),
            _ => return Err(self.unexpected("statement")),
        };

        Ok(Stmt::new(self.fresh_id(), pos, kind))
    }

    // ========== Statements ==========

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(TokenKind::OpenBrace)?;
        let mut statements = Vec::new();

        loop {
            self.skip_semicolons();
            match self.current().kind {
                TokenKind::CloseBrace => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => return Err(self.unexpected("'}'")),
                _ => statements.push(self.parse_statement()?),
            }
        }

        Ok(Block::new(statements))
    }

    fn parse_transaction(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::Transaction)?;

        let isolation = match self.current().kind {
            TokenKind::OpenBrace => Isolation::default(),
            TokenKind::Serializable | TokenKind::Identifier => {
                let name = self.current().text.clone();
                self.advance();
                Isolation::from_name(&name).ok_or(Error::UnknownIsolation(name))?
            }
            _ => return Err(self.unexpected("isolation level or '{'")),
        };

        Ok(StmtKind::Transaction {
            isolation,
            body: self.parse_block()?,
        })
    }

    fn parse_let(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::Let)?;

        let declared = if self.check(TokenKind::OpenAngle) {
            Some(self.parse_row_type()?)
        } else {
            None
        };
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Assign)?;

        Ok(StmtKind::Let {
            name,
            value: self.parse_expr()?,
            declared,
        })
    }

    fn parse_if(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;

        let else_block = if self.check(TokenKind::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(StmtKind::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_for(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::For)?;

        let init = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_statement()?))
        };
        self.expect(TokenKind::Semicolon)?;

        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let step = if self.check(TokenKind::OpenBrace) {
            None
        } else {
            Some(self.parse_expr()?)
        };

        Ok(StmtKind::For {
            init,
            cond,
            step,
            body: self.parse_block()?,
        })
    }

    fn parse_define(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::Define)?;
        let ty = self.parse_row_type()?;
        let name = self.expect_identifier()?;
        Ok(StmtKind::Define { ty, name })
    }

    fn parse_define_tuple(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::Tuple)?;
        let name = self.expect_identifier()?;
        let ty = self.parse_tuple_type()?;
        Ok(StmtKind::DefineTuple { name, ty })
    }

    fn parse_scan(&mut self) -> Result<StmtKind> {
        self.expect(TokenKind::Scan)?;
        let table = self.expect_identifier()?;
        self.expect(TokenKind::Comma)?;
        let binding = self.expect_identifier()?;

        Ok(StmtKind::Scan {
            table,
            binding,
            body: self.parse_block()?,
        })
    }

    // ========== Types ==========

    /// `< type >`
    fn parse_row_type(&mut self) -> Result<TypeExpr> {
        self.expect(TokenKind::OpenAngle)?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::CloseAngle)?;
        Ok(ty)
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        match self.current().kind {
            TokenKind::OpenBracket => {
                self.advance();
                let elem = self.parse_type()?;
                self.expect(TokenKind::CloseBracket)?;
                Ok(TypeExpr::Array(Box::new(elem)))
            }
            TokenKind::OpenBrace => self.parse_tuple_type(),
            TokenKind::Int | TokenKind::Identifier => {
                let name = self.current().text.clone();
                self.advance();
                Ok(TypeExpr::Named(name))
            }
            _ => Err(self.unexpected("type")),
        }
    }

    /// `{ typename[(N)] : name props*, ... }`
    fn parse_tuple_type(&mut self) -> Result<TypeExpr> {
        self.expect(TokenKind::OpenBrace)?;
        let mut fields = Vec::new();

        if self.check(TokenKind::CloseBrace) {
            self.advance();
            return Ok(TypeExpr::Tuple(fields));
        }

        loop {
            let type_name = match self.current().kind {
                TokenKind::Int | TokenKind::Identifier => {
                    let name = self.current().text.clone();
                    self.advance();
                    name
                }
                _ => return Err(self.unexpected("member type")),
            };

            let size = if self.check(TokenKind::OpenParen) {
                self.advance();
                let n = self.expect_integer()?;
                self.expect(TokenKind::CloseParen)?;
                Some(usize::try_from(n).map_err(|_| Error::InvalidLiteral {
                    text: n.to_string(),
                    row: self.current().row,
                    col: self.current().col,
                })?)
            } else {
                None
            };

            self.expect(TokenKind::Colon)?;
            let name = self.expect_identifier()?;

            let mut props = AttrProperties::empty();
            while self.check(TokenKind::Identifier) {
                let prop = self.current().text.clone();
                props |= AttrProperties::from_property(&prop)
                    .ok_or(Error::UnknownProperty(prop))?;
                self.advance();
            }

            fields.push(FieldDecl {
                type_name,
                size,
                name,
                props,
            });

            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                self.expect(TokenKind::CloseBrace)?;
                break;
            }
        }

        Ok(TypeExpr::Tuple(fields))
    }

    // ========== Expression Parsing ==========

    /// Parse a prefix form followed by any number of postfix extensions
    pub fn parse_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_prefix()?;

        loop {
            let pos = self.pos();
            match self.current().kind {
                TokenKind::OpenParen => {
                    let args = self.parse_list(TokenKind::OpenParen, TokenKind::CloseParen)?;
                    expr = Expr::new(
                        ExprKind::FunctionCall {
                            callee: Box::new(expr),
                            args,
                        },
                        pos,
                    );
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::CloseBracket)?;
                    expr = Expr::new(
                        ExprKind::ArrayReference {
                            parent: Box::new(expr),
                            index: Box::new(index),
                        },
                        pos,
                    );
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    expr = Expr::new(
                        ExprKind::MemberReference {
                            parent: Box::new(expr),
                            name,
                            index: None,
                        },
                        pos,
                    );
                }
                TokenKind::Assign => {
                    self.advance();
                    let value = self.parse_expr()?;
                    return Ok(Expr::assign(expr, value, pos));
                }
                kind => {
                    if let Some(op) = compound_operator(kind) {
                        self.advance();
                        let rhs = self.parse_expr()?;
                        let value = Expr::binary(op, expr.clone(), rhs, pos);
                        return Ok(Expr::assign(expr, value, pos));
                    }
                    if let Some(op) = binary_operator(kind) {
                        self.advance();
                        let rhs = self.parse_expr()?;
                        return Ok(Expr::binary(op, expr, rhs, pos));
                    }
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let pos = self.pos();
        let token = self.current().clone();

        match token.kind {
            TokenKind::Ampersand => {
                self.advance();
                let target = self.parse_expr()?;
                Ok(Expr::new(ExprKind::PointerOf(Box::new(target)), pos))
            }
            TokenKind::OpenBrace => {
                let elements = self.parse_list(TokenKind::OpenBrace, TokenKind::CloseBrace)?;
                Ok(Expr::new(ExprKind::RowLiteral(elements), pos))
            }
            TokenKind::OpenBracket => {
                let elements = self.parse_list(TokenKind::OpenBracket, TokenKind::CloseBracket)?;
                Ok(Expr::new(ExprKind::ArrayLiteral(elements), pos))
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(Expr::new(
                    ExprKind::Primary(Primary::Nested(Box::new(inner))),
                    pos,
                ))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::variable(token.text, pos))
            }
            TokenKind::Number => {
                self.advance();
                let n = token.text.parse::<i64>().map_err(|_| invalid_literal(&token))?;
                Ok(Expr::literal(Literal::Integer(n), pos))
            }
            TokenKind::Float => {
                self.advance();
                let n = token.text.parse::<f64>().map_err(|_| invalid_literal(&token))?;
                Ok(Expr::literal(Literal::Double(n), pos))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::literal(Literal::String(token.text), pos))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// `open expr, expr, ... close`, possibly empty
    fn parse_list(&mut self, open: TokenKind, close: TokenKind) -> Result<Vec<Expr>> {
        self.expect(open)?;
        let mut items = Vec::new();

        if self.check(close) {
            self.advance();
            return Ok(items);
        }

        loop {
            items.push(self.parse_expr()?);
            if self.check(TokenKind::Comma) {
                self.advance();
            } else {
                self.expect(close)?;
                break;
            }
        }

        Ok(items)
    }

    // ========== Helper functions ==========

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn pos(&self) -> Position {
        let token = self.current();
        Position {
            row: token.row,
            col: token.col,
        }
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn skip_semicolons(&mut self) {
        while self.check(TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        let token = self.current();
        if token.kind == TokenKind::Eof {
            return Error::UnexpectedEof(expected.to_string());
        }
        Error::UnexpectedToken {
            expected: expected.to_string(),
            found: token.to_string(),
            row: token.row,
            col: token.col,
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        if self.check(TokenKind::Identifier) {
            let name = self.current().text.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn expect_integer(&mut self) -> Result<i64> {
        if self.check(TokenKind::Number) {
            let token = self.current().clone();
            self.advance();
            token.text.parse::<i64>().map_err(|_| invalid_literal(&token))
        } else {
            Err(self.unexpected("integer"))
        }
    }
}

fn invalid_literal(token: &Token) -> Error {
    Error::InvalidLiteral {
        text: token.text.clone(),
        row: token.row,
        col: token.col,
    }
}

fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
    match kind {
        TokenKind::Plus => Some(BinaryOperator::Add),
        TokenKind::Minus => Some(BinaryOperator::Sub),
        TokenKind::Star => Some(BinaryOperator::Mul),
        TokenKind::Slash => Some(BinaryOperator::Div),
        TokenKind::Percent => Some(BinaryOperator::Mod),
        TokenKind::OpenAngle => Some(BinaryOperator::Lt),
        TokenKind::CloseAngle => Some(BinaryOperator::Gt),
        TokenKind::EqEq => Some(BinaryOperator::Eq),
        TokenKind::NotEq => Some(BinaryOperator::NotEq),
        TokenKind::LessEq => Some(BinaryOperator::LtEq),
        TokenKind::GreaterEq => Some(BinaryOperator::GtEq),
        TokenKind::AndAnd => Some(BinaryOperator::And),
        TokenKind::OrOr => Some(BinaryOperator::Or),
        _ => None,
    }
}

fn compound_operator(kind: TokenKind) -> Option<BinaryOperator> {
    match kind {
        TokenKind::PlusAssign => Some(BinaryOperator::Add),
        TokenKind::MinusAssign => Some(BinaryOperator::Sub),
        TokenKind::StarAssign => Some(BinaryOperator::Mul),
        TokenKind::SlashAssign => Some(BinaryOperator::Div),
        TokenKind::PercentAssign => Some(BinaryOperator::Mod),
        _ => None,
    }
}

/// Parse program text into its top-level block
pub fn parse_program(source: &str) -> Result<Block> {
    Parser::new(source)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> StmtKind {
        let block = parse_program(source).unwrap();
        assert_eq!(block.len(), 1, "expected one statement in {:?}", source);
        block.statements.into_iter().next().unwrap().kind
    }

    fn single_expr(source: &str) -> Expr {
        match single(source) {
            StmtKind::Expr(e) => e,
            other => panic!("Expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_program() {
        assert!(parse_program("").unwrap().is_empty());
        assert!(parse_program("  \n\t").unwrap().is_empty());
    }

    #[test]
    fn test_empty_block() {
        match single("{}") {
            StmtKind::Block(b) => assert!(b.is_empty()),
            other => panic!("Expected Block, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_let() {
        match single("let x = 123") {
            StmtKind::Let {
                name,
                value,
                declared,
            } => {
                assert_eq!(name, "x");
                assert_eq!(value.kind, ExprKind::Primary(Primary::Literal(Literal::Integer(123))));
                assert!(declared.is_none());
            }
            other => panic!("Expected Let, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_let_with_declared_type() {
        match single("let <{int:x key, int:y}> p = {1, 4}") {
            StmtKind::Let {
                declared: Some(TypeExpr::Tuple(fields)),
                value,
                ..
            } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].name, "x");
                assert_eq!(fields[0].props, AttrProperties::KEY);
                assert!(matches!(value.kind, ExprKind::RowLiteral(ref items) if items.len() == 2));
            }
            other => panic!("Expected typed Let, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_call() {
        let expr = single_expr("print_int(3)");
        match expr.kind {
            ExprKind::FunctionCall { callee, args } => {
                assert_eq!(
                    callee.kind,
                    ExprKind::VariableReference {
                        name: "print_int".into(),
                        binding: None
                    }
                );
                assert_eq!(args.len(), 1);
            }
            other => panic!("Expected FunctionCall, got {:?}", other),
        }
    }

    #[test]
    fn test_binary_is_right_associative() {
        // Flat precedence: the right-hand side swallows the rest
        let expr = single_expr("1 - 2 - 3");
        assert_eq!(expr.to_string(), "1 - 2 - 3");
        match expr.kind {
            ExprKind::Binary { op, lhs, rhs } => {
                assert_eq!(op, BinaryOperator::Sub);
                assert_eq!(lhs.to_string(), "1");
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOperator::Sub, .. }));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }

        // `2 * 3 + 4` groups as `2 * (3 + 4)`
        match single_expr("2 * 3 + 4").kind {
            ExprKind::Binary { op, rhs, .. } => {
                assert_eq!(op, BinaryOperator::Mul);
                assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOperator::Add, .. }));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_parentheses_group() {
        match single_expr("(1 - 2) - 3").kind {
            ExprKind::Binary { lhs, .. } => {
                assert!(matches!(lhs.kind, ExprKind::Primary(Primary::Nested(_))));
            }
            other => panic!("Expected Binary, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_transaction() {
        match single("transaction {}") {
            StmtKind::Transaction { isolation, body } => {
                assert_eq!(isolation, Isolation::Serializable);
                assert!(body.is_empty());
            }
            other => panic!("Expected Transaction, got {:?}", other),
        }
        match single("transaction snapshot { emit {1} }") {
            StmtKind::Transaction { isolation, body } => {
                assert_eq!(isolation, Isolation::Snapshot);
                assert_eq!(body.len(), 1);
            }
            other => panic!("Expected Transaction, got {:?}", other),
        }
        assert!(matches!(
            parse_program("transaction chaos {}"),
            Err(Error::UnknownIsolation(name)) if name == "chaos"
        ));
    }

    #[test]
    fn test_parse_if_else() {
        match single("if 1 { print_int(1) } else { print_int(2) }") {
            StmtKind::If {
                then_block,
                else_block,
                ..
            } => {
                assert_eq!(then_block.len(), 1);
                assert_eq!(else_block.map(|b| b.len()), Some(1));
            }
            other => panic!("Expected If, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested_for() {
        let source = "for let i = 0; i < 3; i = i + 1 { for let j = 0; j < 3; j = j + 1 { emit {i, j} } }";
        match single(source) {
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                assert!(matches!(init.map(|s| s.kind), Some(StmtKind::Let { .. })));
                assert!(cond.is_some());
                assert!(matches!(step.map(|e| e.kind), Some(ExprKind::Assign { .. })));
                assert!(matches!(body.statements[0].kind, StmtKind::For { .. }));
            }
            other => panic!("Expected For, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_for_clauses() {
        match single("for ;; { break }") {
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                assert!(init.is_none() && cond.is_none() && step.is_none());
                assert_eq!(body.statements[0].kind, StmtKind::Jump(JumpKind::Break));
            }
            other => panic!("Expected For, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_define_tuple() {
        match single("tuple human { int:name, int:score }") {
            StmtKind::DefineTuple {
                name,
                ty: TypeExpr::Tuple(fields),
            } => {
                assert_eq!(name, "human");
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[1].name, "score");
            }
            other => panic!("Expected DefineTuple, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_define() {
        match single("define <{int:a key, string(8):s nullable unique}> foo") {
            StmtKind::Define {
                ty: TypeExpr::Tuple(fields),
                name,
            } => {
                assert_eq!(name, "foo");
                assert_eq!(fields[1].type_name, "string");
                assert_eq!(fields[1].size, Some(8));
                assert_eq!(
                    fields[1].props,
                    AttrProperties::NULLABLE | AttrProperties::UNIQUE
                );
            }
            other => panic!("Expected Define, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_property() {
        let result = parse_program("define <{int:a primary}> foo");
        assert!(matches!(result, Err(Error::UnknownProperty(p)) if p == "primary"));
    }

    #[test]
    fn test_parse_insert_and_scan() {
        let block = parse_program("insert t {1, 2}\nscan t, row { emit row }").unwrap();
        assert_eq!(block.len(), 2);
        match &block.statements[0].kind {
            StmtKind::Insert { table, value } => {
                assert_eq!(table, "t");
                assert!(matches!(value.kind, ExprKind::RowLiteral(_)));
            }
            other => panic!("Expected Insert, got {:?}", other),
        }
        match &block.statements[1].kind {
            StmtKind::Scan {
                table,
                binding,
                body,
            } => {
                assert_eq!((table.as_str(), binding.as_str()), ("t", "row"));
                assert!(matches!(body.statements[0].kind, StmtKind::Emit(_)));
            }
            other => panic!("Expected Scan, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_postfix_chain() {
        let expr = single_expr("xs[2].name");
        match expr.kind {
            ExprKind::MemberReference { parent, name, .. } => {
                assert_eq!(name, "name");
                assert!(matches!(parent.kind, ExprKind::ArrayReference { .. }));
            }
            other => panic!("Expected MemberReference, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_assignment() {
        let expr = single_expr("x += 2");
        assert_eq!(expr.to_string(), "x = x + 2");
    }

    #[test]
    fn test_statement_ids_are_unique() {
        let block = parse_program("let x = 1 { emit {x} } emit {2}").unwrap();
        let mut ids = vec![block.statements[0].id, block.statements[2].id];
        if let StmtKind::Block(inner) = &block.statements[1].kind {
            ids.push(inner.statements[0].id);
        }
        ids.push(block.statements[1].id);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_syntax_error_position() {
        match parse_program("let x = 1\nlet = 2") {
            Err(Error::UnexpectedToken {
                expected,
                found,
                row,
                col,
            }) => {
                assert_eq!(expected, "identifier");
                assert_eq!(found, "=");
                assert_eq!((row, col), (2, 5));
            }
            other => panic!("Expected UnexpectedToken, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_operator_is_syntax_error() {
        let result = parse_program("let x =- 1");
        assert!(matches!(result, Err(Error::UnexpectedToken { found, .. }) if found == "=-"));
    }

    #[test]
    fn test_unclosed_block() {
        assert!(matches!(
            parse_program("if 1 { emit {1}"),
            Err(Error::UnexpectedEof(_))
        ));
    }
}
