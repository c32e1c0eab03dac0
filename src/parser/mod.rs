//! A small recursive-descent parser producing the [`crate::ast`] tree this
//! crate's analyzer and lowerer operate on. Collaborator per `spec.md` §1:
//! kept intentionally minimal, just enough surface syntax to drive the core
//! pipeline end to end in tests.
//!
//! Statements are one per line, like the real GTA3script surface syntax;
//! `Newline` tokens are kept (not skipped by the lexer) and act as the
//! statement terminator.

pub mod lexer;

use crate::ast::{BinaryOp, CaseArm, Expr, Script, Span, Statement, UnaryOp};
use lexer::Token;
use logos::Logos;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

struct Parser {
    tokens: Vec<(Token, u32)>,
    pos: usize,
}

pub fn parse_script(name: &str, source: &str) -> Result<Script, ParseError> {
    let mut tokens = Vec::new();
    let mut line = 1u32;
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        match result {
            Ok(Token::Newline) => {
                tokens.push((Token::Newline, line));
                line += 1;
            }
            Ok(tok) => tokens.push((tok, line)),
            Err(()) => {
                return Err(ParseError {
                    message: format!("unexpected character near {:?}", lexer.slice()),
                    line,
                });
            }
        }
    }

    let mut parser = Parser { tokens, pos: 0 };
    let statements = parser.parse_statements(&[])?;
    Ok(Script {
        name: name.to_string(),
        statements,
    })
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> u32 {
        self.tokens.get(self.pos).map(|(_, l)| *l).unwrap_or(0)
    }

    fn span(&self) -> Span {
        Span::new(self.line(), 1)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line(),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.pos += 1;
        }
    }

    /// Consumes the newline (or EOF) that must follow a statement.
    fn end_statement(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            Some(Token::Newline) => {
                self.pos += 1;
                Ok(())
            }
            None => Ok(()),
            other => Err(self.error(format!("expected end of line, found {other:?}"))),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token::Identifier(name)) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parses statements, skipping blank lines, until `stop` is seen at the
    /// start of a line (exclusive) or input ends.
    fn parse_statements(&mut self, stop: &[Token]) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                None => break,
                Some(tok) if stop.contains(tok) => break,
                _ => statements.push(self.parse_statement()?),
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let span = self.span();
        let statement = match self.peek().cloned() {
            Some(Token::LabelDecl(name)) => {
                self.advance();
                Statement::Label { span, name }
            }
            Some(Token::LeftCurly) => {
                self.advance();
                self.skip_newlines();
                let body = self.parse_statements(&[Token::RightCurly])?;
                self.expect(&Token::RightCurly)?;
                return {
                    self.end_statement()?;
                    Ok(Statement::Scope { span, body })
                };
            }
            Some(Token::ScriptName) => {
                self.advance();
                let name = self.expect_string_like()?;
                Statement::ScriptName { span, name }
            }
            Some(Token::If) => return self.parse_if(span),
            Some(Token::While) => return self.parse_while(span),
            Some(Token::Repeat) => return self.parse_repeat(span),
            Some(Token::Switch) => return self.parse_switch(span),
            Some(Token::Break) => {
                self.advance();
                Statement::Break(span)
            }
            Some(Token::Continue) => {
                self.advance();
                Statement::Continue(span)
            }
            Some(Token::Identifier(name)) => {
                self.advance();
                if self.eat(&Token::Assign) {
                    let value = self.parse_expr()?;
                    Statement::Assign { span, target: name, value }
                } else {
                    let args = self.parse_call_args()?;
                    Statement::Command { span, name, args }
                }
            }
            other => return Err(self.error(format!("unexpected token {other:?}"))),
        };
        self.end_statement()?;
        Ok(statement)
    }

    fn expect(&mut self, token: &Token) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {token:?}, found {:?}", self.peek())))
        }
    }

    fn expect_string_like(&mut self) -> Result<String, ParseError> {
        match self.advance() {
            Some(Token::StringLiteral(s)) => Ok(s),
            Some(Token::Identifier(s)) => Ok(s),
            other => Err(self.error(format!("expected a name, found {other:?}"))),
        }
    }

    /// Comma-separated expressions up to the end of the current line.
    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek(), None | Some(Token::Newline)) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_if(&mut self, span: Span) -> Result<Statement, ParseError> {
        self.expect(&Token::If)?;
        let condition = self.parse_expr()?;
        self.end_statement()?;
        let then_body = self.parse_statements(&[Token::Else, Token::EndIf])?;
        let else_body = if self.eat(&Token::Else) {
            self.end_statement()?;
            self.parse_statements(&[Token::EndIf])?
        } else {
            Vec::new()
        };
        self.expect(&Token::EndIf)?;
        self.end_statement()?;
        Ok(Statement::If {
            span,
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self, span: Span) -> Result<Statement, ParseError> {
        self.expect(&Token::While)?;
        let condition = self.parse_expr()?;
        self.end_statement()?;
        let body = self.parse_statements(&[Token::EndWhile])?;
        self.expect(&Token::EndWhile)?;
        self.end_statement()?;
        Ok(Statement::While { span, condition, body })
    }

    fn parse_repeat(&mut self, span: Span) -> Result<Statement, ParseError> {
        self.expect(&Token::Repeat)?;
        let count = self.parse_expr()?;
        self.expect(&Token::Comma)?;
        let counter = self.expect_identifier()?;
        self.end_statement()?;
        let body = self.parse_statements(&[Token::EndRepeat])?;
        self.expect(&Token::EndRepeat)?;
        self.end_statement()?;
        Ok(Statement::Repeat {
            span,
            count,
            counter,
            body,
        })
    }

    fn parse_switch(&mut self, span: Span) -> Result<Statement, ParseError> {
        self.expect(&Token::Switch)?;
        let discriminant = self.expect_identifier()?;
        self.end_statement()?;
        let mut cases = Vec::new();
        let mut default = None;
        loop {
            self.skip_newlines();
            match self.peek() {
                Some(Token::Case) => {
                    self.advance();
                    let value = self.parse_int_literal()?;
                    self.end_statement()?;
                    let body = self.parse_statements(&[Token::Case, Token::Default, Token::EndSwitch])?;
                    cases.push(CaseArm { value, body });
                }
                Some(Token::Default) => {
                    self.advance();
                    self.end_statement()?;
                    let body = self.parse_statements(&[Token::Case, Token::Default, Token::EndSwitch])?;
                    default = Some(body);
                }
                _ => break,
            }
        }
        self.expect(&Token::EndSwitch)?;
        self.end_statement()?;
        Ok(Statement::Switch {
            span,
            discriminant,
            cases,
            default,
        })
    }

    fn parse_int_literal(&mut self) -> Result<i64, ParseError> {
        match self.advance() {
            Some(Token::IntLiteral(v)) => Ok(v),
            other => Err(self.error(format!("expected an integer literal, found {other:?}"))),
        }
    }

    // Precedence climbing: || -> && -> equality -> relational -> additive -> multiplicative -> unary -> primary.
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary { op: BinaryOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary { op: BinaryOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => BinaryOp::Lt,
                Some(Token::LessEq) => BinaryOp::Le,
                Some(Token::Greater) => BinaryOp::Gt,
                Some(Token::GreaterEq) => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand) });
        }
        if self.eat(&Token::Not) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.advance() {
            Some(Token::IntLiteral(v)) => Ok(Expr::IntLiteral(v)),
            Some(Token::FloatLiteral(v)) => Ok(Expr::FloatLiteral(v)),
            Some(Token::StringLiteral(s)) => Ok(Expr::StringLiteral(s)),
            Some(Token::LeftParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RightParen)?;
                Ok(inner)
            }
            Some(Token::Identifier(name)) => {
                if self.peek() == Some(&Token::LeftParen) {
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RightParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(&Token::RightParen)?;
                    Ok(Expr::Call { name, args })
                } else {
                    Ok(Expr::Identifier(name))
                }
            }
            other => Err(self.error(format!("expected an expression, found {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_name_and_command() {
        let script = parse_script("main.sc", "SCRIPT_NAME main\nWAIT 0\n").unwrap();
        assert_eq!(script.statements.len(), 2);
        assert!(matches!(script.statements[0], Statement::ScriptName { .. }));
    }

    #[test]
    fn parses_if_else() {
        let script = parse_script("main.sc", "IF 1 == 1\nWAIT 0\nELSE\nWAIT 1\nENDIF\n").unwrap();
        assert_eq!(script.statements.len(), 1);
        match &script.statements[0] {
            Statement::If { then_body, else_body, .. } => {
                assert_eq!(then_body.len(), 1);
                assert_eq!(else_body.len(), 1);
            }
            other => panic!("expected if statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_switch_with_cases_and_default() {
        let script = parse_script(
            "main.sc",
            "SWITCH x\nCASE 1\nWAIT 0\nBREAK\nCASE 2\nWAIT 1\nBREAK\nDEFAULT\nWAIT 2\nBREAK\nENDSWITCH\n",
        )
        .unwrap();
        match &script.statements[0] {
            Statement::Switch { cases, default, .. } => {
                assert_eq!(cases.len(), 2);
                assert!(default.is_some());
            }
            other => panic!("expected switch statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_while_and_break() {
        let script = parse_script("main.sc", "WHILE 1 == 1\nBREAK\nENDWHILE\n").unwrap();
        match &script.statements[0] {
            Statement::While { body, .. } => assert!(matches!(body[0], Statement::Break(_))),
            other => panic!("expected while statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_scoped_block_and_label() {
        let script = parse_script("main.sc", "top:\n{\nWAIT 0\n}\n").unwrap();
        assert!(matches!(script.statements[0], Statement::Label { .. }));
        assert!(matches!(script.statements[1], Statement::Scope { .. }));
    }
}
