// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for constraint expressions.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons (which
//! chain, so `A < B < C` means `A < B and B < C`), `+ -`, `* / %`, unary
//! sign, and the right-associative power operator.

use crate::ast::{BinaryOp, Builtin, Expr, Loc, UnaryOp};
use crate::common::{EquationError, ErrorCode};
use crate::token::{Lexer, Spanned, Token};


/// TokenKind discriminant for efficient peek comparisons without payload matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Eq,
    Neq,
    Not,
    Mod,
    Exp,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
    LParen,
    RParen,
    Comma,
    Ident,
    Num,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::Eq => TokenKind::Eq,
            Token::Neq => TokenKind::Neq,
            Token::Not => TokenKind::Not,
            Token::Mod => TokenKind::Mod,
            Token::Exp => TokenKind::Exp,
            Token::Lt => TokenKind::Lt,
            Token::Lte => TokenKind::Lte,
            Token::Gt => TokenKind::Gt,
            Token::Gte => TokenKind::Gte,
            Token::And => TokenKind::And,
            Token::Or => TokenKind::Or,
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Div => TokenKind::Div,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::Comma => TokenKind::Comma,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
        }
    }
}

/// Parser state holding tokenized input
struct Parser<'input> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
}

impl<'input> Parser<'input> {
    /// Create a new parser from a lexer, collecting all tokens up front.
    /// Returns an error if the lexer produces any errors.
    fn new(lexer: Lexer<'input>) -> Result<Self, EquationError> {
        let tokens = lexer.collect::<Result<Vec<_>, _>>()?;
        Ok(Parser { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<Spanned<Token<'input>>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(&tok))
    }

    fn peek_kind_at(&self, off: usize) -> Option<TokenKind> {
        self.tokens
            .get(self.pos + off)
            .map(|(_, tok, _)| TokenKind::from(tok))
    }

    /// Advance to the next token and return the consumed token
    fn advance(&mut self) -> Option<Spanned<Token<'input>>> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    /// An error for the current token, or for end of input.
    fn unexpected(&self) -> EquationError {
        match self.peek() {
            Some((start, _, end)) => EquationError {
                start,
                end,
                code: ErrorCode::UnrecognizedToken,
            },
            None => {
                let pos = self.eof_position();
                EquationError {
                    start: pos,
                    end: pos + 1,
                    code: ErrorCode::UnrecognizedEof,
                }
            }
        }
    }

    /// Expect the current token to match the expected kind, returning an error if not
    fn expect(&mut self, expected: TokenKind) -> Result<Spanned<Token<'input>>, EquationError> {
        if self.peek_kind() == Some(expected) {
            self.advance().ok_or_else(|| self.unexpected())
        } else {
            Err(self.unexpected())
        }
    }

    fn eof_position(&self) -> usize {
        if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        }
    }

    fn parse_constraint(&mut self) -> Result<Expr, EquationError> {
        if self.tokens.is_empty() {
            return Err(EquationError {
                start: 0,
                end: 0,
                code: ErrorCode::EmptyExpression,
            });
        }

        let expr = self.parse_expr()?;

        if let Some((start, _, end)) = self.peek() {
            return Err(EquationError {
                start,
                end,
                code: ErrorCode::ExtraToken,
            });
        }

        Ok(expr)
    }

    fn parse_expr(&mut self) -> Result<Expr, EquationError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_and()?;

        while self.peek_kind() == Some(TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(BinaryOp::Or, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_not()?;

        while self.peek_kind() == Some(TokenKind::And) {
            self.advance();
            let right = self.parse_not()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(BinaryOp::And, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, EquationError> {
        if self.peek_kind() == Some(TokenKind::Not) {
            let (lpos, _, _) = self.expect(TokenKind::Not)?;
            let operand = self.parse_not()?;
            let rpos = operand.get_loc().end;
            return Ok(Expr::Op1(
                UnaryOp::Not,
                Box::new(operand),
                Loc::new(lpos, rpos),
            ));
        }

        self.parse_comparison()
    }

    /// Parse a possibly chained comparison.  Each middle operand is
    /// shared by the comparisons on either side of it.
    fn parse_comparison(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_additive()?;
        let mut chain: Option<Expr> = None;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Lte) => BinaryOp::Lte,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Gte) => BinaryOp::Gte,
                Some(TokenKind::Eq) => BinaryOp::Eq,
                Some(TokenKind::Neq) => BinaryOp::Neq,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            let loc = left.get_loc().union(&right.get_loc());
            let cmp = Expr::Op2(op, Box::new(left), Box::new(right.clone()), loc);
            chain = Some(match chain {
                None => cmp,
                Some(prev) => {
                    let loc = prev.get_loc().union(&loc);
                    Expr::Op2(BinaryOp::And, Box::new(prev), Box::new(cmp), loc)
                }
            });
            left = right;
        }

        Ok(chain.unwrap_or(left))
    }

    fn parse_additive(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(op, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EquationError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Mul) => BinaryOp::Mul,
                Some(TokenKind::Div) => BinaryOp::Div,
                Some(TokenKind::Mod) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let loc = left.get_loc().union(&right.get_loc());
            left = Expr::Op2(op, Box::new(left), Box::new(right), loc);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EquationError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => UnaryOp::Positive,
            Some(TokenKind::Minus) => UnaryOp::Negative,
            _ => return self.parse_power(),
        };
        let (lpos, _, _) = self.advance().ok_or_else(|| self.unexpected())?;
        let operand = self.parse_unary()?;
        let rpos = operand.get_loc().end;
        Ok(Expr::Op1(op, Box::new(operand), Loc::new(lpos, rpos)))
    }

    /// `-A ** 2` is `-(A ** 2)` and `2 ** -1` is allowed, so the exponent
    /// is parsed as a unary expression.
    fn parse_power(&mut self) -> Result<Expr, EquationError> {
        let base = self.parse_atom()?;

        if self.peek_kind() == Some(TokenKind::Exp) {
            self.advance();
            let exponent = self.parse_unary()?;
            let loc = base.get_loc().union(&exponent.get_loc());
            return Ok(Expr::Op2(
                BinaryOp::Exp,
                Box::new(base),
                Box::new(exponent),
                loc,
            ));
        }

        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, EquationError> {
        match self.peek() {
            Some((lpos, Token::Num(s), rpos)) => {
                self.advance();
                match s.parse::<f64>() {
                    Ok(n) => Ok(Expr::Const(s.to_owned(), n, Loc::new(lpos, rpos))),
                    Err(_) => Err(EquationError {
                        start: lpos,
                        end: rpos,
                        code: ErrorCode::BadNumber,
                    }),
                }
            }
            Some((lpos, Token::Ident(s), rpos)) => {
                if s.starts_with(|c: char| c.is_uppercase()) {
                    self.advance();
                    Ok(Expr::Var(s.to_owned(), Loc::new(lpos, rpos)))
                } else {
                    self.parse_app(lpos, s, rpos)
                }
            }
            Some((_, Token::LParen, _)) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parse a call of a builtin function: `name(args)`.  Lowercase
    /// identifiers are only meaningful as function names.
    fn parse_app(&mut self, lpos: usize, name: &str, end: usize) -> Result<Expr, EquationError> {
        let builtin = match Builtin::from_name(name) {
            Some(builtin) if self.peek_kind_at(1) == Some(TokenKind::LParen) => builtin,
            _ => {
                return Err(EquationError {
                    start: lpos,
                    end,
                    code: ErrorCode::UnknownBuiltin,
                });
            }
        };
        self.advance(); // consume the name
        self.advance(); // consume '('

        let args = self.parse_comma_separated_exprs()?;
        let (_, _, rpos) = self.expect(TokenKind::RParen)?;

        if !builtin.accepts(args.len()) {
            return Err(EquationError {
                start: lpos,
                end: rpos,
                code: ErrorCode::BadBuiltinArgs,
            });
        }

        Ok(Expr::App(builtin, args, Loc::new(lpos, rpos)))
    }

    /// Parse comma-separated expressions (for function arguments)
    fn parse_comma_separated_exprs(&mut self) -> Result<Vec<Expr>, EquationError> {
        let mut exprs = Vec::new();

        if self.peek_kind() == Some(TokenKind::RParen) {
            return Ok(exprs);
        }

        exprs.push(self.parse_expr()?);

        while self.peek_kind() == Some(TokenKind::Comma) {
            self.advance(); // consume ','
            exprs.push(self.parse_expr()?);
        }

        Ok(exprs)
    }
}

/// Parse a constraint expression into an AST.  The top level must be a
/// comparison or a logical combination of comparisons.
pub fn parse(input: &str) -> Result<Expr, EquationError> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer)?;
    let expr = parser.parse_constraint()?;

    if !expr.is_boolean() {
        let loc = expr.get_loc();
        return Err(EquationError {
            start: loc.start,
            end: loc.end,
            code: ErrorCode::NotBoolean,
        });
    }

    Ok(expr)
}
