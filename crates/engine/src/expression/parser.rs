//! Recursive-descent parser for expression bodies.
//!
//! Grammar (precedence low → high):
//! ```text
//! expression     := comparison
//! comparison     := additive (("=="|"!="|"<"|"<="|">"|">=") additive)?
//! additive       := multiplicative (("+"|"-") multiplicative)*
//! multiplicative := unary (("*"|"/"|"%") unary)*
//! unary          := "-" unary | postfix
//! postfix        := primary ("." ident | "[" expression "]")*
//! primary        := number | string | "true" | "false"
//!                 | "(" expression ")" | "$node" "[" string "]"
//! ```

use serde_json::Value;

use super::ast::{BinOp, Expr};
use super::lexer::{tokenize, Token};
use super::ExpressionError;

/// Parse an expression body into an AST.
pub fn parse(expression: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(expression).map_err(|message| ExpressionError::Syntax {
        expression: expression.to_owned(),
        message,
    })?;

    let mut parser = Parser {
        tokens,
        pos: 0,
        expression,
    };
    let expr = parser.comparison()?;

    if let Some(tok) = parser.peek() {
        return Err(parser.syntax_error(format!("unexpected trailing token {tok:?}")));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    expression: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExpressionError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.syntax_error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn syntax_error(&self, message: String) -> ExpressionError {
        ExpressionError::Syntax {
            expression: self.expression.to_owned(),
            message,
        }
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.additive()?;

        let op = match self.peek() {
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::NotEq) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;

        Ok(Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.multiplicative()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Minus) {
            let inner = self.unary()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;

        loop {
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some(Token::Ident(name)) => {
                        expr = Expr::Field {
                            base: Box::new(expr),
                            name,
                        };
                    }
                    other => {
                        return Err(
                            self.syntax_error(format!("expected field name after '.', found {other:?}"))
                        );
                    }
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.comparison()?;
                self.expect(Token::RBracket, "']'")?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Float(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),

            Some(Token::LParen) => {
                let inner = self.comparison()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }

            Some(Token::Node) => {
                self.expect(Token::LBracket, "'[' after $node")?;
                let name = match self.advance() {
                    Some(Token::Str(s)) => s,
                    other => {
                        return Err(self.syntax_error(format!(
                            "expected quoted node name inside $node[...], found {other:?}"
                        )));
                    }
                };
                self.expect(Token::RBracket, "']' after node name")?;
                Ok(Expr::NodeRef(name))
            }

            other => Err(self.syntax_error(format!("unexpected token {other:?}"))),
        }
    }
}
