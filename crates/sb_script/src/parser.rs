//! Recursive-descent parser producing the [`ast`](crate::ast) tree.

use std::sync::Arc;

use crate::ast::{BinaryOp, Expr, FuncDef, Stmt, UnaryOp};
use crate::error::ScriptError;
use crate::lexer::{Token, TokenKind};

pub struct Parser<'a> {
    chunk_name: &'a str,
    tokens: Vec<Token>,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(chunk_name: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            chunk_name,
            tokens,
            i: 0,
        }
    }

    /// Parse a whole chunk (a statement list terminated by EOF).
    pub fn parse_chunk(mut self) -> Result<Vec<Stmt>, ScriptError> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            body.push(self.statement()?);
        }
        Ok(body)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.i]
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.i + offset).map(|t| &t.kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.i].clone();
        if self.i + 1 < self.tokens.len() {
            self.i += 1;
        }
        t
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ScriptError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.err_here(&format!("expected {what}")))
        }
    }

    fn err_here(&self, msg: &str) -> ScriptError {
        ScriptError::compile(self.chunk_name, self.peek().line, msg)
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        match &self.peek().kind {
            TokenKind::Fn => self.fn_decl(),
            TokenKind::Let => self.let_stmt(),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Return => {
                let line = self.advance().line;
                let value = if self.check(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(&TokenKind::Semi, "';' after return")?;
                Ok(Stmt::Return { value, line })
            }
            TokenKind::Break => {
                let line = self.advance().line;
                self.expect(&TokenKind::Semi, "';' after break")?;
                Ok(Stmt::Break { line })
            }
            TokenKind::Continue => {
                let line = self.advance().line;
                self.expect(&TokenKind::Semi, "';' after continue")?;
                Ok(Stmt::Continue { line })
            }
            TokenKind::Ident(_) if self.peek_kind(1) == Some(&TokenKind::Assign) => {
                let name = self.ident()?;
                self.advance(); // '='
                let value = self.expression()?;
                self.expect(&TokenKind::Semi, "';' after assignment")?;
                Ok(Stmt::Assign { name, value })
            }
            _ => {
                let expr = self.expression()?;
                self.expect(&TokenKind::Semi, "';' after expression")?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn ident(&mut self) -> Result<String, ScriptError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.err_here("expected identifier")),
        }
    }

    fn fn_decl(&mut self) -> Result<Stmt, ScriptError> {
        self.advance(); // 'fn'
        let name = self.ident()?;
        self.expect(&TokenKind::LParen, "'(' after function name")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.ident()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')' after parameters")?;
        let body = self.block()?;
        Ok(Stmt::FnDecl(Arc::new(FuncDef { name, params, body })))
    }

    fn let_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.advance(); // 'let'
        let name = self.ident()?;
        self.expect(&TokenKind::Assign, "'=' in let binding")?;
        let value = self.expression()?;
        self.expect(&TokenKind::Semi, "';' after let binding")?;
        Ok(Stmt::Let { name, value })
    }

    fn if_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.advance(); // 'if'
        let cond = self.expression()?;
        let then_body = self.block()?;
        let else_body = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                vec![self.if_stmt()?]
            } else {
                self.block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ScriptError> {
        self.advance(); // 'while'
        let cond = self.expression()?;
        let body = self.block()?;
        Ok(Stmt::While { cond, body })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.err_here("unterminated block, expected '}'"));
            }
            body.push(self.statement()?);
        }
        self.advance(); // '}'
        Ok(body)
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.and_expr()?;
        while self.check(&TokenKind::Or) {
            let line = self.advance().line;
            let rhs = self.and_expr()?;
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.equality()?;
        while self.check(&TokenKind::And) {
            let line = self.advance().line;
            let rhs = self.equality()?;
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.comparison()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.additive()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            let line = self.advance().line;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.advance().line;
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                line,
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.primary()?;
        loop {
            if self.check(&TokenKind::LParen) {
                let line = self.advance().line;
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "')' after arguments")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    line,
                };
            } else if self.eat(&TokenKind::Dot) {
                let name = self.ident()?;
                expr = Expr::Field {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Nil)
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.err_here("expected expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Result<Vec<Stmt>, ScriptError> {
        let tokens = Lexer::new("test", src).lex()?;
        Parser::new("test", tokens).parse_chunk()
    }

    #[test]
    fn parses_function_and_call() {
        let body = parse("fn add(a, b) { return a + b; } add(1, 2);").unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[0], Stmt::FnDecl(f) if f.params.len() == 2));
    }

    #[test]
    fn parses_field_chain() {
        let body = parse("m.sub.run(1);").unwrap();
        let Stmt::Expr(Expr::Call { callee, .. }) = &body[0] else {
            panic!("expected call statement");
        };
        assert!(matches!(&**callee, Expr::Field { name, .. } if name == "run"));
    }

    #[test]
    fn malformed_source_fails() {
        assert!(parse("malformed{{{").is_err());
        assert!(parse("let = 3;").is_err());
        assert!(parse("while true {").is_err());
    }

    #[test]
    fn assignment_requires_semicolon() {
        let err = parse("x = 1").unwrap_err();
        assert!(err.message.contains("';'"), "{}", err.message);
    }

    #[test]
    fn else_if_chains() {
        let body = parse("if a { } else if b { } else { c(); }").unwrap();
        let Stmt::If { else_body, .. } = &body[0] else {
            panic!("expected if");
        };
        assert!(matches!(&else_body[0], Stmt::If { .. }));
    }
}
