//! Recursive-descent parser with Pratt-style expression precedence.
//!
//! Statements are dispatched on their leading token; expressions climb
//! the precedence ladder from assignment (lowest) to primary (highest).
//! There is no panic-mode resync in this core: the first unexpected
//! token aborts parsing with a [`Span`]-carrying error.

use crate::ast::*;
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("unexpected token {found:?} at line {line}, expected {expected}")]
    Unexpected {
        found: TokenKind,
        expected: &'static str,
        line: usize,
        span: Span,
    },
    #[error("invalid assignment target at line {line}")]
    InvalidAssignTarget { line: usize, span: Span },
}

impl Error {
    pub fn span(&self) -> Span {
        match self {
            Error::Unexpected { span, .. } => *span,
            Error::InvalidAssignTarget { span, .. } => *span,
        }
    }
}

struct Parser<'a, 'src> {
    tokens: &'a [Token<'src>],
    pos: usize,
    block_depth: usize,
}

impl<'a, 'src> Parser<'a, 'src> {
    fn new(tokens: &'a [Token<'src>]) -> Parser<'a, 'src> {
        Parser {
            tokens,
            pos: 0,
            block_depth: 0,
        }
    }

    fn peek(&self) -> &Token<'src> {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token<'src> {
        &self.tokens[self.pos - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token<'src> {
        if !self.is_at_end() {
            self.pos += 1;
        }
        self.previous()
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, expected: &'static str) -> Result<&Token<'src>, Error> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let found = self.peek();
            Err(Error::Unexpected {
                found: found.kind,
                expected,
                line: found.span.line,
                span: found.span,
            })
        }
    }

    // ---- statements ----

    fn program(&mut self) -> Result<Program, Error> {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        Ok(Program { stmts })
    }

    fn statement(&mut self) -> Result<Stmt, Error> {
        match self.peek().kind {
            TokenKind::Let => self.let_statement(),
            TokenKind::Print => self.print_statement(),
            TokenKind::LeftBrace => {
                let start = self.peek().span;
                let block = self.block()?;
                Ok(Stmt::new(StmtKind::Block(block), start))
            }
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Fn => self.fn_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Struct => self.struct_statement(),
            TokenKind::Break => self.break_statement(),
            TokenKind::Continue => self.continue_statement(),
            TokenKind::Use => self.use_statement(),
            TokenKind::Yield => self.yield_statement(),
            TokenKind::Assert => self.assert_statement(),
            TokenKind::Impl => self.impl_statement(),
            _ => self.expr_statement(),
        }
    }

    fn block(&mut self) -> Result<Block, Error> {
        self.consume(TokenKind::LeftBrace, "'{'")?;
        self.block_depth += 1;
        let depth = self.block_depth;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.statement()?);
        }
        self.consume(TokenKind::RightBrace, "'}'")?;
        self.block_depth -= 1;
        Ok(Block { stmts, depth })
    }

    fn let_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let name = self
            .consume(TokenKind::Identifier, "identifier")?
            .lexeme
            .to_string();
        self.consume(TokenKind::Equal, "'='")?;
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(StmtKind::Let { name, value }, start))
    }

    fn print_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(StmtKind::Print(value), start))
    }

    fn if_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        self.consume(TokenKind::LeftParen, "'('")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "')'")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            start,
        ))
    }

    fn while_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        self.consume(TokenKind::LeftParen, "'('")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "')'")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::new(
            StmtKind::While {
                cond,
                body,
                label: String::new(),
            },
            start,
        ))
    }

    fn for_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        self.consume(TokenKind::LeftParen, "'('")?;
        let init = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.consume(TokenKind::Semicolon, "';'")?;
        let cond = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.consume(TokenKind::Semicolon, "';'")?;
        let advance = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.consume(TokenKind::RightParen, "')'")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::new(
            StmtKind::For {
                init,
                cond,
                advance,
                body,
                label: String::new(),
            },
            start,
        ))
    }

    fn fn_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let name = self
            .consume(TokenKind::Identifier, "function name")?
            .lexeme
            .to_string();
        self.consume(TokenKind::LeftParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                params.push(
                    self.consume(TokenKind::Identifier, "parameter name")?
                        .lexeme
                        .to_string(),
                );
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "')'")?;
        let body = self.block()?;
        Ok(Stmt::new(StmtKind::Fn { name, params, body }, start))
    }

    fn return_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(StmtKind::Return { value }, start))
    }

    fn struct_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let name = self
            .consume(TokenKind::Identifier, "struct name")?
            .lexeme
            .to_string();
        self.consume(TokenKind::LeftBrace, "'{'")?;
        let mut properties = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                properties.push(
                    self.consume(TokenKind::Identifier, "field name")?
                        .lexeme
                        .to_string(),
                );
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "'}'")?;
        Ok(Stmt::new(StmtKind::Struct { name, properties }, start))
    }

    fn break_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(
            StmtKind::Break {
                label: String::new(),
            },
            start,
        ))
    }

    fn continue_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(
            StmtKind::Continue {
                label: String::new(),
            },
            start,
        ))
    }

    fn use_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let mut path = self
            .consume(TokenKind::Identifier, "module path")?
            .lexeme
            .to_string();
        while self.matches(TokenKind::Dot) {
            path.push('.');
            path.push_str(self.consume(TokenKind::Identifier, "identifier")?.lexeme);
        }
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(StmtKind::Use { path }, start))
    }

    fn yield_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(StmtKind::Yield { value }, start))
    }

    fn assert_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let cond = self.expression()?;
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(StmtKind::Assert { cond }, start))
    }

    fn impl_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        self.advance();
        let type_name = self
            .consume(TokenKind::Identifier, "type name")?
            .lexeme
            .to_string();
        self.consume(TokenKind::LeftBrace, "'{'")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(self.fn_statement()?);
        }
        self.consume(TokenKind::RightBrace, "'}'")?;
        Ok(Stmt::new(StmtKind::Impl { type_name, methods }, start))
    }

    fn expr_statement(&mut self) -> Result<Stmt, Error> {
        let start = self.peek().span;
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(Stmt::new(StmtKind::Expr(value), start))
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<Expr, Error> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, Error> {
        let target = self.conditional()?;
        if self.matches(TokenKind::Equal) {
            let eq = self.previous().span;
            let value = self.assignment()?;
            match &target.kind {
                ExprKind::Variable(_) | ExprKind::Get { .. } | ExprKind::Subscript { .. } => {
                    let span = target.span;
                    Ok(Expr::new(
                        ExprKind::Assign {
                            target: Box::new(target),
                            value: Box::new(value),
                        },
                        span,
                    ))
                }
                _ => Err(Error::InvalidAssignTarget {
                    line: eq.line,
                    span: eq,
                }),
            }
        } else {
            Ok(target)
        }
    }

    fn conditional(&mut self) -> Result<Expr, Error> {
        let cond = self.logical_or()?;
        if self.matches(TokenKind::Question) {
            let span = cond.span;
            let then_branch = self.expression()?;
            self.consume(TokenKind::Colon, "':'")?;
            let else_branch = self.conditional()?;
            Ok(Expr::new(
                ExprKind::Conditional {
                    cond: Box::new(cond),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                },
                span,
            ))
        } else {
            Ok(cond)
        }
    }

    fn logical_or(&mut self) -> Result<Expr, Error> {
        let mut expr = self.logical_and()?;
        while self.matches(TokenKind::PipePipe) {
            let span = expr.span;
            let rhs = self.logical_and()?;
            expr = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::Or,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr, Error> {
        let mut expr = self.equality()?;
        while self.matches(TokenKind::AmpAmp) {
            let span = expr.span;
            let rhs = self.equality()?;
            expr = Expr::new(
                ExprKind::Logical {
                    op: LogicalOp::And,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, Error> {
        let mut expr = self.comparison()?;
        loop {
            let op = if self.matches(TokenKind::EqualEqual) {
                BinOp::Eq
            } else if self.matches(TokenKind::BangEqual) {
                BinOp::Neq
            } else {
                break;
            };
            let span = expr.span;
            let rhs = self.comparison()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, Error> {
        let mut expr = self.additive()?;
        loop {
            let op = if self.matches(TokenKind::Less) {
                BinOp::Lt
            } else if self.matches(TokenKind::LessEqual) {
                BinOp::Le
            } else if self.matches(TokenKind::Greater) {
                BinOp::Gt
            } else if self.matches(TokenKind::GreaterEqual) {
                BinOp::Ge
            } else {
                break;
            };
            let span = expr.span;
            let rhs = self.additive()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr, Error> {
        let mut expr = self.multiplicative()?;
        loop {
            let op = if self.matches(TokenKind::Plus) {
                BinOp::Add
            } else if self.matches(TokenKind::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let span = expr.span;
            let rhs = self.multiplicative()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> Result<Expr, Error> {
        let mut expr = self.unary()?;
        loop {
            let op = if self.matches(TokenKind::Star) {
                BinOp::Mul
            } else if self.matches(TokenKind::Slash) {
                BinOp::Div
            } else if self.matches(TokenKind::Percent) {
                BinOp::Mod
            } else {
                break;
            };
            let span = expr.span;
            let rhs = self.unary()?;
            expr = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(expr),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        let op = if self.matches(TokenKind::Minus) {
            Some(UnOp::Neg)
        } else if self.matches(TokenKind::Bang) {
            Some(UnOp::Not)
        } else {
            None
        };
        if let Some(op) = op {
            let span = self.previous().span;
            let operand = self.unary()?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ))
        } else {
            self.postfix()
        }
    }

    fn postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(TokenKind::LeftParen) {
                let callee = match &expr.kind {
                    ExprKind::Variable(name) => name.clone(),
                    _ => {
                        let tok = self.previous();
                        return Err(Error::Unexpected {
                            found: tok.kind,
                            expected: "callable name",
                            line: tok.span.line,
                            span: tok.span,
                        });
                    }
                };
                let span = expr.span;
                let mut args = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightParen, "')'")?;
                expr = Expr::new(ExprKind::Call { callee, args }, span);
            } else if self.matches(TokenKind::Dot) {
                let span = expr.span;
                let name = self
                    .consume(TokenKind::Identifier, "property name")?
                    .lexeme
                    .to_string();
                expr = Expr::new(
                    ExprKind::Get {
                        object: Box::new(expr),
                        name,
                    },
                    span,
                );
            } else if self.matches(TokenKind::LeftBracket) {
                let span = expr.span;
                let index = self.expression()?;
                self.consume(TokenKind::RightBracket, "']'")?;
                expr = Expr::new(
                    ExprKind::Subscript {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number => {
                self.advance();
                let value: f64 = tok.lexeme.parse().expect("lexer only emits valid numbers");
                Ok(Expr::new(ExprKind::Literal(Literal::Number(value)), tok.span))
            }
            TokenKind::String => {
                self.advance();
                let inner = &tok.lexeme[1..tok.lexeme.len() - 1];
                Ok(Expr::new(
                    ExprKind::Literal(Literal::String(inner.to_string())),
                    tok.span,
                ))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Bool(true)), tok.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Bool(false)), tok.span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::new(ExprKind::Literal(Literal::Null), tok.span))
            }
            TokenKind::Identifier => {
                self.advance();
                let name = tok.lexeme.to_string();
                if self.check(TokenKind::LeftBrace) {
                    self.struct_literal(name, tok.span)
                } else {
                    Ok(Expr::new(ExprKind::Variable(name), tok.span))
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.expression()?;
                self.consume(TokenKind::RightParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(TokenKind::RightBracket) {
                    loop {
                        items.push(self.expression()?);
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.consume(TokenKind::RightBracket, "']'")?;
                Ok(Expr::new(ExprKind::ArrayLiteral(items), tok.span))
            }
            other => Err(Error::Unexpected {
                found: other,
                expected: "expression",
                line: tok.span.line,
                span: tok.span,
            }),
        }
    }

    fn struct_literal(&mut self, name: String, span: Span) -> Result<Expr, Error> {
        self.consume(TokenKind::LeftBrace, "'{'")?;
        let mut fields = Vec::new();
        if !self.check(TokenKind::RightBrace) {
            loop {
                let field_tok = self.consume(TokenKind::Identifier, "field name")?.clone();
                let field_span = field_tok.span;
                let field_name = field_tok.lexeme.to_string();
                self.consume(TokenKind::Colon, "':'")?;
                let value = self.expression()?;
                fields.push(StructFieldInit {
                    name: field_name,
                    value,
                    span: field_span,
                });
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBrace, "'}'")?;
        Ok(Expr::new(ExprKind::StructLiteral { name, fields }, span))
    }
}

/// Parses a complete token stream (as produced by [`crate::lexer::lex`])
/// into a [`Program`].
pub fn parse(tokens: &[Token<'_>]) -> Result<Program, Error> {
    let mut parser = Parser::new(tokens);
    let program = parser.program()?;
    log::trace!("parsed {} top-level statements", program.stmts.len());
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_str(source: &str) -> Program {
        let tokens = lex(source).unwrap();
        parse(&tokens).unwrap()
    }

    #[test]
    fn test_arithmetic_precedence() {
        let program = parse_str("print 1 + 2 * 3;");
        match &program.stmts[0].kind {
            StmtKind::Print(expr) => match &expr.kind {
                ExprKind::Binary {
                    op: BinOp::Add,
                    lhs,
                    rhs,
                } => {
                    assert!(matches!(
                        lhs.kind,
                        ExprKind::Literal(Literal::Number(n)) if n == 1.0
                    ));
                    assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
                }
                other => panic!("expected Add at top, got {:?}", other),
            },
            other => panic!("expected print statement, got {:?}", other),
        }
    }

    #[test]
    fn test_let_and_if() {
        let program = parse_str("let x = 1; if (x == 1) { print x; } else { print 0; }");
        assert_eq!(program.stmts.len(), 2);
        assert!(matches!(program.stmts[0].kind, StmtKind::Let { .. }));
        assert!(matches!(program.stmts[1].kind, StmtKind::If { .. }));
    }

    #[test]
    fn test_fn_declaration() {
        let program = parse_str("fn add(a, b) { return a + b; }");
        match &program.stmts[0].kind {
            StmtKind::Fn { name, params, body } => {
                assert_eq!(name, "add");
                assert_eq!(params, &vec!["a".to_string(), "b".to_string()]);
                assert_eq!(body.stmts.len(), 1);
            }
            other => panic!("expected fn, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_literal_vs_variable() {
        let program = parse_str("let p = P { x: 1, y: 2 };");
        match &program.stmts[0].kind {
            StmtKind::Let { value, .. } => match &value.kind {
                ExprKind::StructLiteral { name, fields } => {
                    assert_eq!(name, "P");
                    assert_eq!(fields.len(), 2);
                }
                other => panic!("expected struct literal, got {:?}", other),
            },
            other => panic!("expected let, got {:?}", other),
        }
        let program = parse_str("print p;");
        assert!(matches!(
            &program.stmts[0].kind,
            StmtKind::Print(Expr {
                kind: ExprKind::Variable(_),
                ..
            })
        ));
    }

    #[test]
    fn test_call_requires_named_callee() {
        let tokens = lex("(1 + 2)();").unwrap();
        let err = parse(&tokens).unwrap_err();
        assert!(matches!(err, Error::Unexpected { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        let tokens = lex("1 = 2;").unwrap();
        let err = parse(&tokens).unwrap_err();
        assert!(matches!(err, Error::InvalidAssignTarget { .. }));
    }

    #[test]
    fn test_ternary() {
        let program = parse_str("print true ? 1 : 2;");
        match &program.stmts[0].kind {
            StmtKind::Print(expr) => {
                assert!(matches!(expr.kind, ExprKind::Conditional { .. }));
            }
            other => panic!("expected print, got {:?}", other),
        }
    }

    #[test]
    fn test_for_loop_optional_clauses() {
        let program = parse_str("for (;;) { break; }");
        match &program.stmts[0].kind {
            StmtKind::For {
                init,
                cond,
                advance,
                ..
            } => {
                assert!(init.is_none());
                assert!(cond.is_none());
                assert!(advance.is_none());
            }
            other => panic!("expected for, got {:?}", other),
        }
    }
}
