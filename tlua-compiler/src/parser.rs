use anyhow::{bail, Result};

use crate::ast::*;
use crate::diagnostics::Diagnostics;
use crate::lexer::{Keyword, Token, TokenKind};
use crate::source::SourceFile;

pub struct Parser<'a> {
    source: &'a SourceFile,
    tokens: Vec<Token>,
    current: usize,
    diagnostics: Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a SourceFile, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            current: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    pub fn parse(&mut self) -> Result<Block> {
        let block = self.parse_block()?;
        if !matches!(self.peek_kind(), TokenKind::Eof) {
            let token = self.peek().clone();
            return Err(self.syntax_error(&token, "expected a statement"));
        }
        Ok(block)
    }

    fn span_from_token(token: &Token) -> SourceSpan {
        let len = token.lexeme.chars().count().max(1);
        SourceSpan::new(
            token.line,
            token.column,
            token.line,
            token.column + len.saturating_sub(1),
        )
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_ahead(&self, offset: usize) -> &TokenKind {
        let index = (self.current + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.syntax_error(&token, what))
        }
    }

    fn syntax_error(&mut self, token: &Token, what: &str) -> anyhow::Error {
        let near = if token.lexeme.is_empty() {
            "<eof>".to_string()
        } else {
            token.lexeme.clone()
        };
        let message = format!("{what} near '{near}'");
        self.diagnostics
            .error(message.clone(), Self::span_from_token(token));
        anyhow::anyhow!(
            "{}:{}:{}: {message}",
            self.source.name,
            token.line,
            token.column
        )
    }

    fn block_ends(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Eof
                | TokenKind::Keyword(Keyword::End)
                | TokenKind::Keyword(Keyword::Else)
                | TokenKind::Keyword(Keyword::Elseif)
                | TokenKind::Keyword(Keyword::Until)
        )
    }

    fn parse_block(&mut self) -> Result<Block> {
        let mut statements = Vec::new();
        while !self.block_ends() {
            if let TokenKind::Keyword(Keyword::Return) = self.peek_kind() {
                statements.push(self.parse_return()?);
                break;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Block { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek_kind() {
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                Ok(Statement::Break)
            }
            TokenKind::Keyword(Keyword::Goto) => {
                self.advance();
                let name = self.expect(TokenKind::Name, "expected label name after 'goto'")?;
                Ok(Statement::Goto(name.lexeme))
            }
            TokenKind::DoubleColon => {
                self.advance();
                let name = self.expect(TokenKind::Name, "expected label name")?;
                self.expect(TokenKind::DoubleColon, "expected '::' to close label")?;
                Ok(Statement::Label(name.lexeme))
            }
            TokenKind::Keyword(Keyword::Do) => {
                self.advance();
                let body = self.parse_block()?;
                self.expect(TokenKind::Keyword(Keyword::End), "expected 'end' after block")?;
                Ok(Statement::Do(body))
            }
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Repeat) => self.parse_repeat(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Function) => self.parse_function_statement(),
            TokenKind::Keyword(Keyword::Local) => self.parse_local(),
            TokenKind::Keyword(Keyword::Global) => self.parse_global(),
            TokenKind::Keyword(Keyword::Interface) => self.parse_interface(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_return(&mut self) -> Result<Statement> {
        let token = self.advance();
        let span = Self::span_from_token(&token);
        let mut exprs = Vec::new();
        if !self.block_ends() && !self.check(&TokenKind::Semicolon) {
            exprs.push(self.parse_expression()?);
            while self.matches(&TokenKind::Comma) {
                exprs.push(self.parse_expression()?);
            }
        }
        self.matches(&TokenKind::Semicolon);
        Ok(Statement::Return(ReturnStatement { exprs, span }))
    }

    fn parse_while(&mut self) -> Result<Statement> {
        self.advance();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Keyword(Keyword::Do), "expected 'do' after while condition")?;
        let body = self.parse_block()?;
        self.expect(TokenKind::Keyword(Keyword::End), "expected 'end' after while body")?;
        Ok(Statement::While(WhileStatement { condition, body }))
    }

    fn parse_repeat(&mut self) -> Result<Statement> {
        self.advance();
        let body = self.parse_block()?;
        self.expect(
            TokenKind::Keyword(Keyword::Until),
            "expected 'until' after repeat body",
        )?;
        let until = self.parse_expression()?;
        Ok(Statement::Repeat(RepeatStatement { body, until }))
    }

    fn parse_if(&mut self) -> Result<Statement> {
        self.advance();
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Keyword(Keyword::Then), "expected 'then' after condition")?;
        let body = self.parse_block()?;

        let mut elseifs = Vec::new();
        while self.matches(&TokenKind::Keyword(Keyword::Elseif)) {
            let condition = self.parse_expression()?;
            self.expect(TokenKind::Keyword(Keyword::Then), "expected 'then' after condition")?;
            let body = self.parse_block()?;
            elseifs.push(ElseIf { condition, body });
        }

        let else_body = if self.matches(&TokenKind::Keyword(Keyword::Else)) {
            Some(self.parse_block()?)
        } else {
            None
        };

        self.expect(TokenKind::Keyword(Keyword::End), "expected 'end' to close 'if'")?;
        Ok(Statement::If(IfStatement {
            condition,
            body,
            elseifs,
            else_body,
        }))
    }

    fn parse_for(&mut self) -> Result<Statement> {
        self.advance();
        let first = self.expect(TokenKind::Name, "expected loop variable after 'for'")?;

        if self.check(&TokenKind::Assign) {
            self.advance();
            let start = self.parse_expression()?;
            self.expect(TokenKind::Comma, "expected ',' after loop start value")?;
            let limit = self.parse_expression()?;
            let step = if self.matches(&TokenKind::Comma) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect(TokenKind::Keyword(Keyword::Do), "expected 'do' after loop header")?;
            let body = self.parse_block()?;
            self.expect(TokenKind::Keyword(Keyword::End), "expected 'end' after loop body")?;
            return Ok(Statement::NumericFor(NumericForStatement {
                name: first.lexeme.clone(),
                name_span: Self::span_from_token(&first),
                start,
                limit,
                step,
                body,
            }));
        }

        let span = Self::span_from_token(&first);
        let mut names = vec![self.name_decl_from(first)?];
        while self.matches(&TokenKind::Comma) {
            let name = self.expect(TokenKind::Name, "expected loop variable name")?;
            names.push(self.name_decl_from(name)?);
        }
        self.expect(TokenKind::Keyword(Keyword::In), "expected 'in' after loop variables")?;
        let mut exprs = vec![self.parse_expression()?];
        while self.matches(&TokenKind::Comma) {
            exprs.push(self.parse_expression()?);
        }
        self.expect(TokenKind::Keyword(Keyword::Do), "expected 'do' after loop header")?;
        let body = self.parse_block()?;
        self.expect(TokenKind::Keyword(Keyword::End), "expected 'end' after loop body")?;
        Ok(Statement::GenericFor(GenericForStatement {
            names,
            exprs,
            body,
            span,
        }))
    }

    /// A consumed name token plus an optional `: type` annotation.
    fn name_decl_from(&mut self, token: Token) -> Result<NameDecl> {
        let annotation = if self.matches(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        Ok(NameDecl {
            name: token.lexeme.clone(),
            span: Self::span_from_token(&token),
            annotation,
        })
    }

    fn parse_function_statement(&mut self) -> Result<Statement> {
        let token = self.advance();
        let span = Self::span_from_token(&token);

        let name = self.expect(TokenKind::Name, "expected function name")?;
        let mut target = Expression {
            span: Self::span_from_token(&name),
            kind: ExpressionKind::Name(name.lexeme),
        };
        let mut method = None;

        loop {
            if self.matches(&TokenKind::Dot) {
                let field = self.expect(TokenKind::Name, "expected field name after '.'")?;
                let field_span = Self::span_from_token(&field);
                target = Expression {
                    span: SourceSpan::union(&target.span, &field_span),
                    kind: ExpressionKind::Field {
                        prefix: Box::new(target),
                        name: field.lexeme,
                    },
                };
            } else if self.matches(&TokenKind::Colon) {
                let name = self.expect(TokenKind::Name, "expected method name after ':'")?;
                method = Some((name.lexeme.clone(), Self::span_from_token(&name)));
                break;
            } else {
                break;
            }
        }

        let body = self.parse_function_body()?;
        Ok(Statement::Function(FunctionStatement {
            target,
            method,
            body,
            span,
        }))
    }

    fn parse_local(&mut self) -> Result<Statement> {
        let token = self.advance();
        let span = Self::span_from_token(&token);

        if self.matches(&TokenKind::Keyword(Keyword::Function)) {
            let name = self.expect(TokenKind::Name, "expected function name after 'local function'")?;
            let body = self.parse_function_body()?;
            return Ok(Statement::LocalFunction(LocalFunctionStatement {
                name: name.lexeme.clone(),
                name_span: Self::span_from_token(&name),
                body,
                span,
            }));
        }

        let name = self.expect(TokenKind::Name, "expected variable name after 'local'")?;
        let mut names = vec![self.name_decl_from(name)?];
        while self.matches(&TokenKind::Comma) {
            let name = self.expect(TokenKind::Name, "expected variable name")?;
            names.push(self.name_decl_from(name)?);
        }

        let mut exprs = Vec::new();
        if self.matches(&TokenKind::Assign) {
            exprs.push(self.parse_expression()?);
            while self.matches(&TokenKind::Comma) {
                exprs.push(self.parse_expression()?);
            }
        }

        Ok(Statement::Local(LocalStatement { names, exprs, span }))
    }

    fn parse_global(&mut self) -> Result<Statement> {
        let token = self.advance();
        let span = Self::span_from_token(&token);

        let name = self.expect(TokenKind::Name, "expected name after 'global'")?;
        let mut names = vec![self.name_decl_from(name)?];
        while self.matches(&TokenKind::Comma) {
            let name = self.expect(TokenKind::Name, "expected name")?;
            names.push(self.name_decl_from(name)?);
        }

        let mut exprs = Vec::new();
        if self.matches(&TokenKind::Assign) {
            exprs.push(self.parse_expression()?);
            while self.matches(&TokenKind::Comma) {
                exprs.push(self.parse_expression()?);
            }
        }

        Ok(Statement::Global(GlobalStatement { names, exprs, span }))
    }

    fn parse_interface(&mut self) -> Result<Statement> {
        let token = self.advance();
        let span = Self::span_from_token(&token);

        let name = self.expect(TokenKind::Name, "expected interface name")?;
        let genparams = if self.check(&TokenKind::Less) {
            self.parse_genparams()?
        } else {
            Vec::new()
        };
        self.expect(TokenKind::Colon, "expected ':' after interface name")?;
        let ty = self.parse_type()?;

        Ok(Statement::Interface(InterfaceStatement {
            name: name.lexeme,
            genparams,
            ty,
            span,
        }))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement> {
        let first = self.parse_suffixed_expression()?;

        if self.check(&TokenKind::Assign) || self.check(&TokenKind::Comma) {
            let span = first.span;
            let mut targets = vec![first];
            while self.matches(&TokenKind::Comma) {
                targets.push(self.parse_suffixed_expression()?);
            }
            self.expect(TokenKind::Assign, "expected '=' in assignment")?;
            let mut values = vec![self.parse_expression()?];
            while self.matches(&TokenKind::Comma) {
                values.push(self.parse_expression()?);
            }

            for target in &targets {
                if !matches!(
                    target.kind,
                    ExpressionKind::Name(_)
                        | ExpressionKind::Field { .. }
                        | ExpressionKind::Index { .. }
                ) {
                    self.diagnostics
                        .error("cannot assign to this expression", target.span);
                    bail!("cannot assign to this expression");
                }
            }

            return Ok(Statement::Assign(AssignStatement {
                targets,
                values,
                span,
            }));
        }

        match first.kind {
            ExpressionKind::Call { .. } | ExpressionKind::MethodCall { .. } => {
                Ok(Statement::Call(first))
            }
            _ => {
                let token = self.peek().clone();
                Err(self.syntax_error(&token, "expected statement"))
            }
        }
    }

    // Expressions, precedence per the reference manual.

    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_binary(0)
    }

    fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8, u8)> {
        // (op, left binding power, right binding power)
        let entry = match kind {
            TokenKind::Keyword(Keyword::Or) => (BinaryOp::Or, 1, 2),
            TokenKind::Keyword(Keyword::And) => (BinaryOp::And, 3, 4),
            TokenKind::Less => (BinaryOp::Less, 5, 6),
            TokenKind::Greater => (BinaryOp::Greater, 5, 6),
            TokenKind::LessEq => (BinaryOp::LessEq, 5, 6),
            TokenKind::GreaterEq => (BinaryOp::GreaterEq, 5, 6),
            TokenKind::NotEq => (BinaryOp::NotEq, 5, 6),
            TokenKind::Eq => (BinaryOp::Eq, 5, 6),
            TokenKind::Pipe => (BinaryOp::BitOr, 7, 8),
            TokenKind::Tilde => (BinaryOp::BitXor, 9, 10),
            TokenKind::Amp => (BinaryOp::BitAnd, 11, 12),
            TokenKind::Shl => (BinaryOp::Shl, 13, 14),
            TokenKind::Shr => (BinaryOp::Shr, 13, 14),
            TokenKind::Concat => (BinaryOp::Concat, 18, 17), // right associative
            TokenKind::Plus => (BinaryOp::Add, 19, 20),
            TokenKind::Minus => (BinaryOp::Sub, 19, 20),
            TokenKind::Star => (BinaryOp::Mul, 21, 22),
            TokenKind::Slash => (BinaryOp::Div, 21, 22),
            TokenKind::DoubleSlash => (BinaryOp::IDiv, 21, 22),
            TokenKind::Percent => (BinaryOp::Mod, 21, 22),
            TokenKind::Caret => (BinaryOp::Pow, 28, 27), // right associative
            _ => return None,
        };
        Some(entry)
    }

    fn parse_binary(&mut self, min_power: u8) -> Result<Expression> {
        let mut left = self.parse_unary()?;

        while let Some((op, left_power, right_power)) = Self::binary_op(self.peek_kind()) {
            if left_power < min_power {
                break;
            }
            self.advance();
            let right = self.parse_binary(right_power)?;
            let span = SourceSpan::union(&left.span, &right.span);
            left = Expression {
                span,
                kind: ExpressionKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        let op = match self.peek_kind() {
            TokenKind::Keyword(Keyword::Not) => Some(UnaryOp::Not),
            TokenKind::Hash => Some(UnaryOp::Len),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };

        if let Some(op) = op {
            let token = self.advance();
            let operand = self.parse_binary(23)?; // unary binds above '*', below '^'
            let span = SourceSpan::union(&Self::span_from_token(&token), &operand.span);
            return Ok(Expression {
                span,
                kind: ExpressionKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            });
        }

        self.parse_simple_expression()
    }

    fn parse_simple_expression(&mut self) -> Result<Expression> {
        let token = self.peek().clone();
        let span = Self::span_from_token(&token);

        let kind = match &token.kind {
            TokenKind::Keyword(Keyword::Nil) => {
                self.advance();
                ExpressionKind::Nil
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                ExpressionKind::True
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                ExpressionKind::False
            }
            TokenKind::Number(value) => {
                let value = *value;
                self.advance();
                ExpressionKind::Number(NumberLiteral {
                    lexeme: token.lexeme.clone(),
                    value,
                })
            }
            TokenKind::Str(value) => {
                let value = value.clone();
                self.advance();
                ExpressionKind::String(StringLiteral {
                    lexeme: token.lexeme.clone(),
                    value,
                })
            }
            TokenKind::Dots => {
                self.advance();
                ExpressionKind::Dots
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.advance();
                let body = self.parse_function_body()?;
                ExpressionKind::Function(Box::new(body))
            }
            TokenKind::LBrace => return self.parse_table_constructor(),
            _ => return self.parse_suffixed_expression(),
        };

        Ok(Expression { span, kind })
    }

    fn parse_primary_expression(&mut self) -> Result<Expression> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Name => {
                self.advance();
                Ok(Expression {
                    span: Self::span_from_token(&token),
                    kind: ExpressionKind::Name(token.lexeme),
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(inner)
            }
            _ => Err(self.syntax_error(&token, "expected expression")),
        }
    }

    fn parse_suffixed_expression(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary_expression()?;

        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect(TokenKind::Name, "expected field name after '.'")?;
                    let span = SourceSpan::union(&expr.span, &Self::span_from_token(&name));
                    expr = Expression {
                        span,
                        kind: ExpressionKind::Field {
                            prefix: Box::new(expr),
                            name: name.lexeme,
                        },
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.parse_expression()?;
                    let close = self.expect(TokenKind::RBracket, "expected ']'")?;
                    let span = SourceSpan::union(&expr.span, &Self::span_from_token(&close));
                    expr = Expression {
                        span,
                        kind: ExpressionKind::Index {
                            prefix: Box::new(expr),
                            key: Box::new(key),
                        },
                    };
                }
                TokenKind::Colon if self.call_follows(1) => {
                    self.advance();
                    let name = self.expect(TokenKind::Name, "expected method name after ':'")?;
                    let args = self.parse_call_args()?;
                    let span = SourceSpan::union(&expr.span, &Self::span_from_token(&name));
                    expr = Expression {
                        span,
                        kind: ExpressionKind::MethodCall {
                            prefix: Box::new(expr),
                            name: name.lexeme,
                            args,
                        },
                    };
                }
                TokenKind::LParen | TokenKind::Str(_) | TokenKind::LBrace => {
                    let args = self.parse_call_args()?;
                    let span = expr.span;
                    expr = Expression {
                        span,
                        kind: ExpressionKind::Call {
                            prefix: Box::new(expr),
                            args,
                        },
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// After a ':' in expression position, a method call requires a name
    /// followed by arguments; anything else is a type annotation context.
    fn call_follows(&self, offset: usize) -> bool {
        matches!(self.peek_ahead(offset), TokenKind::Name)
            && matches!(
                self.peek_ahead(offset + 1),
                TokenKind::LParen | TokenKind::Str(_) | TokenKind::LBrace
            )
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expression>> {
        match self.peek_kind() {
            TokenKind::LParen => {
                self.advance();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    args.push(self.parse_expression()?);
                    while self.matches(&TokenKind::Comma) {
                        args.push(self.parse_expression()?);
                    }
                }
                self.expect(TokenKind::RParen, "expected ')' after arguments")?;
                Ok(args)
            }
            TokenKind::Str(_) => {
                let expr = self.parse_simple_expression()?;
                Ok(vec![expr])
            }
            TokenKind::LBrace => {
                let expr = self.parse_table_constructor()?;
                Ok(vec![expr])
            }
            _ => {
                let token = self.peek().clone();
                Err(self.syntax_error(&token, "expected call arguments"))
            }
        }
    }

    fn parse_table_constructor(&mut self) -> Result<Expression> {
        let open = self.expect(TokenKind::LBrace, "expected '{'")?;
        let mut fields = Vec::new();

        while !self.check(&TokenKind::RBrace) {
            match self.peek_kind() {
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "expected ']'")?;
                    self.expect(TokenKind::Assign, "expected '=' after table key")?;
                    let value = self.parse_expression()?;
                    fields.push(TableField::Keyed { key, value });
                }
                TokenKind::Name if matches!(self.peek_ahead(1), TokenKind::Assign) => {
                    let name = self.advance();
                    self.advance();
                    let value = self.parse_expression()?;
                    fields.push(TableField::Named {
                        key: name.lexeme.clone(),
                        span: Self::span_from_token(&name),
                        value,
                    });
                }
                _ => {
                    fields.push(TableField::Item(self.parse_expression()?));
                }
            }

            if !self.matches(&TokenKind::Comma) && !self.matches(&TokenKind::Semicolon) {
                break;
            }
        }

        let close = self.expect(TokenKind::RBrace, "expected '}' to close table")?;
        let span = SourceSpan::union(
            &Self::span_from_token(&open),
            &Self::span_from_token(&close),
        );
        Ok(Expression {
            span,
            kind: ExpressionKind::Table(fields),
        })
    }

    fn parse_function_body(&mut self) -> Result<FunctionBody> {
        let genparams = if self.check(&TokenKind::Less) {
            self.parse_genparams()?
        } else {
            Vec::new()
        };

        self.expect(TokenKind::LParen, "expected '(' before parameters")?;
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.check(&TokenKind::RParen) {
            loop {
                if self.matches(&TokenKind::Dots) {
                    variadic = true;
                    break;
                }
                let name = self.expect(TokenKind::Name, "expected parameter name")?;
                params.push(self.name_decl_from(name)?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "expected ')' after parameters")?;

        let ret = if self.matches(&TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let block = self.parse_block()?;
        self.expect(TokenKind::Keyword(Keyword::End), "expected 'end' after function body")?;

        Ok(FunctionBody {
            genparams,
            params,
            variadic,
            ret,
            block,
        })
    }

    // Type expressions.

    fn parse_genparams(&mut self) -> Result<Vec<NameDecl>> {
        self.expect(TokenKind::Less, "expected '<'")?;
        let mut genparams = Vec::new();
        loop {
            let name = self.expect(TokenKind::Name, "expected generic parameter name")?;
            genparams.push(self.name_decl_from(name)?);
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Greater, "expected '>' after generic parameters")?;
        Ok(genparams)
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let mut left = self.parse_product_type()?;
        while self.matches(&TokenKind::Pipe) {
            let right = self.parse_product_type()?;
            let span = SourceSpan::union(&left.span, &right.span);
            left = TypeExpr {
                span,
                kind: TypeExprKind::Sum(Box::new(left), Box::new(right)),
            };
        }
        Ok(left)
    }

    fn parse_product_type(&mut self) -> Result<TypeExpr> {
        let mut left = self.parse_base_type()?;
        while self.matches(&TokenKind::Amp) {
            let right = self.parse_base_type()?;
            let span = SourceSpan::union(&left.span, &right.span);
            left = TypeExpr {
                span,
                kind: TypeExprKind::Product(Box::new(left), Box::new(right)),
            };
        }
        Ok(left)
    }

    fn parse_base_type(&mut self) -> Result<TypeExpr> {
        let token = self.peek().clone();
        let span = Self::span_from_token(&token);

        match &token.kind {
            TokenKind::Keyword(Keyword::Nil) => {
                self.advance();
                Ok(TypeExpr {
                    span,
                    kind: TypeExprKind::Name {
                        name: "nil".to_string(),
                        args: Vec::new(),
                    },
                })
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(TypeExpr {
                    span,
                    kind: TypeExprKind::LiteralBoolean(true),
                })
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(TypeExpr {
                    span,
                    kind: TypeExprKind::LiteralBoolean(false),
                })
            }
            TokenKind::Number(value) => {
                let value = *value;
                self.advance();
                Ok(TypeExpr {
                    span,
                    kind: TypeExprKind::LiteralNumber(value),
                })
            }
            TokenKind::Str(value) => {
                let value = value.clone();
                self.advance();
                Ok(TypeExpr {
                    span,
                    kind: TypeExprKind::LiteralString(value),
                })
            }
            TokenKind::Name => {
                self.advance();
                let args = if self.check(&TokenKind::Less) && self.type_args_follow() {
                    self.parse_type_args()?
                } else {
                    Vec::new()
                };
                Ok(TypeExpr {
                    span,
                    kind: TypeExprKind::Name {
                        name: token.lexeme,
                        args,
                    },
                })
            }
            TokenKind::DollarRequire => {
                self.advance();
                self.expect(TokenKind::LParen, "expected '(' after '$require'")?;
                let inner = self.parse_type()?;
                let close = self.expect(TokenKind::RParen, "expected ')'")?;
                let span = SourceSpan::union(&span, &Self::span_from_token(&close));
                Ok(TypeExpr {
                    span,
                    kind: TypeExprKind::Require(Box::new(inner)),
                })
            }
            TokenKind::LBracket => self.parse_tuple_type(),
            TokenKind::LBrace => self.parse_table_type(),
            TokenKind::Less => self.parse_function_type(),
            TokenKind::LParen => self.parse_paren_or_function_type(),
            _ => Err(self.syntax_error(&token, "expected type")),
        }
    }

    /// Distinguish `Name<args>` from a comparison in annotation-free
    /// contexts: a '<' opens type arguments only when a type token
    /// follows.
    fn type_args_follow(&self) -> bool {
        matches!(
            self.peek_ahead(1),
            TokenKind::Name
                | TokenKind::Keyword(Keyword::Nil)
                | TokenKind::Keyword(Keyword::True)
                | TokenKind::Keyword(Keyword::False)
                | TokenKind::Number(_)
                | TokenKind::Str(_)
                | TokenKind::LBracket
                | TokenKind::LBrace
                | TokenKind::LParen
                | TokenKind::DollarRequire
        )
    }

    fn parse_type_args(&mut self) -> Result<Vec<TypeExpr>> {
        self.expect(TokenKind::Less, "expected '<'")?;
        let mut args = vec![self.parse_type()?];
        while self.matches(&TokenKind::Comma) {
            args.push(self.parse_type()?);
        }
        self.expect(TokenKind::Greater, "expected '>' after type arguments")?;
        Ok(args)
    }

    fn parse_tuple_type(&mut self) -> Result<TypeExpr> {
        let open = self.expect(TokenKind::LBracket, "expected '['")?;
        let mut elems = Vec::new();
        let mut variadic = false;

        if !self.check(&TokenKind::RBracket) {
            loop {
                if self.matches(&TokenKind::Dots) {
                    variadic = true;
                    break;
                }
                elems.push(self.parse_type_param()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let close = self.expect(TokenKind::RBracket, "expected ']' to close tuple type")?;
        let span = SourceSpan::union(
            &Self::span_from_token(&open),
            &Self::span_from_token(&close),
        );
        Ok(TypeExpr {
            span,
            kind: TypeExprKind::Tuple { elems, variadic },
        })
    }

    /// One position of a function or tuple type: `name: T`, `:T`, or a
    /// bare type.
    fn parse_type_param(&mut self) -> Result<TypeParam> {
        if self.matches(&TokenKind::Colon) {
            let ty = self.parse_type()?;
            return Ok(TypeParam { name: None, ty });
        }
        if matches!(self.peek_kind(), TokenKind::Name)
            && matches!(self.peek_ahead(1), TokenKind::Colon)
        {
            let name = self.advance();
            self.advance();
            let ty = self.parse_type()?;
            return Ok(TypeParam {
                name: Some(name.lexeme),
                ty,
            });
        }
        let ty = self.parse_type()?;
        Ok(TypeParam { name: None, ty })
    }

    fn parse_table_type(&mut self) -> Result<TypeExpr> {
        let open = self.expect(TokenKind::LBrace, "expected '{'")?;
        let mut indexes = Vec::new();
        let mut fields = Vec::new();

        loop {
            match self.peek_kind() {
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.parse_type()?;
                    self.expect(TokenKind::RBracket, "expected ']' after index key type")?;
                    self.expect(TokenKind::Colon, "expected ':' after index key")?;
                    let val = self.parse_type()?;
                    indexes.push((key, val));
                }
                TokenKind::Name if matches!(self.peek_ahead(1), TokenKind::Colon) => {
                    let name = self.advance();
                    self.advance();
                    let ty = self.parse_type()?;
                    fields.push(TypeField {
                        name: name.lexeme.clone(),
                        span: Self::span_from_token(&name),
                        ty,
                    });
                }
                _ => break,
            }

            while self.matches(&TokenKind::Semicolon) || self.matches(&TokenKind::Comma) {}
        }

        let close = self.expect(TokenKind::RBrace, "expected '}' to close table type")?;
        let span = SourceSpan::union(
            &Self::span_from_token(&open),
            &Self::span_from_token(&close),
        );
        Ok(TypeExpr {
            span,
            kind: TypeExprKind::Table { indexes, fields },
        })
    }

    fn parse_function_type(&mut self) -> Result<TypeExpr> {
        let start = self.peek().clone();
        let genparams = self.parse_genparams()?;
        let open = self.expect(TokenKind::LParen, "expected '(' in function type")?;
        self.finish_function_type(Self::span_from_token(&start), genparams, open)
    }

    fn parse_paren_or_function_type(&mut self) -> Result<TypeExpr> {
        let open = self.expect(TokenKind::LParen, "expected '('")?;
        let open_span = Self::span_from_token(&open);

        // Collect the parenthesized items, then decide: a ':' after the
        // closing paren makes this a function type, otherwise it must be
        // a parenthesized single type.
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.check(&TokenKind::RParen) {
            loop {
                if self.matches(&TokenKind::Dots) {
                    variadic = true;
                    break;
                }
                params.push(self.parse_type_param()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "expected ')'")?;

        if self.matches(&TokenKind::Colon) {
            let ret = self.parse_type()?;
            let span = SourceSpan::union(&open_span, &ret.span);
            return Ok(TypeExpr {
                span,
                kind: TypeExprKind::Function(FunctionTypeExpr {
                    genparams: Vec::new(),
                    params,
                    variadic,
                    ret: Box::new(ret),
                }),
            });
        }

        if params.len() == 1 && params[0].name.is_none() && !variadic {
            return Ok(params.remove(0).ty);
        }

        let token = self.peek().clone();
        Err(self.syntax_error(&token, "expected ':' after function type parameters"))
    }

    fn finish_function_type(
        &mut self,
        start_span: SourceSpan,
        genparams: Vec<NameDecl>,
        _open: Token,
    ) -> Result<TypeExpr> {
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.check(&TokenKind::RParen) {
            loop {
                if self.matches(&TokenKind::Dots) {
                    variadic = true;
                    break;
                }
                params.push(self.parse_type_param()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "expected ')' after function type parameters")?;
        self.expect(TokenKind::Colon, "expected ':' before return type")?;
        let ret = self.parse_type()?;
        let span = SourceSpan::union(&start_span, &ret.span);
        Ok(TypeExpr {
            span,
            kind: TypeExprKind::Function(FunctionTypeExpr {
                genparams,
                params,
                variadic,
                ret: Box::new(ret),
            }),
        })
    }
}
