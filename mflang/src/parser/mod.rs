//! Recursive-descent parser: token stream → AST

#[cfg(test)]
mod tests;

use crate::ast::*;
use crate::error::{CompileError, Result};
use crate::lexer::Token;

/// Parse a token stream into a program
pub fn parse(tokens: Vec<(Token, Span)>) -> Result<Program> {
    let mut parser = Parser::new(tokens);
    let mut statements = Vec::new();
    while !parser.at_end() {
        statements.push(parser.parse_statement()?);
    }
    Ok(Program { statements })
}

/// Parse a token stream as a single expression (used by string
/// interpolation). Trailing tokens are ignored.
pub fn parse_expression(tokens: Vec<(Token, Span)>) -> Result<Spanned<Expr>> {
    let mut parser = Parser::new(tokens);
    parser.parse_expr()
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    prev_span: Span,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        Parser {
            tokens,
            pos: 0,
            prev_span: Span::new(0, 0),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or(self.prev_span)
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let next = self.tokens.get(self.pos).cloned();
        if let Some((_, span)) = &next {
            self.prev_span = *span;
            self.pos += 1;
        }
        next
    }

    fn err(&self, message: impl Into<String>) -> CompileError {
        CompileError::parser(message, self.current_span())
    }

    fn is(&self, token: &Token) -> bool {
        match self.peek() {
            Some(t) => std::mem::discriminant(t) == std::mem::discriminant(token),
            None => false,
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.is(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<Span> {
        if self.is(&token) {
            Ok(self.advance().expect("token present").1)
        } else {
            let found = self
                .peek()
                .map(|t| format!("{t}"))
                .unwrap_or_else(|| "end of input".to_string());
            Err(self.err(format!("expected '{token}', found '{found}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span)> {
        match self.peek() {
            Some(Token::Ident(_)) => match self.advance() {
                Some((Token::Ident(name), span)) => Ok((name, span)),
                _ => unreachable!(),
            },
            other => {
                let found = other
                    .map(|t| format!("{t}"))
                    .unwrap_or_else(|| "end of input".to_string());
                Err(self.err(format!("expected identifier, found '{found}'")))
            }
        }
    }

    fn eat_semicolon(&mut self) {
        self.eat(&Token::Semicolon);
    }

    // --------------------------------------------------------------
    // Statements
    // --------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Token::Async) => {
                let start = self.current_span();
                self.advance();
                if !self.is(&Token::Intent) {
                    return Err(self.err("expected 'intent' after 'async'"));
                }
                self.advance();
                Ok(Stmt::Intent(self.parse_intent_tail(true, start)?))
            }
            Some(Token::Intent) => {
                let start = self.current_span();
                self.advance();
                Ok(Stmt::Intent(self.parse_intent_tail(false, start)?))
            }
            Some(Token::Var) => Ok(Stmt::Var(self.parse_var_decl()?)),
            Some(Token::Abstract) | Some(Token::Class) => {
                Ok(Stmt::Class(self.parse_class_decl()?))
            }
            Some(Token::Interface) => Ok(Stmt::Interface(self.parse_interface_decl()?)),
            Some(Token::If) => Ok(Stmt::If(self.parse_if()?)),
            Some(Token::While) => Ok(Stmt::While(self.parse_while()?)),
            Some(Token::For) => self.parse_for(),
            Some(Token::Return) => Ok(Stmt::Return(self.parse_return()?)),
            Some(Token::Try) => Ok(Stmt::Try(self.parse_try()?)),
            Some(Token::Throw) => Ok(Stmt::Throw(self.parse_throw()?)),
            Some(Token::Import) => Ok(Stmt::Import(self.parse_import()?)),
            Some(Token::Dataset) => Ok(Stmt::Dataset(self.parse_dataset_op()?)),
            Some(Token::Model) => Ok(Stmt::Model(self.parse_model_op()?)),
            Some(_) => self.parse_expr_or_assign_statement(),
            None => Err(self.err("unexpected end of input")),
        }
    }

    /// Expression statement, or an assignment when the parsed expression is
    /// a valid target followed by `=`.
    fn parse_expr_or_assign_statement(&mut self) -> Result<Stmt> {
        let expr = self.parse_expr()?;
        if self.is(&Token::Assign)
            && matches!(expr.node, Expr::Identifier(_) | Expr::Property { .. })
        {
            self.advance();
            let value = self.parse_expr()?;
            self.eat_semicolon();
            let span = expr.span.merge(value.span);
            return Ok(Stmt::Assign(Assign {
                target: expr,
                value,
                span,
            }));
        }
        self.eat_semicolon();
        Ok(Stmt::Expr(expr))
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let start = self.expect(Token::Var)?;
        let (name, _) = self.expect_ident()?;
        let type_annotation = if self.eat(&Token::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        self.expect(Token::Assign)?;
        let value = self.parse_expr()?;
        self.eat_semicolon();
        let span = start.merge(value.span);
        Ok(VarDecl {
            name,
            type_annotation,
            value,
            span,
        })
    }

    /// Type annotation: `Name` optionally with generic arguments in angle
    /// or square brackets. Rendered back to its canonical string form.
    fn parse_type_annotation(&mut self) -> Result<String> {
        let (base, _) = self.expect_ident()?;
        let (open, close) = if self.is(&Token::Less) {
            (Token::Less, Token::Greater)
        } else if self.is(&Token::LBracket) {
            (Token::LBracket, Token::RBracket)
        } else {
            return Ok(base);
        };
        self.expect(open)?;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type_annotation()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(format!("{base}<{}>", args.join(", ")))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.is(&Token::RParen) {
            loop {
                let (name, _) = self.expect_ident()?;
                let type_annotation = if self.eat(&Token::Colon) {
                    Some(self.parse_type_annotation()?)
                } else {
                    None
                };
                let default = if self.eat(&Token::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                params.push(Param {
                    name,
                    type_annotation,
                    default,
                });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(params)
    }

    /// Intent declaration after the `intent` keyword has been consumed.
    fn parse_intent_tail(&mut self, is_async: bool, start: Span) -> Result<IntentDecl> {
        let (name, _) = self.expect_ident()?;
        let params = self.parse_params()?;
        let return_type = if self.eat(&Token::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let span = start.merge(self.prev_span);
        Ok(IntentDecl {
            name,
            params,
            return_type,
            body,
            is_async,
            span,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        while !self.is(&Token::RBrace) {
            if self.at_end() {
                return Err(self.err("unterminated block, expected '}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.expect(Token::RBrace)?;
        Ok(body)
    }

    fn parse_class_decl(&mut self) -> Result<ClassDecl> {
        let start = self.current_span();
        let is_abstract = self.eat(&Token::Abstract);
        self.expect(Token::Class)?;
        let (name, _) = self.expect_ident()?;

        let mut generic_params = Vec::new();
        if self.eat(&Token::Less) {
            loop {
                let (param, _) = self.expect_ident()?;
                generic_params.push(param);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::Greater)?;
        }

        let extends = if self.eat(&Token::Extends) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };

        let mut implements = Vec::new();
        if self.eat(&Token::Implements) {
            loop {
                implements.push(self.expect_ident()?.0);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while !self.is(&Token::RBrace) {
            if self.at_end() {
                return Err(self.err("unterminated class body, expected '}'"));
            }
            members.push(self.parse_member()?);
        }
        self.expect(Token::RBrace)?;

        Ok(ClassDecl {
            name,
            members,
            extends,
            implements,
            is_abstract,
            generic_params,
            span: start.merge(self.prev_span),
        })
    }

    fn parse_member(&mut self) -> Result<Member> {
        let mut is_static = false;
        let mut is_private = false;
        let mut is_abstract = false;
        let mut is_async = false;
        loop {
            match self.peek() {
                Some(Token::Static) => {
                    is_static = true;
                    self.advance();
                }
                Some(Token::Private) => {
                    is_private = true;
                    self.advance();
                }
                Some(Token::Public) => {
                    self.advance();
                }
                Some(Token::Abstract) => {
                    is_abstract = true;
                    self.advance();
                }
                Some(Token::Async) => {
                    is_async = true;
                    self.advance();
                }
                _ => break,
            }
        }

        if self.is(&Token::Intent) {
            let start = self.current_span();
            self.advance();
            let intent = self.parse_intent_tail(is_async, start)?;
            return Ok(Member::Method(MethodDecl {
                intent,
                is_static,
                is_private,
                is_abstract,
            }));
        }

        // field: `var name: Type = expr;` or `name: Type = expr;`
        self.eat(&Token::Var);
        let start = self.current_span();
        let (name, _) = self.expect_ident()?;
        let type_annotation = if self.eat(&Token::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let value = if self.eat(&Token::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.eat_semicolon();
        Ok(Member::Field(FieldDecl {
            name,
            type_annotation,
            value,
            is_static,
            is_private,
            span: start.merge(self.prev_span),
        }))
    }

    fn parse_interface_decl(&mut self) -> Result<InterfaceDecl> {
        let start = self.expect(Token::Interface)?;
        let (name, _) = self.expect_ident()?;
        self.expect(Token::LBrace)?;

        let mut methods = Vec::new();
        while !self.is(&Token::RBrace) {
            if self.at_end() {
                return Err(self.err("unterminated interface body, expected '}'"));
            }
            let method_start = self.expect(Token::Intent)?;
            let (method_name, _) = self.expect_ident()?;
            let params = self.parse_params()?;
            let return_type = if self.eat(&Token::Colon) {
                Some(self.parse_type_annotation()?)
            } else {
                None
            };
            // tolerate (and discard) an empty body
            if self.is(&Token::LBrace) {
                self.parse_block()?;
            }
            self.eat_semicolon();
            methods.push(MethodSig {
                name: method_name,
                params,
                return_type,
                span: method_start.merge(self.prev_span),
            });
        }
        self.expect(Token::RBrace)?;

        Ok(InterfaceDecl {
            name,
            methods,
            span: start.merge(self.prev_span),
        })
    }

    fn parse_if(&mut self) -> Result<IfStmt> {
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let then_branch = self.parse_branch()?;

        let else_branch = if self.eat(&Token::Else) {
            if self.is(&Token::If) {
                Some(vec![Stmt::If(self.parse_if()?)])
            } else {
                Some(self.parse_branch()?)
            }
        } else {
            None
        };

        Ok(IfStmt {
            condition,
            then_branch,
            else_branch,
        })
    }

    /// A braced block or a single statement
    fn parse_branch(&mut self) -> Result<Vec<Stmt>> {
        if self.is(&Token::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_while(&mut self) -> Result<WhileStmt> {
        self.expect(Token::While)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;
        Ok(WhileStmt { condition, body })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.expect(Token::For)?;
        self.expect(Token::LParen)?;

        // `for (var x in e)` / `for (var x of e)` share a prefix with the
        // traditional form; parse the prefix once and branch on what
        // follows.
        if self.is(&Token::Var) {
            let var_start = self.current_span();
            self.advance();
            let (name, _) = self.expect_ident()?;
            let type_annotation = if self.eat(&Token::Colon) {
                Some(self.parse_type_annotation()?)
            } else {
                None
            };

            if self.eat(&Token::In) {
                let iterable = self.parse_expr()?;
                self.expect(Token::RParen)?;
                let body = self.parse_block()?;
                return Ok(Stmt::ForIn(ForInStmt {
                    variable: name,
                    type_annotation,
                    iterable,
                    body,
                }));
            }
            if self.eat(&Token::Of) {
                let iterable = self.parse_expr()?;
                self.expect(Token::RParen)?;
                let body = self.parse_block()?;
                return Ok(Stmt::ForOf(ForOfStmt {
                    variable: name,
                    type_annotation,
                    iterable,
                    body,
                }));
            }

            // traditional for with a var-declaration initializer
            self.expect(Token::Assign)?;
            let value = self.parse_expr()?;
            let init = Stmt::Var(VarDecl {
                name,
                type_annotation,
                value: value.clone(),
                span: var_start.merge(value.span),
            });
            self.expect(Token::Semicolon)?;
            return self.parse_for_tail(Some(Box::new(init)));
        }

        let init = if self.is(&Token::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_expr_or_assign_clause()?))
        };
        self.expect(Token::Semicolon)?;
        self.parse_for_tail(init)
    }

    fn parse_for_tail(&mut self, init: Option<Box<Stmt>>) -> Result<Stmt> {
        let condition = if self.is(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon)?;

        let update = if self.is(&Token::RParen) {
            None
        } else {
            Some(Box::new(self.parse_expr_or_assign_clause()?))
        };
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;

        Ok(Stmt::For(ForStmt {
            init,
            condition,
            update,
            body,
        }))
    }

    /// An expression or assignment inside a for-clause, without consuming
    /// the clause separator.
    fn parse_expr_or_assign_clause(&mut self) -> Result<Stmt> {
        let expr = self.parse_expr()?;
        if self.is(&Token::Assign)
            && matches!(expr.node, Expr::Identifier(_) | Expr::Property { .. })
        {
            self.advance();
            let value = self.parse_expr()?;
            let span = expr.span.merge(value.span);
            return Ok(Stmt::Assign(Assign {
                target: expr,
                value,
                span,
            }));
        }
        Ok(Stmt::Expr(expr))
    }

    fn parse_return(&mut self) -> Result<ReturnStmt> {
        let start = self.expect(Token::Return)?;
        let value = match self.peek() {
            Some(Token::Semicolon) | Some(Token::RBrace) | None => None,
            _ => Some(self.parse_expr()?),
        };
        self.eat_semicolon();
        Ok(ReturnStmt {
            value,
            span: start.merge(self.prev_span),
        })
    }

    fn parse_try(&mut self) -> Result<TryStmt> {
        let start = self.expect(Token::Try)?;
        let try_block = self.parse_block()?;

        let mut catch_clauses = Vec::new();
        while self.is(&Token::Catch) {
            catch_clauses.push(self.parse_catch_clause()?);
        }

        let finally_block = if self.eat(&Token::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if catch_clauses.is_empty() && finally_block.is_none() {
            return Err(self.err("'try' requires at least one 'catch' or a 'finally'"));
        }

        Ok(TryStmt {
            try_block,
            catch_clauses,
            finally_block,
            span: start.merge(self.prev_span),
        })
    }

    /// `catch (Type name)`, `catch (Type)`, `catch (name)` or `catch ()`.
    /// A single identifier is the bound variable; a dotted name is a type.
    fn parse_catch_clause(&mut self) -> Result<CatchClause> {
        let start = self.expect(Token::Catch)?;
        self.expect(Token::LParen)?;

        let mut exception_type = None;
        let mut exception_var = None;
        if !self.is(&Token::RParen) {
            let (first, _) = self.expect_ident()?;
            let mut parts = vec![first];
            while self.eat(&Token::Dot) {
                parts.push(self.expect_ident()?.0);
            }
            if self.is(&Token::Ident(String::new())) {
                exception_type = Some(parts.join("."));
                exception_var = Some(self.expect_ident()?.0);
            } else if parts.len() == 1 {
                exception_var = Some(parts.remove(0));
            } else {
                exception_type = Some(parts.join("."));
            }
        }
        self.expect(Token::RParen)?;
        let body = self.parse_block()?;

        Ok(CatchClause {
            exception_type,
            exception_var,
            body,
            span: start.merge(self.prev_span),
        })
    }

    fn parse_throw(&mut self) -> Result<ThrowStmt> {
        let start = self.expect(Token::Throw)?;
        let expression = match self.peek() {
            Some(Token::Semicolon) | Some(Token::RBrace) | Some(Token::Catch)
            | Some(Token::Finally) | None => None,
            _ => Some(self.parse_expr()?),
        };
        self.eat_semicolon();
        Ok(ThrowStmt {
            expression,
            span: start.merge(self.prev_span),
        })
    }

    fn parse_import(&mut self) -> Result<ImportDecl> {
        let start = self.expect(Token::Import)?;
        let mut parts = vec![self.expect_ident()?.0];
        while self.eat(&Token::Dot) {
            parts.push(self.expect_ident()?.0);
        }
        self.eat_semicolon();
        Ok(ImportDecl {
            name: parts.join("."),
            span: start.merge(self.prev_span),
        })
    }

    /// `key = value` parameter list shared by dataset and model statements;
    /// a bare string is recorded as the `source` parameter.
    fn parse_op_params(&mut self) -> Result<Vec<(String, String)>> {
        let mut params = Vec::new();
        if !self.eat(&Token::LParen) {
            return Ok(params);
        }
        while !self.is(&Token::RParen) {
            match self.peek().cloned() {
                Some(Token::StringLit(value)) => {
                    self.advance();
                    params.push(("source".to_string(), value));
                }
                Some(Token::Ident(key)) => {
                    self.advance();
                    if self.eat(&Token::Assign) {
                        let value = match self.advance() {
                            Some((Token::StringLit(s), _)) => s,
                            Some((Token::IntLit(n), _)) => n.to_string(),
                            Some((Token::FloatLit(f), _)) => f.to_string(),
                            Some((Token::Ident(name), _)) => name,
                            _ => return Err(self.err("expected a parameter value")),
                        };
                        params.push((key, value));
                    }
                }
                Some(Token::Dataset) => {
                    self.advance();
                    if self.eat(&Token::Assign) {
                        let value = match self.advance() {
                            Some((Token::StringLit(s), _)) => s,
                            Some((Token::Ident(name), _)) => name,
                            _ => return Err(self.err("expected a parameter value")),
                        };
                        params.push(("dataset".to_string(), value));
                    }
                }
                _ => return Err(self.err("expected a parameter")),
            }
            self.eat(&Token::Comma);
        }
        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn parse_dataset_op(&mut self) -> Result<DatasetOp> {
        let start = self.expect(Token::Dataset)?;
        let (operation, _) = self.expect_ident()?;
        let (target, _) = self.expect_ident()?;
        let params = self.parse_op_params()?;
        self.eat_semicolon();
        Ok(DatasetOp {
            operation,
            target,
            params,
            span: start.merge(self.prev_span),
        })
    }

    fn parse_model_op(&mut self) -> Result<ModelOp> {
        let start = self.expect(Token::Model)?;
        let (operation, _) = self.expect_ident()?;
        let model_name = match self.peek() {
            Some(Token::Ident(_)) => self.expect_ident()?.0,
            _ => String::new(),
        };
        let params = self.parse_op_params()?;
        self.eat_semicolon();
        Ok(ModelOp {
            operation,
            model_name,
            params,
            span: start.merge(self.prev_span),
        })
    }

    // --------------------------------------------------------------
    // Expressions
    // --------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Spanned<Expr>> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            let span = left.span.merge(right.span);
            left = Expr::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            }
            .spanned(span);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            let span = left.span.merge(right.span);
            left = Expr::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            }
            .spanned(span);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            let span = left.span.merge(right.span);
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }
            .spanned(span);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => BinOp::Lt,
                Some(Token::Greater) => BinOp::Gt,
                Some(Token::LessEq) => BinOp::Le,
                Some(Token::GreaterEq) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            let span = left.span.merge(right.span);
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }
            .spanned(span);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            let span = left.span.merge(right.span);
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }
            .spanned(span);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Spanned<Expr>> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            let span = left.span.merge(right.span);
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }
            .spanned(span);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Spanned<Expr>> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnOp::Neg),
            Some(Token::Not) | Some(Token::Bang) => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            }
            .spanned(span));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Spanned<Expr>> {
        let mut node = self.parse_primary()?;
        loop {
            if self.is(&Token::LParen) {
                self.advance();
                let args = self.parse_args()?;
                let span = node.span.merge(self.prev_span);
                node = Expr::Call {
                    callee: Box::new(node),
                    args,
                }
                .spanned(span);
                continue;
            }
            if self.eat(&Token::Dot) {
                let (name, name_span) = self.expect_ident()?;
                let span = node.span.merge(name_span);
                node = Expr::Property {
                    object: Box::new(node),
                    name,
                }
                .spanned(span);
                continue;
            }
            if self.is(&Token::LBracket) {
                self.advance();
                let index = self.parse_expr()?;
                self.expect(Token::RBracket)?;
                let span = node.span.merge(self.prev_span);
                node = Expr::Index {
                    object: Box::new(node),
                    index: Box::new(index),
                }
                .spanned(span);
                continue;
            }
            break;
        }
        Ok(node)
    }

    /// Call arguments up to and including the closing parenthesis
    fn parse_args(&mut self) -> Result<Vec<Spanned<Expr>>> {
        let mut args = Vec::new();
        while !self.is(&Token::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Spanned<Expr>> {
        let span = self.current_span();
        match self.peek().cloned() {
            Some(Token::IntLit(n)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Int(n)).spanned(span))
            }
            Some(Token::FloatLit(f)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Float(f)).spanned(span))
            }
            Some(Token::StringLit(s)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)).spanned(span))
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)).spanned(span))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)).spanned(span))
            }
            Some(Token::Null) => {
                self.advance();
                Ok(Expr::Null.spanned(span))
            }
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(Expr::Identifier(name).spanned(span))
            }
            Some(Token::Fn) => self.parse_lambda(),
            Some(Token::New) => {
                self.advance();
                let (class_name, _) = self.expect_ident()?;
                let args = if self.is(&Token::LParen) {
                    self.advance();
                    self.parse_args()?
                } else {
                    Vec::new()
                };
                let full = span.merge(self.prev_span);
                Ok(Expr::New { class_name, args }.spanned(full))
            }
            Some(Token::This) => {
                self.advance();
                Ok(Expr::This.spanned(span))
            }
            Some(Token::Super) => {
                self.advance();
                Ok(Expr::Super.spanned(span))
            }
            Some(Token::Await) => {
                self.advance();
                let inner = self.parse_expr()?;
                let full = span.merge(inner.span);
                Ok(Expr::Await(Box::new(inner)).spanned(full))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBrace) => self.parse_object_literal(),
            Some(Token::LBracket) => {
                self.advance();
                let mut items = Vec::new();
                while !self.is(&Token::RBracket) {
                    items.push(self.parse_expr()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                self.expect(Token::RBracket)?;
                let full = span.merge(self.prev_span);
                Ok(Expr::Array(items).spanned(full))
            }
            other => {
                let found = other
                    .map(|t| format!("{t}"))
                    .unwrap_or_else(|| "end of input".to_string());
                Err(self.err(format!("unexpected token '{found}' in expression")))
            }
        }
    }

    /// `fn (params) (: Type)? { body }`
    fn parse_lambda(&mut self) -> Result<Spanned<Expr>> {
        let start = self.expect(Token::Fn)?;
        let params = self.parse_params()?;
        let return_type = if self.eat(&Token::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let span = start.merge(self.prev_span);
        Ok(Expr::Lambda(Box::new(IntentDecl {
            name: "<lambda>".to_string(),
            params,
            return_type,
            body,
            is_async: false,
            span,
        }))
        .spanned(span))
    }

    /// `{ key: expr, ... }` with identifier or string keys
    fn parse_object_literal(&mut self) -> Result<Spanned<Expr>> {
        let start = self.expect(Token::LBrace)?;
        let mut entries = Vec::new();
        while !self.is(&Token::RBrace) {
            let key = match self.advance() {
                Some((Token::Ident(name), _)) => name,
                Some((Token::StringLit(s), _)) => s,
                _ => return Err(self.err("expected an object key (identifier or string)")),
            };
            self.expect(Token::Colon)?;
            let value = self.parse_expr()?;
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        let span = start.merge(self.prev_span);
        Ok(Expr::Object(entries).spanned(span))
    }
}
