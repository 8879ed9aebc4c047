//! Recursive-descent parser over the token stream.

use pfx_ir::{BinaryOp, Literal, Qualifiers, Span, UnaryOp};

use crate::ParseError;
use crate::ast::{
    Annotation, ArraySuffix, Attribute, Expr, FunctionDef, Item, SourceUnit, Stmt, StructDef,
    TypeName, VarDef,
};
use crate::token::Token;

pub(crate) struct Parser<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(tokens: &'a [(Token, Span)]) -> Self {
        Self { tokens, pos: 0 }
    }

    // -----------------------------------------------------------------------
    // Cursor helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1).map(|(t, _)| t)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    /// Span of the token under the cursor, or of the last token at the end.
    fn here(&self) -> Span {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some((_, span)) => *span,
            None => Span::NONE,
        }
    }

    /// Span of the most recently consumed token.
    fn behind(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some((_, span)) => *span,
            None => Span::NONE,
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expected(&self, what: impl std::fmt::Display) -> ParseError {
        match self.tokens.get(self.pos) {
            Some((token, span)) => ParseError::Unexpected {
                message: format!("expected {what}, found {token}"),
                span: *span,
            },
            None => ParseError::Unexpected {
                message: format!("expected {what}, found end of input"),
                span: self.here(),
            },
        }
    }

    fn expect(&mut self, token: Token) -> Result<Span, ParseError> {
        if self.peek() == Some(&token) {
            self.bump();
            Ok(self.behind())
        } else {
            Err(self.expected(token))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        match self.tokens.get(self.pos) {
            Some((Token::Ident(name), span)) => {
                let out = (name.clone(), *span);
                self.bump();
                Ok(out)
            }
            _ => Err(self.expected("an identifier")),
        }
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    pub(crate) fn source_unit(&mut self) -> Result<SourceUnit, ParseError> {
        let mut items = Vec::new();
        while !self.at_end() {
            items.push(self.item()?);
        }
        Ok(SourceUnit { items })
    }

    fn item(&mut self) -> Result<Item, ParseError> {
        if matches!(self.peek(), Some(Token::LBracket)) {
            let attr = self.attribute()?;
            let start = attr.span;
            let result = self.type_name()?;
            let (name, _) = self.expect_ident()?;
            return Ok(Item::Function(self.function_tail(
                Some(attr),
                result,
                name,
                start,
            )?));
        }
        if matches!(self.peek(), Some(Token::Struct)) {
            return Ok(Item::Struct(self.struct_def()?));
        }

        let start = self.here();
        let quals = self.qualifiers();
        let ty = self.type_name()?;
        let (name, _) = self.expect_ident()?;
        if matches!(self.peek(), Some(Token::LParen)) {
            if !quals.is_empty() {
                return Err(ParseError::Unexpected {
                    message: "qualifiers are not allowed on a function".into(),
                    span: start,
                });
            }
            return Ok(Item::Function(self.function_tail(None, ty, name, start)?));
        }
        let vars = self.declarator_group(quals, ty, name, start, true)?;
        Ok(Item::Vars(vars))
    }

    fn attribute(&mut self) -> Result<Attribute, ParseError> {
        let open = self.expect(Token::LBracket)?;
        let (name, _) = self.expect_ident()?;
        let close = self.expect(Token::RBracket)?;
        Ok(Attribute {
            name,
            span: open.merge(close),
        })
    }

    fn qualifiers(&mut self) -> Qualifiers {
        let mut quals = Qualifiers::NONE;
        loop {
            match self.peek() {
                Some(Token::Uniform) => quals |= Qualifiers::UNIFORM,
                Some(Token::Const) => quals |= Qualifiers::CONST,
                Some(Token::In) => quals |= Qualifiers::IN,
                Some(Token::Out) => quals |= Qualifiers::OUT,
                Some(Token::Inout) => {
                    quals |= Qualifiers::IN | Qualifiers::OUT | Qualifiers::INOUT
                }
                _ => return quals,
            }
            self.bump();
        }
    }

    fn type_name(&mut self) -> Result<TypeName, ParseError> {
        let (name, span) = self.expect_ident()?;
        Ok(TypeName { name, span })
    }

    fn array_suffix(&mut self) -> Result<Option<ArraySuffix>, ParseError> {
        if !matches!(self.peek(), Some(Token::LBracket)) {
            return Ok(None);
        }
        let open = self.expect(Token::LBracket)?;
        let len = if matches!(self.peek(), Some(Token::RBracket)) {
            None
        } else {
            Some(self.expr()?)
        };
        let close = self.expect(Token::RBracket)?;
        Ok(Some(ArraySuffix {
            len,
            span: open.merge(close),
        }))
    }

    /// Parses the rest of `quals ty name ...` declarators up to the `;`.
    fn declarator_group(
        &mut self,
        quals: Qualifiers,
        ty: TypeName,
        first_name: String,
        start: Span,
        allow_annotation: bool,
    ) -> Result<Vec<VarDef>, ParseError> {
        let mut vars = Vec::new();
        let mut name = first_name;
        let mut decl_start = start;
        loop {
            let array = self.array_suffix()?;
            let annotation = if allow_annotation && matches!(self.peek(), Some(Token::Lt)) {
                Some(self.annotation()?)
            } else {
                None
            };
            let init = if self.eat(&Token::Eq) {
                Some(self.expr()?)
            } else {
                None
            };
            vars.push(VarDef {
                quals,
                ty: ty.clone(),
                name,
                array,
                annotation,
                init,
                span: decl_start.merge(self.behind()),
            });
            if self.eat(&Token::Comma) {
                let (next, next_span) = self.expect_ident()?;
                name = next;
                decl_start = next_span;
            } else {
                break;
            }
        }
        self.expect(Token::Semicolon)?;
        Ok(vars)
    }

    fn annotation(&mut self) -> Result<Annotation, ParseError> {
        let open = self.expect(Token::Lt)?;
        let mut entries = Vec::new();
        while !matches!(self.peek(), Some(Token::Gt)) {
            let ty = self.type_name()?;
            let (name, name_span) = self.expect_ident()?;
            let init = if self.eat(&Token::Eq) {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect(Token::Semicolon)?;
            entries.push(VarDef {
                quals: Qualifiers::NONE,
                ty,
                name,
                array: None,
                annotation: None,
                init,
                span: name_span.merge(self.behind()),
            });
        }
        let close = self.expect(Token::Gt)?;
        Ok(Annotation {
            entries,
            span: open.merge(close),
        })
    }

    fn struct_def(&mut self) -> Result<StructDef, ParseError> {
        let start = self.expect(Token::Struct)?;
        let (name, _) = self.expect_ident()?;
        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while !matches!(self.peek(), Some(Token::RBrace)) {
            let ty = self.type_name()?;
            let (member_name, member_span) = self.expect_ident()?;
            let array = self.array_suffix()?;
            self.expect(Token::Semicolon)?;
            members.push(VarDef {
                quals: Qualifiers::NONE,
                ty,
                name: member_name,
                array,
                annotation: None,
                init: None,
                span: member_span.merge(self.behind()),
            });
        }
        self.expect(Token::RBrace)?;
        let end = self.expect(Token::Semicolon)?;
        Ok(StructDef {
            name,
            members,
            span: start.merge(end),
        })
    }

    fn function_tail(
        &mut self,
        attr: Option<Attribute>,
        result: TypeName,
        name: String,
        start: Span,
    ) -> Result<FunctionDef, ParseError> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            loop {
                params.push(self.param()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        let body = if self.eat(&Token::Semicolon) {
            None
        } else {
            let (body, _) = self.block()?;
            Some(body)
        };
        Ok(FunctionDef {
            attr,
            result,
            name,
            params,
            body,
            span: start.merge(self.behind()),
        })
    }

    fn param(&mut self) -> Result<VarDef, ParseError> {
        let start = self.here();
        let quals = self.qualifiers();
        let ty = self.type_name()?;
        let (name, _) = self.expect_ident()?;
        let array = self.array_suffix()?;
        Ok(VarDef {
            quals,
            ty,
            name,
            array,
            annotation: None,
            init: None,
            span: start.merge(self.behind()),
        })
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn block(&mut self) -> Result<(Vec<Stmt>, Span), ParseError> {
        let open = self.expect(Token::LBrace)?;
        let mut body = Vec::new();
        while !matches!(self.peek(), Some(Token::RBrace)) {
            if self.at_end() {
                return Err(self.expected("`}`"));
            }
            body.push(self.stmt()?);
        }
        let close = self.expect(Token::RBrace)?;
        Ok((body, open.merge(close)))
    }

    /// A brace block, or a single statement treated as one.
    fn dependent(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if matches!(self.peek(), Some(Token::LBrace)) {
            Ok(self.block()?.0)
        } else {
            Ok(vec![self.stmt()?])
        }
    }

    fn starts_decl(&self) -> bool {
        match self.peek() {
            Some(Token::Const) => true,
            Some(Token::Ident(_)) => matches!(self.peek2(), Some(Token::Ident(_))),
            _ => false,
        }
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::Return) => {
                let start = self.expect(Token::Return)?;
                let value = if matches!(self.peek(), Some(Token::Semicolon)) {
                    None
                } else {
                    Some(self.expr()?)
                };
                let end = self.expect(Token::Semicolon)?;
                Ok(Stmt::Return {
                    value,
                    span: start.merge(end),
                })
            }
            Some(Token::If) => self.if_stmt(),
            Some(Token::While) => {
                let start = self.expect(Token::While)?;
                self.expect(Token::LParen)?;
                let cond = self.expr()?;
                self.expect(Token::RParen)?;
                let body = self.dependent()?;
                Ok(Stmt::While {
                    cond,
                    body,
                    span: start.merge(self.behind()),
                })
            }
            Some(Token::For) => self.for_stmt(),
            Some(Token::LBrace) => {
                let (body, span) = self.block()?;
                Ok(Stmt::Block { body, span })
            }
            _ if self.starts_decl() => self.decl_stmt(),
            _ => {
                let stmt = self.assign_or_expr()?;
                self.expect(Token::Semicolon)?;
                Ok(stmt)
            }
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let cond = self.expr()?;
        self.expect(Token::RParen)?;
        let accept = self.dependent()?;
        let reject = if self.eat(&Token::Else) {
            self.dependent()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            accept,
            reject,
            span: start.merge(self.behind()),
        })
    }

    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.expect(Token::For)?;
        self.expect(Token::LParen)?;
        let init = if self.eat(&Token::Semicolon) {
            None
        } else if self.starts_decl() {
            Some(Box::new(self.decl_stmt()?))
        } else {
            let stmt = self.assign_or_expr()?;
            self.expect(Token::Semicolon)?;
            Some(Box::new(stmt))
        };
        let cond = if matches!(self.peek(), Some(Token::Semicolon)) {
            None
        } else {
            Some(self.expr()?)
        };
        self.expect(Token::Semicolon)?;
        let step = if matches!(self.peek(), Some(Token::RParen)) {
            None
        } else {
            Some(Box::new(self.assign_or_expr()?))
        };
        self.expect(Token::RParen)?;
        let body = self.dependent()?;
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
            span: start.merge(self.behind()),
        })
    }

    fn decl_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.here();
        let quals = self.qualifiers();
        let ty = self.type_name()?;
        let (name, _) = self.expect_ident()?;
        let vars = self.declarator_group(quals, ty, name, start, false)?;
        Ok(Stmt::Decl {
            vars,
            span: start.merge(self.behind()),
        })
    }

    /// An expression statement or assignment, without the trailing `;`.
    fn assign_or_expr(&mut self) -> Result<Stmt, ParseError> {
        let target = self.expr()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Assign,
            Some(Token::PlusEq) => BinaryOp::AddAssign,
            Some(Token::MinusEq) => BinaryOp::SubAssign,
            Some(Token::StarEq) => BinaryOp::MulAssign,
            Some(Token::SlashEq) => BinaryOp::DivAssign,
            Some(Token::PercentEq) => BinaryOp::ModAssign,
            _ => return Ok(Stmt::Expr(target)),
        };
        self.bump();
        let value = self.expr()?;
        let span = target.span().merge(value.span());
        Ok(Stmt::Assign {
            op,
            target,
            value,
            span,
        })
    }

    // -----------------------------------------------------------------------
    // Expressions, precedence climbing
    // -----------------------------------------------------------------------

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.logical_or()
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let span = left.span().merge(right.span());
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span,
        }
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.logical_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.logical_and()?;
            left = Self::binary(BinaryOp::LogicalOr, left, right);
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.equality()?;
            left = Self::binary(BinaryOp::LogicalAnd, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Equal,
                Some(Token::NotEq) => BinaryOp::NotEqual,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.relational()?;
            left = Self::binary(op, left, right);
        }
    }

    fn relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Less,
                Some(Token::Le) => BinaryOp::LessEqual,
                Some(Token::Gt) => BinaryOp::Greater,
                Some(Token::Ge) => BinaryOp::GreaterEqual,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.additive()?;
            left = Self::binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.multiplicative()?;
            left = Self::binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.bump();
            let right = self.unary()?;
            left = Self::binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Negate,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Not) => UnaryOp::LogicalNot,
            _ => return self.postfix(),
        };
        let start = self.here();
        self.bump();
        let expr = self.unary()?;
        let span = start.merge(expr.span());
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            span,
        })
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.bump();
                    let (name, name_span) = self.expect_ident()?;
                    let span = expr.span().merge(name_span);
                    expr = Expr::Member {
                        base: Box::new(expr),
                        name,
                        span,
                    };
                }
                Some(Token::LBracket) => {
                    self.bump();
                    let index = self.expr()?;
                    let close = self.expect(Token::RBracket)?;
                    let span = expr.span().merge(close);
                    expr = Expr::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.here();
        match self.peek().cloned() {
            Some(Token::Int(value)) => {
                self.bump();
                Ok(Expr::Literal {
                    value: Literal::Int(value),
                    span,
                })
            }
            Some(Token::Float(value)) => {
                self.bump();
                Ok(Expr::Literal {
                    value: Literal::Float(value),
                    span,
                })
            }
            Some(Token::True) => {
                self.bump();
                Ok(Expr::Literal {
                    value: Literal::Bool(true),
                    span,
                })
            }
            Some(Token::False) => {
                self.bump();
                Ok(Expr::Literal {
                    value: Literal::Bool(false),
                    span,
                })
            }
            Some(Token::Str(value)) => {
                self.bump();
                Ok(Expr::Literal {
                    value: Literal::Str(value),
                    span,
                })
            }
            Some(Token::LParen) => {
                self.bump();
                let expr = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => {
                self.bump();
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !matches!(self.peek(), Some(Token::RParen)) {
                        loop {
                            args.push(self.expr()?);
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    let close = self.expect(Token::RParen)?;
                    Ok(Expr::Call {
                        name,
                        args,
                        span: span.merge(close),
                    })
                } else {
                    Ok(Expr::Ident { name, span })
                }
            }
            _ => Err(self.expected("an expression")),
        }
    }
}
