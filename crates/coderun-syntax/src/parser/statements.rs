use super::{ParseResult, Parser};
use crate::ast::*;
use crate::error::{Span, SyntaxError};
use crate::lexer::Token;
use smallvec::{SmallVec, smallvec};

/// Nodes produced by one logical line. Almost always a single statement.
pub(crate) type Statements = SmallVec<[NodeId; 2]>;

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> ParseResult<Statements> {
        let id = match self.peek() {
            Some(Token::Def) => self.parse_def()?,
            Some(Token::If) => self.parse_if()?,
            Some(Token::While) => self.parse_while()?,
            Some(Token::For) => self.parse_for()?,
            _ => return self.parse_simple_statements(),
        };
        Ok(smallvec![id])
    }

    /// `small_stmt (';' small_stmt)* [';'] NEWLINE`
    pub(super) fn parse_simple_statements(&mut self) -> ParseResult<Statements> {
        let mut out = Statements::new();

        loop {
            out.push(self.parse_small_statement()?);
            if !self.eat(&Token::Semicolon) {
                break;
            }
            if matches!(self.peek(), None | Some(Token::Newline)) {
                break;
            }
        }

        match self.peek() {
            Some(Token::Newline) => {
                self.advance();
            }
            None => {}
            Some(_) => return Err(SyntaxError::bare(self.peek_span())),
        }

        Ok(out)
    }

    fn parse_small_statement(&mut self) -> ParseResult<NodeId> {
        let Some(start) = self.peek_span() else {
            return Err(self.unexpected("expected a statement"));
        };

        match self.peek() {
            Some(Token::Pass) => {
                self.advance();
                Ok(self.push(NodeKind::Pass, start))
            }
            Some(Token::Break) => {
                self.advance();
                Ok(self.push(NodeKind::Break, start))
            }
            Some(Token::Continue) => {
                self.advance();
                Ok(self.push(NodeKind::Continue, start))
            }
            Some(Token::Return) => {
                self.advance();
                let (value, span) = if self.at_statement_end() {
                    (None, start)
                } else {
                    let value = self.parse_testlist()?;
                    (Some(value), start.merge(&self.span_of(value)))
                };
                Ok(self.push(NodeKind::Return { value }, span))
            }
            Some(Token::Global) => {
                self.advance();
                let mut names = Vec::new();
                let mut span = start;
                loop {
                    let (name, name_span) = self.expect_identifier()?;
                    names.push(name);
                    span = span.merge(&name_span);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
                Ok(self.push(NodeKind::Global { names }, span))
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> ParseResult<NodeId> {
        let first = self.parse_testlist()?;

        if let Some(op) = self.peek().and_then(aug_assign_op) {
            let op_span = self.peek_span();
            if !matches!(
                self.kind_of(first),
                NodeKind::Name { .. } | NodeKind::Subscript { .. } | NodeKind::Attribute { .. }
            ) {
                return Err(SyntaxError::invalid(
                    format!(
                        "'{}' is an illegal expression for augmented assignment",
                        self.kind_of(first).describe()
                    ),
                    op_span,
                ));
            }
            self.advance();
            let value = self.parse_testlist()?;
            let span = self.span_of(first).merge(&self.span_of(value));
            return Ok(self.push(NodeKind::AugAssign { target: first, op, value }, span));
        }

        if self.peek() != Some(&Token::Assign) {
            let span = self.span_of(first);
            return Ok(self.push(NodeKind::Expr { value: first }, span));
        }

        // `a = b = value`: every expression but the last is a target.
        let mut chain: SmallVec<[NodeId; 4]> = smallvec![first];
        while self.eat(&Token::Assign) {
            chain.push(self.parse_testlist()?);
        }

        let Some(value) = chain.pop() else {
            return Err(SyntaxError::bare(self.peek_span()));
        };
        for &target in &chain {
            self.check_target(target)?;
        }

        let span = self.span_of(first).merge(&self.span_of(value));
        Ok(self.push(
            NodeKind::Assign {
                targets: chain.into_vec(),
                value,
            },
            span,
        ))
    }

    /// Rejects anything that cannot appear on the left of `=`.
    pub(super) fn check_target(&self, id: NodeId) -> ParseResult<()> {
        match self.kind_of(id) {
            NodeKind::Name { .. } | NodeKind::Subscript { .. } | NodeKind::Attribute { .. } => Ok(()),
            NodeKind::Tuple { elts } | NodeKind::List { elts } => {
                elts.iter().try_for_each(|&elt| self.check_target(elt))
            }
            other => Err(SyntaxError::invalid(
                format!("cannot assign to {}", other.describe()),
                Some(self.span_of(id)),
            )),
        }
    }

    fn parse_def(&mut self) -> ParseResult<NodeId> {
        let start = self.expect(Token::Def)?;
        let (name, _) = self.expect_identifier()?;

        self.expect(Token::LeftParen)?;
        let mut params: Vec<String> = Vec::new();
        while self.peek() != Some(&Token::RightParen) {
            let (param, span) = self.expect_identifier()?;
            if params.contains(&param) {
                return Err(SyntaxError::invalid(
                    format!("duplicate argument '{}' in function definition", param),
                    Some(span),
                ));
            }
            params.push(param);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RightParen)?;

        let (body, end) = self.parse_block()?;
        Ok(self.push(NodeKind::FunctionDef { name, params, body }, start.merge(&end)))
    }

    /// `if` with its `elif` branches. The branches are read in a loop and
    /// nested afterwards: each `elif` becomes the lone `orelse` statement of
    /// the branch before it.
    fn parse_if(&mut self) -> ParseResult<NodeId> {
        let mut branches = Vec::new();
        let mut end;
        loop {
            let start = self.advance().map(|t| t.span).unwrap_or_default();
            let test = self.parse_named_expr()?;
            let (body, body_end) = self.parse_block()?;
            end = body_end;
            branches.push((start, test, body));
            if self.peek() != Some(&Token::Elif) {
                break;
            }
        }

        let mut orelse = Vec::new();
        if self.eat(&Token::Else) {
            let (else_body, else_end) = self.parse_block()?;
            end = else_end;
            orelse = else_body;
        }

        let mut node = None;
        for (start, test, body) in branches.into_iter().rev() {
            let id = self.push(NodeKind::If { test, body, orelse }, start.merge(&end));
            orelse = vec![id];
            node = Some(id);
        }
        node.ok_or_else(|| SyntaxError::bare(self.peek_span()))
    }

    fn parse_while(&mut self) -> ParseResult<NodeId> {
        let start = self.expect(Token::While)?;
        let test = self.parse_named_expr()?;
        let (body, end) = self.parse_block()?;
        Ok(self.push(NodeKind::While { test, body }, start.merge(&end)))
    }

    fn parse_for(&mut self) -> ParseResult<NodeId> {
        let start = self.expect(Token::For)?;
        let target = self.parse_target_list()?;
        self.check_target(target)?;
        self.expect(Token::In)?;
        let iter = self.parse_testlist()?;
        let (body, end) = self.parse_block()?;
        Ok(self.push(NodeKind::For { target, iter, body }, start.merge(&end)))
    }

    /// `':' (simple_stmts | NEWLINE INDENT stmt+ DEDENT)`
    ///
    /// Returns the statements and the span of the last one.
    fn parse_block(&mut self) -> ParseResult<(Vec<NodeId>, Span)> {
        self.expect(Token::Colon)?;
        self.descend("blocks")?;
        let block = self.parse_block_body();
        self.ascend();
        block
    }

    fn parse_block_body(&mut self) -> ParseResult<(Vec<NodeId>, Span)> {
        let body: Vec<NodeId> = if self.eat(&Token::Newline) {
            if self.peek() != Some(&Token::Indent) {
                return Err(self.unexpected("expected an indented block"));
            }
            self.advance();

            let mut body = Vec::new();
            loop {
                match self.peek() {
                    Some(Token::Dedent) => {
                        self.advance();
                        break;
                    }
                    Some(Token::Newline) => {
                        self.advance();
                    }
                    None => return Err(self.unexpected("expected a dedent")),
                    Some(_) => body.extend(self.parse_statement()?),
                }
            }
            body
        } else {
            self.parse_simple_statements()?.into_vec()
        };

        let end = body.last().map(|&id| self.span_of(id)).unwrap_or_default();
        Ok((body, end))
    }

    pub(super) fn expect_identifier(&mut self) -> ParseResult<(String, Span)> {
        match self.peek() {
            Some(Token::Identifier(_)) => match self.advance() {
                Some(st) => match st.token {
                    Token::Identifier(name) => Ok((name, st.span)),
                    _ => Err(SyntaxError::bare(Some(st.span))),
                },
                None => Err(self.unexpected("expected identifier")),
            },
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    pub(super) fn at_statement_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Newline) | Some(Token::Semicolon))
    }
}

fn aug_assign_op(token: &Token) -> Option<BinaryOp> {
    let op = match token {
        Token::PlusAssign => BinaryOp::Add,
        Token::MinusAssign => BinaryOp::Sub,
        Token::StarAssign => BinaryOp::Mul,
        Token::SlashAssign => BinaryOp::Div,
        Token::DoubleSlashAssign => BinaryOp::FloorDiv,
        Token::PercentAssign => BinaryOp::Mod,
        Token::DoubleStarAssign => BinaryOp::Pow,
        _ => return None,
    };
    Some(op)
}
