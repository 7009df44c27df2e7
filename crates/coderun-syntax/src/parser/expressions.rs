use super::{ParseResult, Parser};
use crate::ast::*;
use crate::error::SyntaxError;
use crate::lexer::Token;

impl Parser {
    /// `test (',' test)* [',']`; more than one element builds a tuple.
    pub(crate) fn parse_testlist(&mut self) -> ParseResult<NodeId> {
        let first = self.parse_test()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.eat(&Token::Comma) {
            if !self.at_expression_start() {
                break;
            }
            elts.push(self.parse_test()?);
        }

        let span = self.span_of(first).merge(&self.span_of(elts[elts.len() - 1]));
        Ok(self.push(NodeKind::Tuple { elts }, span))
    }

    /// Loop targets stop before `in`, so comparisons are not parsed here.
    pub(super) fn parse_target_list(&mut self) -> ParseResult<NodeId> {
        let first = self.parse_sum()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.eat(&Token::Comma) {
            if self.peek() == Some(&Token::In) {
                break;
            }
            elts.push(self.parse_sum()?);
        }

        let span = self.span_of(first).merge(&self.span_of(elts[elts.len() - 1]));
        Ok(self.push(NodeKind::Tuple { elts }, span))
    }

    /// `NAME ':=' test | test`
    pub(crate) fn parse_named_expr(&mut self) -> ParseResult<NodeId> {
        if let (Some(Token::Identifier(name)), Some(Token::Walrus)) = (self.peek(), self.peek_nth(1)) {
            let target = name.clone();
            let start = self.peek_span().unwrap_or_default();
            self.advance();
            self.advance();
            let value = self.parse_test()?;
            let span = start.merge(&self.span_of(value));
            return Ok(self.push(NodeKind::NamedExpr { target, value }, span));
        }
        self.parse_test()
    }

    /// `or_test ['if' or_test 'else' test]`
    ///
    /// Every bracketed expression comes through here, so this is where
    /// bracket nesting is counted.
    pub(crate) fn parse_test(&mut self) -> ParseResult<NodeId> {
        self.descend("parentheses")?;
        let result = self.parse_conditional();
        self.ascend();
        result
    }

    fn parse_conditional(&mut self) -> ParseResult<NodeId> {
        let body = self.parse_or()?;
        if self.peek() != Some(&Token::If) {
            return Ok(body);
        }

        self.advance();
        let test = self.parse_or()?;
        self.expect(Token::Else)?;
        let orelse = self.parse_test()?;
        let span = self.span_of(body).merge(&self.span_of(orelse));
        Ok(self.push(NodeKind::IfExp { test, body, orelse }, span))
    }

    fn parse_or(&mut self) -> ParseResult<NodeId> {
        let first = self.parse_and()?;
        if self.peek() != Some(&Token::Or) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.eat(&Token::Or) {
            values.push(self.parse_and()?);
        }
        let span = self.span_of(first).merge(&self.span_of(values[values.len() - 1]));
        Ok(self.push(NodeKind::BoolOp { op: BoolOp::Or, values }, span))
    }

    fn parse_and(&mut self) -> ParseResult<NodeId> {
        let first = self.parse_not()?;
        if self.peek() != Some(&Token::And) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.eat(&Token::And) {
            values.push(self.parse_not()?);
        }
        let span = self.span_of(first).merge(&self.span_of(values[values.len() - 1]));
        Ok(self.push(NodeKind::BoolOp { op: BoolOp::And, values }, span))
    }

    fn parse_not(&mut self) -> ParseResult<NodeId> {
        if self.peek() == Some(&Token::Not) {
            let start = self.peek_span().unwrap_or_default();
            self.advance();
            self.descend("unary operators")?;
            let operand = self.parse_not();
            self.ascend();
            let operand = operand?;
            let span = start.merge(&self.span_of(operand));
            return Ok(self.push(NodeKind::UnaryOp { op: UnaryOp::Not, operand }, span));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ParseResult<NodeId> {
        let left = self.parse_sum()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();

        while let Some(op) = self.comparison_op() {
            ops.push(op);
            comparators.push(self.parse_sum()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }
        let span = self.span_of(left).merge(&self.span_of(comparators[comparators.len() - 1]));
        Ok(self.push(NodeKind::Compare { left, ops, comparators }, span))
    }

    /// Consumes a comparison operator if one is next. `not in` and `is not`
    /// take two tokens.
    fn comparison_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek()? {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::LtE,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::GtE,
            Token::In => CompareOp::In,
            Token::Not if self.peek_nth(1) == Some(&Token::In) => {
                self.pos += 2;
                return Some(CompareOp::NotIn);
            }
            Token::Is if self.peek_nth(1) == Some(&Token::Not) => {
                self.pos += 2;
                return Some(CompareOp::IsNot);
            }
            Token::Is => CompareOp::Is,
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    pub(super) fn parse_sum(&mut self) -> ParseResult<NodeId> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            let span = self.span_of(left).merge(&self.span_of(right));
            left = self.push(NodeKind::BinOp { left, op, right }, span);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> ParseResult<NodeId> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            let span = self.span_of(left).merge(&self.span_of(right));
            left = self.push(NodeKind::BinOp { left, op, right }, span);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> ParseResult<NodeId> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        let start = self.peek_span().unwrap_or_default();
        self.advance();
        self.descend("unary operators")?;
        let operand = self.parse_factor();
        self.ascend();
        let operand = operand?;
        let span = start.merge(&self.span_of(operand));
        Ok(self.push(NodeKind::UnaryOp { op, operand }, span))
    }

    /// `postfix ['**' factor]`: right-associative and binds tighter than a
    /// unary minus on its left.
    fn parse_power(&mut self) -> ParseResult<NodeId> {
        let base = self.parse_postfix()?;
        if !self.eat(&Token::DoubleStar) {
            return Ok(base);
        }
        self.descend("exponents")?;
        let exponent = self.parse_factor();
        self.ascend();
        let exponent = exponent?;
        let span = self.span_of(base).merge(&self.span_of(exponent));
        Ok(self.push(
            NodeKind::BinOp {
                left: base,
                op: BinaryOp::Pow,
                right: exponent,
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> ParseResult<NodeId> {
        let mut expr = self.parse_atom()?;

        loop {
            match self.peek() {
                Some(Token::LeftParen) => {
                    self.advance();
                    let mut args = Vec::new();
                    while self.peek() != Some(&Token::RightParen) {
                        if matches!(self.peek(), Some(Token::Identifier(_)))
                            && self.peek_nth(1) == Some(&Token::Assign)
                        {
                            return Err(SyntaxError::invalid(
                                "keyword arguments are not supported",
                                self.peek_span(),
                            ));
                        }
                        args.push(self.parse_named_expr()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(Token::RightParen)?;
                    let span = self.span_of(expr).merge(&end);
                    expr = self.push(NodeKind::Call { func: expr, args }, span);
                }
                Some(Token::LeftBracket) => {
                    self.advance();
                    let index = self.parse_testlist()?;
                    let end = self.expect(Token::RightBracket)?;
                    let span = self.span_of(expr).merge(&end);
                    expr = self.push(NodeKind::Subscript { value: expr, index }, span);
                }
                Some(Token::Dot) => {
                    self.advance();
                    let (attr, end) = self.expect_identifier()?;
                    let span = self.span_of(expr).merge(&end);
                    expr = self.push(NodeKind::Attribute { value: expr, attr }, span);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_atom(&mut self) -> ParseResult<NodeId> {
        let Some(start) = self.peek_span() else {
            return Err(self.unexpected("expected an expression"));
        };

        let constant = match self.peek() {
            Some(Token::Identifier(name)) => {
                let id = name.clone();
                self.advance();
                return Ok(self.push(NodeKind::Name { id }, start));
            }
            Some(Token::Int(n)) => Constant::Int(*n),
            Some(Token::Float(n)) => Constant::Float(*n),
            Some(Token::True) => Constant::Bool(true),
            Some(Token::False) => Constant::Bool(false),
            Some(Token::None) => Constant::None,
            Some(Token::String(_)) => return self.parse_strings(),
            Some(Token::LeftParen) => return self.parse_parenthesized(),
            Some(Token::LeftBracket) => return self.parse_list(),
            Some(Token::LeftBrace) => return self.parse_dict(),
            _ => return Err(self.unexpected("expected an expression")),
        };

        self.advance();
        Ok(self.push(NodeKind::Constant { value: constant }, start))
    }

    /// Adjacent string literals concatenate.
    fn parse_strings(&mut self) -> ParseResult<NodeId> {
        let start = self.peek_span().unwrap_or_default();
        let mut end = start;
        let mut text = String::new();

        while let Some(Token::String(_)) = self.peek() {
            if let Some(st) = self.advance()
                && let Token::String(part) = st.token
            {
                text.push_str(&part);
                end = st.span;
            }
        }

        Ok(self.push(
            NodeKind::Constant {
                value: Constant::Str(text),
            },
            start.merge(&end),
        ))
    }

    fn parse_parenthesized(&mut self) -> ParseResult<NodeId> {
        let start = self.expect(Token::LeftParen)?;

        if self.peek() == Some(&Token::RightParen) {
            let end = self.expect(Token::RightParen)?;
            return Ok(self.push(NodeKind::Tuple { elts: Vec::new() }, start.merge(&end)));
        }

        let first = self.parse_named_expr()?;
        if !self.eat(&Token::Comma) {
            self.expect(Token::RightParen)?;
            return Ok(first);
        }

        let mut elts = vec![first];
        while self.peek() != Some(&Token::RightParen) {
            elts.push(self.parse_named_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let end = self.expect(Token::RightParen)?;
        Ok(self.push(NodeKind::Tuple { elts }, start.merge(&end)))
    }

    fn parse_list(&mut self) -> ParseResult<NodeId> {
        let start = self.expect(Token::LeftBracket)?;
        let mut elts = Vec::new();

        while self.peek() != Some(&Token::RightBracket) {
            elts.push(self.parse_named_expr()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        let end = self.expect(Token::RightBracket)?;
        Ok(self.push(NodeKind::List { elts }, start.merge(&end)))
    }

    fn parse_dict(&mut self) -> ParseResult<NodeId> {
        let start = self.expect(Token::LeftBrace)?;
        let mut keys = Vec::new();
        let mut values = Vec::new();

        while self.peek() != Some(&Token::RightBrace) {
            let key = self.parse_test()?;
            if self.peek() != Some(&Token::Colon) {
                return Err(SyntaxError::invalid(
                    "set literals are not supported",
                    Some(self.span_of(key)),
                ));
            }
            self.advance();
            keys.push(key);
            values.push(self.parse_test()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        let end = self.expect(Token::RightBrace)?;
        Ok(self.push(NodeKind::Dict { keys, values }, start.merge(&end)))
    }

    /// Tokens that can open an expression; used to allow a trailing comma.
    pub(super) fn at_expression_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Identifier(_)
                    | Token::Int(_)
                    | Token::Float(_)
                    | Token::String(_)
                    | Token::True
                    | Token::False
                    | Token::None
                    | Token::LeftParen
                    | Token::LeftBracket
                    | Token::LeftBrace
                    | Token::Minus
                    | Token::Plus
                    | Token::Not
            )
        )
    }
}
