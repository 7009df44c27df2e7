mod expressions;
mod statements;

use crate::ast::*;
use crate::error::{Span, SyntaxError};
use crate::lexer::{SpannedToken, Token, tokenize_with};
use crate::mode::{CompileFlags, Mode};

pub(crate) type ParseResult<T> = Result<T, SyntaxError>;

/// Deepest nesting of brackets, unary operators and indented blocks the
/// parser follows. Deeper source is rejected with a [`SyntaxError`].
pub const MAX_NESTING: usize = 100;

/// Recursive-descent parser producing an arena [`SyntaxTree`].
///
/// Use [`parse()`] for source text or [`parse_tokens()`] when the token
/// stream is already at hand.
pub struct Parser {
    pub(super) tokens: Vec<SpannedToken>,
    pub(super) pos: usize,
    pub(super) nodes: Vec<Node>,
    depth: usize,
}

impl Parser {
    /// Creates a new parser from a token stream.
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        let capacity = tokens.len();
        Self {
            tokens,
            pos: 0,
            nodes: Vec::with_capacity(capacity),
            depth: 0,
        }
    }

    #[inline]
    pub(super) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|st| &st.token)
    }

    #[inline]
    pub(super) fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|st| &st.token)
    }

    #[inline]
    pub(super) fn peek_span(&self) -> Option<Span> {
        self.tokens.get(self.pos).map(|st| st.span)
    }

    #[inline]
    pub(super) fn advance(&mut self) -> Option<SpannedToken> {
        if self.pos < self.tokens.len() {
            let token = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(token)
        } else {
            None
        }
    }

    pub(super) fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, expected: Token) -> ParseResult<Span> {
        match self.peek() {
            Some(token) if *token == expected => {
                let span = self.tokens[self.pos].span;
                self.pos += 1;
                Ok(span)
            }
            _ => Err(self.unexpected(&format!("expected {}", expected.display_name()))),
        }
    }

    /// Builds an error pointing at the current token (or the end of input).
    pub(super) fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.tokens.get(self.pos) {
            Some(st) => match &st.token {
                Token::Indent => SyntaxError::invalid("unexpected indent", Some(st.span)),
                token => SyntaxError::invalid(
                    format!("{}, found {}", expected, token.display_name()),
                    Some(st.span),
                ),
            },
            None => SyntaxError::invalid(
                format!("{}, found end of input", expected),
                self.tokens.last().map(|st| st.span),
            ),
        }
    }

    /// Enters one level of nesting; `what` names the construct in the
    /// error. Pair with [`Parser::ascend`].
    pub(super) fn descend(&mut self, what: &str) -> ParseResult<()> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::invalid(
                format!("too many nested {}", what),
                self.peek_span(),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    pub(super) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    #[inline]
    pub(super) fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.pos += 1;
        }
    }

    pub(super) fn push(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node { kind, span });
        id
    }

    #[inline]
    pub(super) fn span_of(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    #[inline]
    pub(super) fn kind_of(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Parses a whole module: any number of statements.
    pub fn parse_module(&mut self) -> ParseResult<Root> {
        let mut body = Vec::with_capacity(32);

        self.skip_newlines();
        while self.peek().is_some() {
            body.extend(self.parse_statement()?);
            self.skip_newlines();
        }

        Ok(Root::Module { body })
    }

    /// Parses exactly one expression followed by the end of input.
    pub fn parse_eval(&mut self) -> ParseResult<Root> {
        self.skip_newlines();
        if self.peek().is_none() {
            return Err(self.unexpected("expected an expression"));
        }

        let body = self.parse_testlist()?;

        self.skip_newlines();
        if let Some(span) = self.peek_span() {
            return Err(SyntaxError::bare(Some(span)));
        }

        Ok(Root::Expression { body })
    }

    /// Parses one interactive statement: a line of simple statements or a
    /// single compound statement.
    pub fn parse_interactive(&mut self) -> ParseResult<Root> {
        self.skip_newlines();
        if self.peek().is_none() {
            return Ok(Root::Interactive { body: Vec::new() });
        }

        let body = self.parse_statement()?.into_vec();

        self.skip_newlines();
        if let Some(span) = self.peek_span() {
            return Err(SyntaxError::MultipleStatements { span });
        }

        Ok(Root::Interactive { body })
    }

    pub fn finish(self, root: Root) -> SyntaxTree {
        SyntaxTree::with_nodes(self.nodes, root)
    }
}

/// Tokenizes and parses `source` under the grammar of `mode`.
pub fn parse(source: &str, mode: Mode, flags: CompileFlags) -> Result<SyntaxTree, SyntaxError> {
    let tokens = tokenize_with(source, flags)?;
    parse_tokens(tokens, mode)
}

pub fn parse_tokens(tokens: Vec<SpannedToken>, mode: Mode) -> Result<SyntaxTree, SyntaxError> {
    let mut parser = Parser::new(tokens);
    let root = match mode {
        Mode::Exec => parser.parse_module()?,
        Mode::Eval => parser.parse_eval()?,
        Mode::Single => parser.parse_interactive()?,
    };
    Ok(parser.finish(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(source: &str) -> SyntaxTree {
        parse(source, Mode::Exec, CompileFlags::NONE).unwrap()
    }

    #[test]
    fn test_parse_expression_statement() {
        let tree = module("1 + 1");
        assert_eq!(tree.body().len(), 1);
        assert!(matches!(tree[tree.body()[0]].kind, NodeKind::Expr { .. }));
    }

    #[test]
    fn test_parse_semicolon_separated() {
        let tree = module("a = 5 ; a += 1");
        let body = tree.body();
        assert_eq!(body.len(), 2);
        assert!(matches!(tree[body[0]].kind, NodeKind::Assign { .. }));
        assert!(matches!(tree[body[1]].kind, NodeKind::AugAssign { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_trailing_semicolon_is_allowed() {
        let tree = module("1+1;\n");
        assert_eq!(tree.body().len(), 1);
    }

    #[test]
    fn test_parse_chained_assignment() {
        let tree = module("a = b = 2");
        match &tree[tree.body()[0]].kind {
            NodeKind::Assign { targets, value } => {
                assert_eq!(targets.len(), 2);
                assert_eq!(tree[*value].kind, NodeKind::Constant { value: Constant::Int(2) });
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_definition() {
        let tree = module("def f(x, y):\n    return x + y\n");
        match &tree[tree.body()[0]].kind {
            NodeKind::FunctionDef { name, params, body } => {
                assert_eq!(name, "f");
                assert_eq!(params, &["x".to_string(), "y".to_string()]);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected function definition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_if_elif_else() {
        let tree = module("if a:\n  1\nelif b:\n  2\nelse:\n  3\n");
        match &tree[tree.body()[0]].kind {
            NodeKind::If { orelse, .. } => {
                assert_eq!(orelse.len(), 1);
                assert!(matches!(tree[orelse[0]].kind, NodeKind::If { .. }));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_mode_rejects_statements() {
        let err = parse("x = 1", Mode::Eval, CompileFlags::NONE).unwrap_err();
        assert!(err.to_string().starts_with("invalid syntax"));

        let err = parse("1+1\n1+1", Mode::Eval, CompileFlags::NONE).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax");
    }

    #[test]
    fn test_single_mode_rejects_second_statement() {
        let err = parse("1+1\n1+1", Mode::Single, CompileFlags::NONE).unwrap_err();
        assert!(err.is_multiple_statements());
    }

    #[test]
    fn test_single_mode_accepts_semicolon_line() {
        let tree = parse("a = 1; b = 2", Mode::Single, CompileFlags::NONE).unwrap();
        assert_eq!(tree.body().len(), 2);
    }

    fn nested(open: &str, close: &str, depth: usize) -> String {
        format!("{}1{}", open.repeat(depth), close.repeat(depth))
    }

    #[test]
    fn test_nesting_limit() {
        assert!(parse(&nested("(", ")", MAX_NESTING - 1), Mode::Exec, CompileFlags::NONE).is_ok());

        for (open, close) in [("(", ")"), ("[", "]"), ("f(", ")"), ("-", ""), ("not ", "")] {
            let source = nested(open, close, 5000);
            let err = parse(&source, Mode::Exec, CompileFlags::NONE).unwrap_err();
            assert!(err.to_string().starts_with("invalid syntax: too many nested"), "{}", err);
        }

        let err = parse(&format!("2{}", "**2".repeat(5000)), Mode::Eval, CompileFlags::NONE).unwrap_err();
        assert!(err.to_string().contains("too many nested"));
    }

    #[test]
    fn test_block_nesting_limit() {
        let mut source = String::new();
        for level in 0..MAX_NESTING + 1 {
            source.push_str(&" ".repeat(level));
            source.push_str("if x:\n");
        }
        source.push_str(&" ".repeat(MAX_NESTING + 1));
        source.push_str("pass\n");
        let err = parse(&source, Mode::Exec, CompileFlags::NONE).unwrap_err();
        assert!(err.to_string().starts_with("invalid syntax: too many nested"), "{}", err);
    }

    #[test]
    fn test_long_elif_chain() {
        let mut source = String::from("if x == 0:\n    0\n");
        for i in 1..500 {
            source.push_str(&format!("elif x == {}:\n    {}\n", i, i));
        }
        source.push_str("else:\n    -1\n");
        let tree = module(&source);

        let mut depth = 0;
        let mut current = tree.body()[0];
        while let NodeKind::If { orelse, .. } = &tree[current].kind {
            depth += 1;
            match orelse.as_slice() {
                [next] if matches!(tree[*next].kind, NodeKind::If { .. }) => current = *next,
                _ => break,
            }
        }
        assert_eq!(depth, 500);
    }

    #[test]
    fn test_unexpected_indent() {
        let err = parse("x = 1\n  y = 2", Mode::Exec, CompileFlags::NONE).unwrap_err();
        assert_eq!(err.to_string(), "invalid syntax: unexpected indent");
    }
}
