use crate::error::{LexError, Span};
use crate::mode::CompileFlags;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

static KEYWORDS: Lazy<HashMap<&'static str, Token>> = Lazy::new(|| {
    let mut m = HashMap::with_capacity(24);
    m.insert("def", Token::Def);
    m.insert("return", Token::Return);
    m.insert("if", Token::If);
    m.insert("elif", Token::Elif);
    m.insert("else", Token::Else);
    m.insert("while", Token::While);
    m.insert("for", Token::For);
    m.insert("in", Token::In);
    m.insert("not", Token::Not);
    m.insert("and", Token::And);
    m.insert("or", Token::Or);
    m.insert("is", Token::Is);
    m.insert("pass", Token::Pass);
    m.insert("break", Token::Break);
    m.insert("continue", Token::Continue);
    m.insert("global", Token::Global);
    m.insert("True", Token::True);
    m.insert("False", Token::False);
    m.insert("None", Token::None);
    m
});

const TAB_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Def,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Not,
    And,
    Or,
    Is,
    Pass,
    Break,
    Continue,
    Global,
    True,
    False,
    None,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Assign,
    Walrus,
    PlusAssign,
    MinusAssign,
    StarAssign,
    DoubleStarAssign,
    SlashAssign,
    DoubleSlashAssign,
    PercentAssign,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,
    Identifier(String),
    String(String),
    Int(i64),
    Float(f64),
    Newline,
    Indent,
    Dedent,
}

impl Token {
    pub fn display_name(&self) -> String {
        match self {
            Token::Identifier(s) => format!("name '{}'", s),
            Token::String(s) => format!("string {:?}", s),
            Token::Int(n) => format!("number {}", n),
            Token::Float(n) => format!("number {}", n),
            Token::Newline => "newline".to_string(),
            Token::Indent => "indent".to_string(),
            Token::Dedent => "dedent".to_string(),
            t if t.is_keyword() => format!("keyword '{}'", t),
            other => format!("'{}'", other),
        }
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            Token::Def
                | Token::Return
                | Token::If
                | Token::Elif
                | Token::Else
                | Token::While
                | Token::For
                | Token::In
                | Token::Not
                | Token::And
                | Token::Or
                | Token::Is
                | Token::Pass
                | Token::Break
                | Token::Continue
                | Token::Global
                | Token::True
                | Token::False
                | Token::None
        )
    }
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenizes with the default flags (dedents implied at end of input).
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    tokenize_with(input, CompileFlags::NONE)
}

pub fn tokenize_with(input: &str, flags: CompileFlags) -> Result<Vec<SpannedToken>, LexError> {
    Lexer::new(input, flags).run()
}

#[derive(Clone, Copy)]
struct Mark {
    line: usize,
    col: usize,
    offset: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    offset: usize,
    tokens: Vec<SpannedToken>,
    indents: Vec<usize>,
    brackets: Vec<(char, Span)>,
    imply_dedent: bool,
    trailing_blank: bool,
}

impl Lexer {
    fn new(input: &str, flags: CompileFlags) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            offset: 0,
            tokens: Vec::with_capacity(input.len() / 3),
            indents: vec![0],
            brackets: Vec::new(),
            imply_dedent: !flags.contains(CompileFlags::DONT_IMPLY_DEDENT),
            trailing_blank: false,
        }
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    #[inline]
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.offset += ch.len_utf8();
        Some(ch)
    }

    fn mark(&self) -> Mark {
        Mark { line: self.line, col: self.col, offset: self.offset }
    }

    fn span_from(&self, start: Mark) -> Span {
        Span::new(start.line, start.col, start.offset, self.offset)
    }

    fn push(&mut self, token: Token, start: Mark) {
        let span = self.span_from(start);
        self.tokens.push(SpannedToken { token, span });
    }

    /// Consumes `len` chars and pushes `token` spanning them.
    fn op(&mut self, token: Token, len: usize) {
        let start = self.mark();
        for _ in 0..len {
            self.bump();
        }
        self.push(token, start);
    }

    fn run(mut self) -> Result<Vec<SpannedToken>, LexError> {
        let mut at_line_start = true;

        while self.pos < self.chars.len() {
            if at_line_start && self.brackets.is_empty() {
                at_line_start = false;
                if self.skip_blank_or_indent()? {
                    at_line_start = true;
                    continue;
                }
            }

            let Some(ch) = self.peek() else { break };
            self.trailing_blank = false;

            match ch {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.bump();
                }

                '\\' if self.peek_nth(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }

                '\\' if self.peek_nth(1) == Some('\r') && self.peek_nth(2) == Some('\n') => {
                    self.bump();
                    self.bump();
                    self.bump();
                }

                '\n' => {
                    let start = self.mark();
                    self.bump();
                    if self.brackets.is_empty() {
                        self.push(Token::Newline, start);
                        at_line_start = true;
                    }
                }

                '#' => self.skip_comment(),

                '"' | '\'' => self.lex_string(false)?,

                '0'..='9' => self.lex_number()?,
                '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => self.lex_number()?,

                'r' | 'R' if matches!(self.peek_nth(1), Some('"') | Some('\'')) => {
                    let start = self.mark();
                    self.bump();
                    self.lex_string_from(start, true)?;
                }

                _ if ch.is_alphabetic() || ch == '_' => self.lex_identifier(),

                '+' => match self.peek_nth(1) {
                    Some('=') => self.op(Token::PlusAssign, 2),
                    _ => self.op(Token::Plus, 1),
                },
                '-' => match self.peek_nth(1) {
                    Some('=') => self.op(Token::MinusAssign, 2),
                    _ => self.op(Token::Minus, 1),
                },
                '*' => match (self.peek_nth(1), self.peek_nth(2)) {
                    (Some('*'), Some('=')) => self.op(Token::DoubleStarAssign, 3),
                    (Some('*'), _) => self.op(Token::DoubleStar, 2),
                    (Some('='), _) => self.op(Token::StarAssign, 2),
                    _ => self.op(Token::Star, 1),
                },
                '/' => match (self.peek_nth(1), self.peek_nth(2)) {
                    (Some('/'), Some('=')) => self.op(Token::DoubleSlashAssign, 3),
                    (Some('/'), _) => self.op(Token::DoubleSlash, 2),
                    (Some('='), _) => self.op(Token::SlashAssign, 2),
                    _ => self.op(Token::Slash, 1),
                },
                '%' => match self.peek_nth(1) {
                    Some('=') => self.op(Token::PercentAssign, 2),
                    _ => self.op(Token::Percent, 1),
                },
                '=' => match self.peek_nth(1) {
                    Some('=') => self.op(Token::Eq, 2),
                    _ => self.op(Token::Assign, 1),
                },
                '!' => match self.peek_nth(1) {
                    Some('=') => self.op(Token::Ne, 2),
                    _ => {
                        let start = self.mark();
                        self.bump();
                        return Err(LexError::UnexpectedChar {
                            ch: '!',
                            span: self.span_from(start),
                            suggestion: Some("not".to_string()),
                        });
                    }
                },
                '<' => match self.peek_nth(1) {
                    Some('=') => self.op(Token::Le, 2),
                    _ => self.op(Token::Lt, 1),
                },
                '>' => match self.peek_nth(1) {
                    Some('=') => self.op(Token::Ge, 2),
                    _ => self.op(Token::Gt, 1),
                },
                ':' => match self.peek_nth(1) {
                    Some('=') => self.op(Token::Walrus, 2),
                    _ => self.op(Token::Colon, 1),
                },
                '(' | '[' | '{' => {
                    let start = self.mark();
                    self.bump();
                    let token = match ch {
                        '(' => Token::LeftParen,
                        '[' => Token::LeftBracket,
                        _ => Token::LeftBrace,
                    };
                    self.push(token, start);
                    let span = self.span_from(start);
                    self.brackets.push((ch, span));
                }
                ')' | ']' | '}' => {
                    let start = self.mark();
                    self.bump();
                    let span = self.span_from(start);
                    let opener = match ch {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match self.brackets.pop() {
                        Some((open, _)) if open == opener => {}
                        _ => return Err(LexError::UnmatchedBracket { ch, span }),
                    }
                    let token = match ch {
                        ')' => Token::RightParen,
                        ']' => Token::RightBracket,
                        _ => Token::RightBrace,
                    };
                    self.push(token, start);
                }
                ',' => self.op(Token::Comma, 1),
                '.' => self.op(Token::Dot, 1),
                ';' => self.op(Token::Semicolon, 1),

                _ => {
                    let start = self.mark();
                    self.bump();
                    return Err(LexError::UnexpectedChar {
                        ch,
                        span: self.span_from(start),
                        suggestion: None,
                    });
                }
            }
        }

        if let Some((_, span)) = self.brackets.last() {
            return Err(LexError::UnexpectedEof {
                expected: "closing bracket".to_string(),
                span: *span,
            });
        }

        let end = self.mark();
        if !matches!(
            self.tokens.last().map(|t| &t.token),
            None | Some(Token::Newline) | Some(Token::Dedent)
        ) {
            self.push(Token::Newline, end);
        }

        if self.imply_dedent || self.trailing_blank {
            while self.indents.len() > 1 {
                self.indents.pop();
                self.push(Token::Dedent, end);
            }
        }

        Ok(self.tokens)
    }

    /// Measures the indentation of the line under the cursor. Blank and
    /// comment-only lines are consumed whole and reported with `true`.
    fn skip_blank_or_indent(&mut self) -> Result<bool, LexError> {
        let start = self.mark();
        let mut width = 0;

        while let Some(ch) = self.peek() {
            match ch {
                ' ' => width += 1,
                '\t' => width = (width / TAB_SIZE + 1) * TAB_SIZE,
                '\x0c' => width = 0,
                _ => break,
            }
            self.bump();
        }

        match self.peek() {
            None => return Ok(true),
            Some('\n') => {
                self.bump();
                self.trailing_blank = true;
                return Ok(true);
            }
            Some('\r') if self.peek_nth(1) == Some('\n') => {
                self.bump();
                self.bump();
                self.trailing_blank = true;
                return Ok(true);
            }
            Some('#') => {
                self.skip_comment();
                if self.peek() == Some('\n') {
                    self.bump();
                }
                self.trailing_blank = true;
                return Ok(true);
            }
            _ => {}
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(Token::Indent, start);
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.push(Token::Dedent, start);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(LexError::InconsistentDedent { span: self.span_from(start) });
            }
        }

        Ok(false)
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn lex_identifier(&mut self) {
        let start = self.mark();
        let mut ident = String::with_capacity(16);
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        let token = KEYWORDS
            .get(ident.as_str())
            .cloned()
            .unwrap_or(Token::Identifier(ident));
        self.push(token, start);
    }

    fn lex_string(&mut self, raw: bool) -> Result<(), LexError> {
        let start = self.mark();
        self.lex_string_from(start, raw)
    }

    fn lex_string_from(&mut self, start: Mark, raw: bool) -> Result<(), LexError> {
        let Some(quote) = self.bump() else {
            return Err(LexError::UnterminatedString { span: self.span_from(start) });
        };
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut string = String::new();
        loop {
            let Some(ch) = self.peek() else {
                return Err(LexError::UnterminatedString { span: self.span_from(start) });
            };

            if ch == quote {
                if !triple {
                    self.bump();
                    break;
                }
                if self.peek_nth(1) == Some(quote) && self.peek_nth(2) == Some(quote) {
                    self.bump();
                    self.bump();
                    self.bump();
                    break;
                }
                string.push(ch);
                self.bump();
                continue;
            }

            if ch == '\n' && !triple {
                return Err(LexError::UnterminatedString { span: self.span_from(start) });
            }

            if ch == '\\' {
                self.bump();
                let Some(escaped) = self.bump() else {
                    return Err(LexError::UnterminatedString { span: self.span_from(start) });
                };
                if raw {
                    string.push('\\');
                    string.push(escaped);
                    continue;
                }
                match escaped {
                    'n' => string.push('\n'),
                    't' => string.push('\t'),
                    'r' => string.push('\r'),
                    '0' => string.push('\0'),
                    '\\' => string.push('\\'),
                    '\'' => string.push('\''),
                    '"' => string.push('"'),
                    '\n' => {}
                    other => {
                        string.push('\\');
                        string.push(other);
                    }
                }
                continue;
            }

            string.push(ch);
            self.bump();
        }

        self.push(Token::String(string), start);
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        let start = self.mark();
        let mut text = String::new();

        if self.peek() == Some('0')
            && let Some(prefix) = self.peek_nth(1)
            && matches!(prefix, 'x' | 'X' | 'o' | 'O' | 'b' | 'B')
        {
            self.bump();
            self.bump();
            let radix = match prefix.to_ascii_lowercase() {
                'x' => 16,
                'o' => 8,
                _ => 2,
            };
            while let Some(ch) = self.peek() {
                if ch.is_digit(radix) || ch == '_' {
                    if ch != '_' {
                        text.push(ch);
                    }
                    self.bump();
                } else {
                    break;
                }
            }
            let value = i64::from_str_radix(&text, radix).map_err(|_| LexError::InvalidNumber {
                text: format!("0{}{}", prefix, text),
                span: self.span_from(start),
            })?;
            self.reject_trailing_ident(start, &text)?;
            self.push(Token::Int(value), start);
            return Ok(());
        }

        let mut is_float = false;
        self.take_digits(&mut text);

        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.bump();
            self.take_digits(&mut text);
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = self.peek_nth(1);
            let has_exponent = match sign {
                Some('+') | Some('-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if has_exponent {
                is_float = true;
                text.push('e');
                self.bump();
                if let Some(s @ ('+' | '-')) = self.peek() {
                    text.push(s);
                    self.bump();
                }
                self.take_digits(&mut text);
            }
        }

        self.reject_trailing_ident(start, &text)?;

        let token = if is_float {
            let value = text.parse::<f64>().map_err(|_| LexError::InvalidNumber {
                text: text.clone(),
                span: self.span_from(start),
            })?;
            Token::Float(value)
        } else {
            let value = text.parse::<i64>().map_err(|_| LexError::InvalidNumber {
                text: text.clone(),
                span: self.span_from(start),
            })?;
            Token::Int(value)
        };

        self.push(token, start);
        Ok(())
    }

    fn take_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.bump();
            } else if ch == '_' && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn reject_trailing_ident(&mut self, start: Mark, text: &str) -> Result<(), LexError> {
        if let Some(ch) = self.peek()
            && (ch.is_alphanumeric() || ch == '_')
        {
            let mut bad = text.to_string();
            while let Some(ch) = self.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    bad.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
            return Err(LexError::InvalidNumber { text: bad, span: self.span_from(start) });
        }
        Ok(())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Def => write!(f, "def"),
            Token::Return => write!(f, "return"),
            Token::If => write!(f, "if"),
            Token::Elif => write!(f, "elif"),
            Token::Else => write!(f, "else"),
            Token::While => write!(f, "while"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::Not => write!(f, "not"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Is => write!(f, "is"),
            Token::Pass => write!(f, "pass"),
            Token::Break => write!(f, "break"),
            Token::Continue => write!(f, "continue"),
            Token::Global => write!(f, "global"),
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::None => write!(f, "None"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::DoubleStar => write!(f, "**"),
            Token::Slash => write!(f, "/"),
            Token::DoubleSlash => write!(f, "//"),
            Token::Percent => write!(f, "%"),
            Token::Eq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Assign => write!(f, "="),
            Token::Walrus => write!(f, ":="),
            Token::PlusAssign => write!(f, "+="),
            Token::MinusAssign => write!(f, "-="),
            Token::StarAssign => write!(f, "*="),
            Token::DoubleStarAssign => write!(f, "**="),
            Token::SlashAssign => write!(f, "/="),
            Token::DoubleSlashAssign => write!(f, "//="),
            Token::PercentAssign => write!(f, "%="),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Dot => write!(f, "."),
            Token::Semicolon => write!(f, ";"),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::String(s) => write!(f, "{:?}", s),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(n) => write!(f, "{}", n),
            Token::Newline => write!(f, "newline"),
            Token::Indent => write!(f, "indent"),
            Token::Dedent => write!(f, "dedent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_tokenize_keywords() {
        let tokens = kinds("def return if elif else while for pass");

        assert_eq!(tokens[0], Token::Def);
        assert_eq!(tokens[1], Token::Return);
        assert_eq!(tokens[2], Token::If);
        assert_eq!(tokens[3], Token::Elif);
        assert_eq!(tokens[4], Token::Else);
        assert_eq!(tokens[5], Token::While);
        assert_eq!(tokens[6], Token::For);
        assert_eq!(tokens[7], Token::Pass);
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = kinds("== != < <= > >= + - * / // % ** :=");

        assert_eq!(tokens[0], Token::Eq);
        assert_eq!(tokens[1], Token::Ne);
        assert_eq!(tokens[2], Token::Lt);
        assert_eq!(tokens[3], Token::Le);
        assert_eq!(tokens[4], Token::Gt);
        assert_eq!(tokens[5], Token::Ge);
        assert_eq!(tokens[6], Token::Plus);
        assert_eq!(tokens[7], Token::Minus);
        assert_eq!(tokens[8], Token::Star);
        assert_eq!(tokens[9], Token::Slash);
        assert_eq!(tokens[10], Token::DoubleSlash);
        assert_eq!(tokens[11], Token::Percent);
        assert_eq!(tokens[12], Token::DoubleStar);
        assert_eq!(tokens[13], Token::Walrus);
    }

    #[test]
    fn test_augmented_assignments() {
        let tokens = kinds("+= -= *= /= //= %= **=");

        assert_eq!(
            &tokens[..7],
            &[
                Token::PlusAssign,
                Token::MinusAssign,
                Token::StarAssign,
                Token::SlashAssign,
                Token::DoubleSlashAssign,
                Token::PercentAssign,
                Token::DoubleStarAssign,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        let tokens = kinds("42 3.14 .5 1e3 0x1f 1_000");

        assert_eq!(tokens[0], Token::Int(42));
        assert_eq!(tokens[1], Token::Float(3.14));
        assert_eq!(tokens[2], Token::Float(0.5));
        assert_eq!(tokens[3], Token::Float(1000.0));
        assert_eq!(tokens[4], Token::Int(31));
        assert_eq!(tokens[5], Token::Int(1000));
    }

    #[test]
    fn test_tokenize_strings() {
        let tokens = kinds(r#"'a' "b\n" r'c\d'"#);

        assert_eq!(tokens[0], Token::String("a".to_string()));
        assert_eq!(tokens[1], Token::String("b\n".to_string()));
        assert_eq!(tokens[2], Token::String("c\\d".to_string()));
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let tokens = kinds("'''one\ntwo'''");
        assert_eq!(tokens[0], Token::String("one\ntwo".to_string()));
        assert_eq!(tokens[1], Token::Newline);
    }

    #[test]
    fn test_comment_is_skipped() {
        let tokens = kinds("1 # trailing ;\n");
        assert_eq!(tokens, vec![Token::Int(1), Token::Newline]);
    }

    #[test]
    fn test_indent_and_dedent() {
        let tokens = kinds("if x:\n    y\nz");
        assert_eq!(
            tokens,
            vec![
                Token::If,
                Token::Identifier("x".to_string()),
                Token::Colon,
                Token::Newline,
                Token::Indent,
                Token::Identifier("y".to_string()),
                Token::Newline,
                Token::Dedent,
                Token::Identifier("z".to_string()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_dedent_implied_at_end_of_input() {
        let tokens = kinds("def f():\n  1");
        assert_eq!(tokens.last(), Some(&Token::Dedent));
    }

    #[test]
    fn test_dont_imply_dedent() {
        let tokens = tokenize_with("def f():\n  1", CompileFlags::DONT_IMPLY_DEDENT).unwrap();
        assert!(!tokens.iter().any(|t| t.token == Token::Dedent));

        let tokens = tokenize_with("def f():\n  1\n\n", CompileFlags::DONT_IMPLY_DEDENT).unwrap();
        assert_eq!(tokens.last().map(|t| &t.token), Some(&Token::Dedent));
    }

    #[test]
    fn test_newlines_inside_brackets_are_ignored() {
        let tokens = kinds("[1,\n 2]");
        assert!(!tokens[..tokens.len() - 1].contains(&Token::Newline));
    }

    #[test]
    fn test_error_inconsistent_dedent() {
        let result = tokenize("if x:\n    y\n  z");
        assert!(matches!(result, Err(LexError::InconsistentDedent { .. })));
    }

    #[test]
    fn test_error_unterminated_string() {
        assert!(matches!(tokenize("'abc"), Err(LexError::UnterminatedString { .. })));
    }

    #[test]
    fn test_error_unmatched_bracket() {
        assert!(matches!(tokenize("(1]"), Err(LexError::UnmatchedBracket { ch: ']', .. })));
    }

    #[test]
    fn test_error_invalid_character() {
        assert!(matches!(tokenize("1 ? 2"), Err(LexError::UnexpectedChar { ch: '?', .. })));
    }

    #[test]
    fn test_span_tracking() {
        let tokens = tokenize("x = 'hi'").unwrap();

        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[0].span.col, 1);
        assert_eq!(tokens[2].span.col, 5);
        assert_eq!(tokens[2].span.start, 4);
        assert_eq!(tokens[2].span.end, 8);
    }
}
