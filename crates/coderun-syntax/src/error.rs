use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub col: usize,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(line: usize, col: usize, start: usize, end: usize) -> Self {
        Self { line, col, start, end }
    }

    pub fn single(line: usize, col: usize, offset: usize) -> Self {
        Self { line, col, start: offset, end: offset + 1 }
    }

    pub fn merge(&self, other: &Span) -> Self {
        Self {
            line: self.line.min(other.line),
            col: if self.line == other.line {
                self.col.min(other.col)
            } else if self.line < other.line {
                self.col
            } else {
                other.col
            },
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    UnexpectedChar { ch: char, span: Span, suggestion: Option<String> },
    UnterminatedString { span: Span },
    InvalidNumber { text: String, span: Span },
    InconsistentDedent { span: Span },
    UnmatchedBracket { ch: char, span: Span },
    UnexpectedEof { expected: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar { span, .. } => *span,
            LexError::UnterminatedString { span } => *span,
            LexError::InvalidNumber { span, .. } => *span,
            LexError::InconsistentDedent { span } => *span,
            LexError::UnmatchedBracket { span, .. } => *span,
            LexError::UnexpectedEof { span, .. } => *span,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnexpectedChar { ch, suggestion, .. } => {
                write!(f, "invalid character '{}'", ch)?;
                if let Some(s) = suggestion {
                    write!(f, " (did you mean '{}'?)", s)?;
                }
                Ok(())
            }
            LexError::UnterminatedString { .. } => {
                write!(f, "unterminated string literal")
            }
            LexError::InvalidNumber { text, .. } => {
                write!(f, "invalid number literal: '{}'", text)
            }
            LexError::InconsistentDedent { .. } => {
                write!(f, "unindent does not match any outer indentation level")
            }
            LexError::UnmatchedBracket { ch, .. } => {
                write!(f, "unmatched '{}'", ch)
            }
            LexError::UnexpectedEof { expected, .. } => {
                write!(f, "unexpected end of input, expected {}", expected)
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Raised when source (or a mutated tree) does not fit the grammar of the
/// active [`Mode`](crate::Mode).
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxError {
    /// Generic grammar violation. `detail` narrows down what went wrong.
    InvalidSyntax { detail: Option<String>, span: Option<Span> },
    /// More than one interactive statement under [`Mode::Single`](crate::Mode::Single).
    MultipleStatements { span: Span },
    Lex(LexError),
}

impl SyntaxError {
    pub fn invalid(detail: impl Into<String>, span: Option<Span>) -> Self {
        SyntaxError::InvalidSyntax {
            detail: Some(detail.into()),
            span,
        }
    }

    pub fn bare(span: Option<Span>) -> Self {
        SyntaxError::InvalidSyntax { detail: None, span }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            SyntaxError::InvalidSyntax { span, .. } => *span,
            SyntaxError::MultipleStatements { span } => Some(*span),
            SyntaxError::Lex(e) => Some(e.span()),
        }
    }

    pub fn is_multiple_statements(&self) -> bool {
        matches!(self, SyntaxError::MultipleStatements { .. })
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::InvalidSyntax { detail: Some(detail), .. } => {
                write!(f, "invalid syntax: {}", detail)
            }
            SyntaxError::InvalidSyntax { detail: None, .. } => write!(f, "invalid syntax"),
            SyntaxError::MultipleStatements { .. } => {
                write!(f, "multiple statements found while compiling a single statement")
            }
            SyntaxError::Lex(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SyntaxError {}

impl From<LexError> for SyntaxError {
    fn from(err: LexError) -> Self {
        SyntaxError::Lex(err)
    }
}

/// An option name that does not map onto any known setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    pub option: &'static str,
    pub value: String,
    pub expected: &'static [&'static str],
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} '{}', expected one of: {}",
            self.option,
            self.value,
            self.expected.join(", ")
        )
    }
}

impl std::error::Error for ConfigurationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_merge_across_lines_keeps_first_column() {
        let a = Span::new(1, 5, 4, 6);
        let b = Span::new(2, 1, 10, 12);
        let merged = a.merge(&b);
        assert_eq!(merged, Span::new(1, 5, 4, 12));
        assert_eq!(b.merge(&a), Span::new(1, 5, 4, 12));
    }

    #[test]
    fn invalid_syntax_messages() {
        assert_eq!(SyntaxError::bare(None).to_string(), "invalid syntax");
        assert_eq!(
            SyntaxError::invalid("expected ':'", None).to_string(),
            "invalid syntax: expected ':'"
        );
    }

    #[test]
    fn multiple_statements_message() {
        let err = SyntaxError::MultipleStatements { span: Span::default() };
        assert!(err.is_multiple_statements());
        assert_eq!(
            err.to_string(),
            "multiple statements found while compiling a single statement"
        );
    }

    #[test]
    fn configuration_error_lists_choices() {
        let err = ConfigurationError {
            option: "mode",
            value: "bogus".to_string(),
            expected: &["exec", "eval", "single"],
        };
        assert_eq!(err.to_string(), "invalid mode 'bogus', expected one of: exec, eval, single");
    }
}
