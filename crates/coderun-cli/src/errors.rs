use coderun_eval::{FaultKind, RuntimeFault};
use coderun_syntax::{LexError, Span, SyntaxError};
use colored::*;
use std::fmt;

/// Error with source context and suggestions, rendered to stderr.
pub struct EnhancedError {
    pub message: String,
    pub span: Option<Span>,
    pub file: Option<String>,
    pub source: Option<String>,
    pub suggestion: Option<String>,
    pub help: Option<String>,
}

impl EnhancedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
            file: None,
            source: None,
            suggestion: None,
            help: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Display the error with colored output and context
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.message.bold());

        if let (Some(file), Some(span)) = (&self.file, &self.span) {
            eprintln!("  {} {}:{}:{}", "-->".blue().bold(), file, span.line, span.col);
        }

        if let (Some(source), Some(span)) = (&self.source, &self.span) {
            eprintln!();
            self.display_source_with_span(source, span);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!();
            eprintln!("{} {}", "suggestion:".green().bold(), suggestion);
        }

        if let Some(help) = &self.help {
            eprintln!();
            eprintln!("{} {}", "help:".cyan().bold(), help);
        }
    }

    fn display_source_with_span(&self, source: &str, span: &Span) {
        let lines: Vec<&str> = source.lines().collect();
        let line_idx = span.line.saturating_sub(1);
        if line_idx >= lines.len() {
            return;
        }

        let max_line = (span.line + 2).min(lines.len());
        let line_num_width = max_line.to_string().len();

        // Two lines of context either side.
        let start = line_idx.saturating_sub(2);
        let end = (line_idx + 3).min(lines.len());

        for (i, line) in lines.iter().enumerate().take(end).skip(start) {
            let line_num = i + 1;
            if line_num == span.line {
                eprintln!(
                    "{:>width$} {} {}",
                    line_num.to_string().blue().bold(),
                    "|".blue().bold(),
                    line,
                    width = line_num_width
                );

                let spaces = " ".repeat(span.col.saturating_sub(1));
                let line_rest = line.len().saturating_sub(span.col.saturating_sub(1)).max(1);
                let caret_len = span.end.saturating_sub(span.start).clamp(1, line_rest);
                eprintln!(
                    "{:>width$} {} {}{}",
                    "",
                    "|".blue().bold(),
                    spaces,
                    "^".repeat(caret_len).red().bold(),
                    width = line_num_width
                );
            } else {
                eprintln!(
                    "{:>width$} {} {}",
                    line_num.to_string().dimmed(),
                    "|".blue().bold(),
                    line,
                    width = line_num_width
                );
            }
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnhancedError: {}", self.message)
    }
}

impl std::error::Error for EnhancedError {}

/// Convert anyhow::Error to EnhancedError with a span and suggestions
pub fn enhance_error(err: anyhow::Error, file: Option<String>, source: Option<String>) -> EnhancedError {
    let mut enhanced = EnhancedError::new(err.to_string());

    if let Some(file) = file {
        enhanced = enhanced.with_file(file);
    }
    if let Some(source) = source {
        enhanced = enhanced.with_source(source);
    }

    if let Some(syntax) = err.downcast_ref::<SyntaxError>() {
        if let Some(span) = syntax.span() {
            enhanced = enhanced.with_span(span);
        }
        if syntax.is_multiple_statements() {
            enhanced = enhanced
                .with_suggestion("Use --mode exec to evaluate several statements")
                .with_help("'single' mode accepts one line of statements or one compound statement");
        } else if let SyntaxError::Lex(LexError::UnexpectedChar { suggestion: Some(s), .. }) = syntax {
            enhanced = enhanced.with_suggestion(format!("Did you mean '{}'?", s));
        }
    } else if let Some(fault) = err.downcast_ref::<RuntimeFault>() {
        if let Some(span) = fault.span {
            enhanced = enhanced.with_span(span);
        }
        enhanced = match fault.kind {
            FaultKind::NameError => enhanced
                .with_suggestion("Check the name's spelling or assign it before use"),
            FaultKind::UnboundLocalError => enhanced
                .with_suggestion("Declare the name 'global' if the function should use the outer value"),
            FaultKind::RecursionError => enhanced
                .with_help("Raise max_recursion_depth in .coderunrc if the recursion is intended"),
            FaultKind::SystemError => enhanced
                .with_help("The compiled artifact is inconsistent; recompile it from source"),
            _ => enhanced,
        };
    }

    enhanced
}
