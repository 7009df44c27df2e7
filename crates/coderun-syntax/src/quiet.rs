//! Trailing-semicolon detection.
//!
//! Source that lexes is judged by its last significant token, so a `#` or a
//! `;` inside any string literal (triple-quoted ones spanning lines included)
//! never counts. Source the lexer rejects falls back to a line scan, so the
//! question can be asked about any input.

use crate::lexer::{Token, tokenize};

/// Returns `true` when the last code token of `source` is a `;`.
///
/// Trailing whitespace, blank lines and `#` comments are ignored. A `#`
/// inside a string literal does not start a comment.
///
/// ```
/// use coderun_syntax::should_quiet;
///
/// assert!(should_quiet("1+1;"));
/// assert!(!should_quiet("1+1#;"));
/// assert!(!should_quiet("5-2  # comment with trailing semicolon ;"));
/// ```
pub fn should_quiet(source: &str) -> bool {
    match tokenize(source) {
        Ok(tokens) => tokens
            .iter()
            .rev()
            .find(|st| !matches!(st.token, Token::Newline | Token::Indent | Token::Dedent))
            .is_some_and(|st| st.token == Token::Semicolon),
        Err(_) => ends_with_semicolon(source),
    }
}

/// Line scan for source that does not lex. Quotes are tracked within one
/// line only, so a `#` on a continuation line of an unterminated
/// triple-quoted string reads as a comment.
fn ends_with_semicolon(source: &str) -> bool {
    let mut code = source.trim_end();

    loop {
        let line_start = code.rfind('\n').map_or(0, |i| i + 1);
        match comment_start(&code[line_start..]) {
            Some(hash) => code = code[..line_start + hash].trim_end(),
            None => break,
        }
    }

    code.ends_with(';')
}

/// Byte offset of the `#` opening a comment on `line`, if any.
fn comment_start(line: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in line.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '#' => return Some(i),
                '"' | '\'' => quote = Some(ch),
                _ => {}
            },
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicolon_at_end() {
        assert!(should_quiet("1+1;"));
        assert!(should_quiet("1+1;\n"));
        assert!(should_quiet("2**1;\n\n"));
        assert!(should_quiet("x = 1 ;   \t"));
    }

    #[test]
    fn semicolon_only_in_comment() {
        assert!(!should_quiet("1+1#;"));
        assert!(!should_quiet("5-2  # comment with trailing semicolon ;"));
    }

    #[test]
    fn semicolon_before_comment() {
        assert!(should_quiet("1+1;  # done"));
    }

    #[test]
    fn hash_inside_string_is_not_a_comment() {
        assert!(should_quiet("s = '#';"));
        assert!(!should_quiet("s = '#;'"));
        assert!(should_quiet("s = \"a\\\"#\";"));
    }

    #[test]
    fn comment_lines_after_the_code_are_skipped() {
        assert!(should_quiet("1+1;\n# done\n  # really\n"));
        assert!(!should_quiet("1+1\n# trailing;\n"));
    }

    #[test]
    fn only_last_line_matters() {
        assert!(!should_quiet("a = 1;\nb = 2"));
        assert!(should_quiet("a = 1\nb = 2;\n"));
    }

    #[test]
    fn hash_inside_triple_quoted_string() {
        assert!(should_quiet("s = '''first\n# not a comment''';"));
        assert!(!should_quiet("s = '''first\n# ;'''"));
        assert!(!should_quiet("s = \"\"\"a;\n;\"\"\"\n"));
    }

    #[test]
    fn semicolon_inside_block() {
        assert!(should_quiet("if True:\n    x = 1;\n"));
        assert!(!should_quiet("if True:\n    x = 1;\n    x\n"));
    }

    #[test]
    fn unlexable_source_uses_line_scan() {
        assert!(ends_with_semicolon("'unterminated ;"));
        assert!(!ends_with_semicolon("x = 1 # ;"));
    }

    #[test]
    fn never_fails_on_odd_input() {
        assert!(!should_quiet(""));
        assert!(!should_quiet("   \n\n"));
        assert!(!should_quiet("#"));
        assert!(should_quiet("'unterminated ;"));
        assert!(should_quiet("ünïcödé;"));
        assert!(!should_quiet("ünïcödé # ;"));
    }
}
