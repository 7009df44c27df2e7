use coderun_syntax::lexer::{Token, tokenize, tokenize_with};
use coderun_syntax::{CompileFlags, LexError};

fn kinds(source: &str) -> Vec<Token> {
    tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
}

#[test]
fn test_keywords() {
    let source = "def return if elif else while for in not and or is pass break continue global";
    let tokens = kinds(source);

    assert!(matches!(tokens[0], Token::Def));
    assert!(matches!(tokens[1], Token::Return));
    assert!(matches!(tokens[2], Token::If));
    assert!(matches!(tokens[3], Token::Elif));
    assert!(matches!(tokens[4], Token::Else));
    assert!(matches!(tokens[5], Token::While));
    assert!(matches!(tokens[6], Token::For));
    assert!(matches!(tokens[7], Token::In));
    assert!(matches!(tokens[8], Token::Not));
    assert!(matches!(tokens[9], Token::And));
    assert!(matches!(tokens[10], Token::Or));
    assert!(matches!(tokens[11], Token::Is));
    assert!(matches!(tokens[12], Token::Pass));
    assert!(matches!(tokens[13], Token::Break));
    assert!(matches!(tokens[14], Token::Continue));
    assert!(matches!(tokens[15], Token::Global));
}

#[test]
fn test_literal_keywords() {
    let tokens = kinds("True False None");
    assert_eq!(tokens[..3], [Token::True, Token::False, Token::None]);
}

#[test]
fn test_walrus_and_colon() {
    let tokens = kinds("(y := 3) if x: pass");
    assert!(tokens.contains(&Token::Walrus));
    assert!(tokens.contains(&Token::Colon));
}

#[test]
fn test_semicolons() {
    let tokens = kinds("a = 5 ; a += 1;");
    assert_eq!(tokens.iter().filter(|t| **t == Token::Semicolon).count(), 2);
    assert_eq!(tokens.last(), Some(&Token::Newline));
}

#[test]
fn test_semicolon_in_comment_is_dropped() {
    let tokens = kinds("5-2  # comment with trailing semicolon ;");
    assert_eq!(
        tokens,
        vec![Token::Int(5), Token::Minus, Token::Int(2), Token::Newline]
    );
}

#[test]
fn test_nested_blocks_dedent_twice() {
    let tokens = kinds("def f():\n    if x:\n        1\ny");
    let dedents = tokens.iter().filter(|t| **t == Token::Dedent).count();
    assert_eq!(dedents, 2);
}

#[test]
fn test_dont_imply_dedent_keeps_blocks_open() {
    let source = "def f():\n  1";
    let implied = tokenize(source).unwrap();
    let strict = tokenize_with(source, CompileFlags::DONT_IMPLY_DEDENT).unwrap();

    assert_eq!(implied.len(), strict.len() + 1);
    assert_eq!(implied.last().map(|t| &t.token), Some(&Token::Dedent));
    assert_eq!(strict.last().map(|t| &t.token), Some(&Token::Newline));
}

#[test]
fn test_bang_suggests_not() {
    match tokenize("!x") {
        Err(LexError::UnexpectedChar { ch, suggestion, .. }) => {
            assert_eq!(ch, '!');
            assert_eq!(suggestion.as_deref(), Some("not"));
        }
        other => panic!("Expected UnexpectedChar, got {:?}", other),
    }
}

#[test]
fn test_unclosed_bracket_reports_eof() {
    let err = tokenize("[1, 2").unwrap_err();
    assert!(matches!(err, LexError::UnexpectedEof { .. }));
    assert_eq!(err.span().line, 1);
}
