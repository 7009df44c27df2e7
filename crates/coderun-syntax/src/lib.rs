//! # coderun syntax
//!
//! Lexer, arena syntax tree and parser for the coderun language, a small
//! indentation-sensitive scripting language.
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     ↓
//! Lexer (tokenize_with)      ← CompileFlags
//!     ↓
//! Vec<SpannedToken>
//!     ↓
//! Parser (parse)             ← Mode
//!     ↓
//! SyntaxTree (arena of Nodes, addressed by NodeId)
//! ```
//!
//! The grammar a source has to satisfy depends on the [`Mode`]:
//!
//! - `exec`: any number of statements
//! - `eval`: exactly one expression
//! - `single`: one interactive statement
//!
//! ## Example
//!
//! ```rust
//! use coderun_syntax::{CompileFlags, Mode, NodeKind, parse};
//!
//! let tree = parse("x = 1\nx + 2", Mode::Exec, CompileFlags::NONE).unwrap();
//! assert_eq!(tree.body().len(), 2);
//! assert!(matches!(tree[tree.body()[1]].kind, NodeKind::Expr { .. }));
//!
//! let err = parse("1\n2", Mode::Single, CompileFlags::NONE).unwrap_err();
//! assert_eq!(
//!     err.to_string(),
//!     "multiple statements found while compiling a single statement"
//! );
//! ```
//!
//! [`should_quiet`] answers the text-level question of whether a source ends
//! with a semicolon, without parsing it.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod mode;
pub mod parser;
pub mod quiet;

pub use ast::*;
pub use error::{ConfigurationError, LexError, Span, SyntaxError};
pub use lexer::{SpannedToken, Token, tokenize, tokenize_with};
pub use mode::{CompileFlags, Mode};
pub use parser::{Parser, parse, parse_tokens};
pub use quiet::should_quiet;
