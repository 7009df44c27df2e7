//! # coderun eval
//!
//! Compiler, virtual machine and code runner for the coderun language.
//!
//! ## Architecture
//!
//! ```text
//! Source ──parse──▶ SyntaxTree ──capture──▶ SyntaxTree' ──compile──▶ CodeObject ──run──▶ Value
//!                   (editable)   (result rewrite)                    (replaceable)   (Namespace)
//! ```
//!
//! [`CodeRunner`] drives the stages and [`eval_code`] wraps the common case.
//! Runtime errors are [`RuntimeFault`]s carried inside [`anyhow::Error`]:
//!
//! ```rust
//! use coderun_eval::{FaultKind, Namespace, RuntimeFault, eval_code};
//!
//! let err = eval_code("1 // 0", &mut Namespace::new()).unwrap_err();
//! let fault = err.downcast_ref::<RuntimeFault>().unwrap();
//! assert_eq!(fault.kind, FaultKind::ZeroDivisionError);
//! ```

pub mod builtins;
pub mod bytecode;
pub mod capture;
pub mod compiler;
pub mod config;
pub mod error;
pub mod methods;
pub mod namespace;
pub mod ops;
pub mod runner;
pub mod value;
pub mod vm;

pub use builtins::{Builtin, BuiltinRegistry};
pub use bytecode::{CodeObject, Constant, Instruction};
pub use capture::{RESULT_NAME, ReturnMode, capture_result};
pub use compiler::compile;
pub use config::Config;
pub use error::{FaultKind, RuntimeFault};
pub use namespace::Namespace;
pub use runner::{CodeRunner, EvalOptions, dedent, eval_code, eval_code_with};
pub use value::{Dict, Function, Value};
pub use vm::{Limits, call_function};
