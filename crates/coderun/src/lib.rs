//! Evaluate one chunk of code and report its value.
//!
//! ```
//! use coderun::prelude::*;
//!
//! let mut ns = Namespace::new();
//! assert_eq!(eval_code("x = 20\nx * 2 + 2", &mut ns).unwrap(), Some(Value::Int(42)));
//! assert_eq!(eval_code("x + 1;", &mut ns).unwrap(), None);
//! ```

pub use coderun_eval::{
    CodeObject, CodeRunner, Config, EvalOptions, FaultKind, Limits, Namespace, RESULT_NAME,
    ReturnMode, RuntimeFault, Value, call_function, eval_code, eval_code_with,
};
pub use coderun_syntax::{
    CompileFlags, ConfigurationError, Mode, NodeId, NodeKind, SyntaxError, SyntaxTree,
    should_quiet,
};

pub mod prelude {
    pub use crate::{CodeRunner, Mode, Namespace, ReturnMode, Value};
    pub use crate::{eval_code, eval_code_with, should_quiet};
}
