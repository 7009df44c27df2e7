//! The code runner: parse, compile and run one chunk of source, reporting
//! the value it surfaces.
//!
//! Each stage can be driven separately so a caller can inspect or rewrite
//! the tree between parsing and compiling, or swap the compiled artifact
//! between compiling and running.

use crate::capture::{RESULT_NAME, ReturnMode, capture_result};
use crate::compiler::compile;
use crate::bytecode::CodeObject;
use crate::config::Config;
use crate::namespace::Namespace;
use crate::value::Value;
use crate::vm::Limits;
use anyhow::Result;
use coderun_syntax::{CompileFlags, ConfigurationError, Mode, SyntaxTree, parse, should_quiet};
use std::borrow::Cow;
use tracing::{debug, trace};

/// Holds one source chunk and the products of each stage.
///
/// ```
/// use coderun_eval::{CodeRunner, Namespace, Value};
///
/// let mut ns = Namespace::new().with("x", 3_i64);
/// let mut runner = CodeRunner::new("y = x * 2\ny + 1");
/// assert_eq!(runner.run(&mut ns).unwrap(), Some(Value::Int(7)));
/// assert_eq!(ns["y"], Value::Int(6));
/// ```
#[derive(Debug, Clone)]
pub struct CodeRunner {
    source: String,
    mode: Mode,
    flags: CompileFlags,
    return_mode: ReturnMode,
    quiet_trailing_semicolon: bool,
    limits: Limits,
    tree: Option<SyntaxTree>,
    artifact: Option<CodeObject>,
}

impl CodeRunner {
    /// Creates a runner in `exec` mode with the default result policy.
    /// Nothing is parsed yet.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            mode: Mode::default(),
            flags: CompileFlags::NONE,
            return_mode: ReturnMode::default(),
            quiet_trailing_semicolon: true,
            limits: Limits::default(),
            tree: None,
            artifact: None,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Like [`with_mode`](Self::with_mode), taking the mode's name.
    pub fn with_mode_name(self, name: &str) -> Result<Self, ConfigurationError> {
        Ok(self.with_mode(name.parse()?))
    }

    pub fn with_flags(mut self, flags: CompileFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_return_mode(mut self, mode: ReturnMode) -> Self {
        self.return_mode = mode;
        self
    }

    pub fn with_quiet_trailing_semicolon(mut self, quiet: bool) -> Self {
        self.quiet_trailing_semicolon = quiet;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Takes the result policy and limits from `config`.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_return_mode(config.return_mode)
            .with_quiet_trailing_semicolon(config.quiet_trailing_semicolon)
            .with_limits(config.limits())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn flags(&self) -> CompileFlags {
        self.flags
    }

    pub fn return_mode(&self) -> ReturnMode {
        self.return_mode
    }

    /// Parses the source under the runner's mode. The stored tree is only
    /// replaced on success.
    pub fn parse(&mut self) -> Result<&mut Self> {
        debug!(mode = %self.mode, bytes = self.source.len(), "parse");
        let source = dedent(&self.source);
        let tree = parse(&source, self.mode, self.flags)?;
        self.tree = Some(tree);
        Ok(self)
    }

    /// The syntax tree, parsing first if needed. Edits made through the
    /// returned reference are picked up by the next [`compile`](Self::compile).
    pub fn tree(&mut self) -> Result<&mut SyntaxTree> {
        if self.tree.is_none() {
            self.parse()?;
        }
        match self.tree.as_mut() {
            Some(tree) => Ok(tree),
            None => anyhow::bail!("source was not parsed"),
        }
    }

    /// Validates the current tree against the mode and compiles it,
    /// replacing any previous artifact. The stored tree is not modified.
    pub fn compile(&mut self) -> Result<&mut Self> {
        let mut tree = self.tree()?.clone();

        let captured = self.mode == Mode::Exec
            && !self.is_quieted()
            && capture_result(&mut tree, self.return_mode);
        debug!(mode = %self.mode, return_mode = %self.return_mode, captured, "compile");

        let artifact = compile(&tree, self.mode)?;
        trace!("compiled\n{}", artifact.disassemble());
        self.artifact = Some(artifact);
        Ok(self)
    }

    pub fn artifact(&self) -> Option<&CodeObject> {
        self.artifact.as_ref()
    }

    pub fn artifact_mut(&mut self) -> Option<&mut CodeObject> {
        self.artifact.as_mut()
    }

    /// Replaces the compiled artifact. The replacement is not checked; an
    /// inconsistent artifact fails when it runs.
    pub fn set_artifact(&mut self, artifact: CodeObject) {
        self.artifact = Some(artifact);
    }

    /// Runs the artifact (compiling first if there is none) with `namespace`
    /// as the global scope and returns the surfaced value, if any.
    pub fn run(&mut self, namespace: &mut Namespace) -> Result<Option<Value>> {
        if self.artifact.is_none() {
            self.compile()?;
        }
        let Some(artifact) = self.artifact.as_ref() else {
            anyhow::bail!("no compiled artifact to run");
        };

        debug!(mode = %artifact.mode, instructions = artifact.instructions.len(), "run");
        let mut slot = ResultSlot::new(namespace);
        let value = artifact.run(&mut *slot.namespace, &self.limits)?;

        Ok(match artifact.mode {
            Mode::Eval => Some(value),
            Mode::Exec => slot.take(),
            Mode::Single => None,
        })
    }

    /// Runs against a new, empty namespace.
    pub fn run_fresh(&mut self) -> Result<Option<Value>> {
        self.run(&mut Namespace::new())
    }

    fn is_quieted(&self) -> bool {
        self.quiet_trailing_semicolon && should_quiet(&self.source)
    }
}

/// Keeps the reserved result entry out of the caller's namespace on every
/// exit path, faults included.
struct ResultSlot<'n> {
    namespace: &'n mut Namespace,
}

impl<'n> ResultSlot<'n> {
    fn new(namespace: &'n mut Namespace) -> Self {
        namespace.remove(RESULT_NAME);
        Self { namespace }
    }

    fn take(&mut self) -> Option<Value> {
        self.namespace.remove(RESULT_NAME)
    }
}

impl Drop for ResultSlot<'_> {
    fn drop(&mut self) {
        self.namespace.remove(RESULT_NAME);
    }
}

/// Options for [`eval_code_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOptions {
    pub return_mode: ReturnMode,
    pub quiet_trailing_semicolon: bool,
    pub limits: Limits,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            return_mode: ReturnMode::default(),
            quiet_trailing_semicolon: true,
            limits: Limits::default(),
        }
    }
}

impl From<&Config> for EvalOptions {
    fn from(config: &Config) -> Self {
        Self {
            return_mode: config.return_mode,
            quiet_trailing_semicolon: config.quiet_trailing_semicolon,
            limits: config.limits(),
        }
    }
}

/// Evaluates `source` in `exec` mode against `namespace` and returns the
/// value of its trailing expression, if any.
///
/// ```
/// use coderun_eval::{Namespace, Value, eval_code};
///
/// let mut ns = Namespace::new();
/// assert_eq!(eval_code("a = 4\na * a", &mut ns).unwrap(), Some(Value::Int(16)));
/// assert_eq!(eval_code("a * a;", &mut ns).unwrap(), None);
/// ```
pub fn eval_code(source: &str, namespace: &mut Namespace) -> Result<Option<Value>> {
    eval_code_with(source, namespace, &EvalOptions::default())
}

/// [`eval_code`] with an explicit result policy.
pub fn eval_code_with(
    source: &str,
    namespace: &mut Namespace,
    options: &EvalOptions,
) -> Result<Option<Value>> {
    CodeRunner::new(source)
        .with_return_mode(options.return_mode)
        .with_quiet_trailing_semicolon(options.quiet_trailing_semicolon)
        .with_limits(options.limits)
        .run(namespace)
}

/// Removes the leading whitespace shared by every non-blank line.
/// Whitespace-only lines are emptied.
pub fn dedent(source: &str) -> Cow<'_, str> {
    let margin = source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .reduce(|common, indent| {
            let shared = common
                .char_indices()
                .zip(indent.chars())
                .find(|((_, a), b)| a != b)
                .map_or(common.len().min(indent.len()), |((i, _), _)| i);
            &common[..shared]
        })
        .unwrap_or("");

    let has_blank_whitespace = source
        .lines()
        .any(|line| !line.is_empty() && line.trim().is_empty());
    if margin.is_empty() && !has_blank_whitespace {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    for line in source.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        if body.trim().is_empty() {
            out.push_str(newline);
        } else {
            out.push_str(body.strip_prefix(margin).unwrap_or(body));
            out.push_str(newline);
        }
    }
    Cow::Owned(out)
}
