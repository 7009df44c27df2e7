//! Compiled artifact: a flat instruction list over a stack machine.

use coderun_syntax::ast::{BinaryOp, CompareOp, UnaryOp};
use coderun_syntax::{Mode, Span};
use std::fmt;
use std::sync::Arc;

/// One stack-machine instruction. Operands index into the owning
/// [`CodeObject`]'s tables or name an absolute jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    LoadConst(u32),
    /// Namespace first, then builtins.
    LoadName(u32),
    StoreName(u32),
    LoadFast(u32),
    StoreFast(u32),
    LoadAttr(u32),
    /// `TOS.attr = TOS1`
    StoreAttr(u32),
    LoadSubscript,
    /// `TOS1[TOS] = TOS2`
    StoreSubscript,

    BinaryOp(BinaryOp),
    UnaryOp(UnaryOp),
    Compare(CompareOp),

    BuildList(u32),
    BuildTuple(u32),
    /// Pops `2 * n` values laid out as key, value, key, value...
    BuildDict(u32),
    /// Pushes the items of TOS in reverse, so the first item ends on top.
    UnpackSequence(u32),

    Call(u32),
    /// Builds a function from the code constant at the given index.
    MakeFunction(u32),

    Pop,
    DupTop,
    DupTwo,
    RotTwo,
    RotThree,

    Jump(u32),
    PopJumpIfFalse(u32),
    PopJumpIfTrue(u32),
    JumpIfFalseOrPop(u32),
    JumpIfTrueOrPop(u32),

    /// Moves an iterator over TOS onto the frame's iterator stack.
    GetIter,
    /// Pushes the next item of the innermost iterator, or drops the iterator
    /// and jumps when it is exhausted.
    ForIter(u32),
    /// Drops the innermost iterator (`break` out of a `for` loop).
    PopIter,

    ReturnValue,
}

impl Instruction {
    /// Same instruction pointing at `target`. Non-jumps are returned as is.
    pub fn retarget(self, target: u32) -> Self {
        match self {
            Instruction::Jump(_) => Instruction::Jump(target),
            Instruction::PopJumpIfFalse(_) => Instruction::PopJumpIfFalse(target),
            Instruction::PopJumpIfTrue(_) => Instruction::PopJumpIfTrue(target),
            Instruction::JumpIfFalseOrPop(_) => Instruction::JumpIfFalseOrPop(target),
            Instruction::JumpIfTrueOrPop(_) => Instruction::JumpIfTrueOrPop(target),
            Instruction::ForIter(_) => Instruction::ForIter(target),
            other => other,
        }
    }
}

/// Entries of a constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Code(Arc<CodeObject>),
}

impl Constant {
    /// Identity used to deduplicate the pool. Unlike `==`, keeps `1`, `1.0`,
    /// `True` and `0.0`/`-0.0` apart.
    pub fn same_as(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::None, Constant::None) => true,
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Str(a), Constant::Str(b)) => a == b,
            (Constant::Code(a), Constant::Code(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => write!(f, "None"),
            Constant::Bool(true) => write!(f, "True"),
            Constant::Bool(false) => write!(f, "False"),
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Float(x) => write!(f, "{}", crate::value::format_float(*x)),
            Constant::Str(s) => write!(f, "{:?}", s),
            Constant::Code(code) => write!(f, "<code {}>", code.name),
        }
    }
}

/// An executable unit produced by the compiler.
///
/// Holds no runtime values, so it is `Send + Sync` and can be run from
/// several threads at once, each with its own namespace. Callers may edit
/// the constant pool (see [`CodeObject::with_constants`]); the VM reports a
/// `SystemError` fault if an edit leaves an instruction pointing nowhere.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeObject {
    pub name: String,
    pub mode: Mode,
    pub instructions: Vec<Instruction>,
    /// Source span of each instruction, index-aligned with `instructions`.
    pub spans: Vec<Span>,
    pub constants: Vec<Constant>,
    pub names: Vec<String>,
    /// Fast-local slots; the first `arg_count` are the parameters.
    pub locals: Vec<String>,
    pub arg_count: usize,
}

impl CodeObject {
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
            instructions: Vec::new(),
            spans: Vec::new(),
            constants: Vec::new(),
            names: Vec::new(),
            locals: Vec::new(),
            arg_count: 0,
        }
    }

    /// Copy of this artifact with its constant pool replaced.
    pub fn with_constants(&self, constants: Vec<Constant>) -> Self {
        Self {
            constants,
            ..self.clone()
        }
    }

    /// Copy of this artifact with every constant passed through `f`.
    pub fn map_constants(&self, f: impl FnMut(&Constant) -> Constant) -> Self {
        self.with_constants(self.constants.iter().map(f).collect())
    }

    pub fn span_at(&self, pc: usize) -> Option<Span> {
        self.spans.get(pc).copied()
    }

    /// Human-readable listing, one instruction per line.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        self.write_listing(&mut out, 0);
        out
    }

    fn write_listing(&self, out: &mut String, depth: usize) {
        use std::fmt::Write;

        let indent = "  ".repeat(depth);
        let _ = writeln!(out, "{}code {} ({})", indent, self.name, self.mode);
        for (pc, instr) in self.instructions.iter().enumerate() {
            let line = self.spans.get(pc).map(|s| s.line).unwrap_or_default();
            let detail = match instr {
                Instruction::LoadConst(i) | Instruction::MakeFunction(i) => self
                    .constants
                    .get(*i as usize)
                    .map(|c| format!(" ({})", c))
                    .unwrap_or_default(),
                Instruction::LoadName(i)
                | Instruction::StoreName(i)
                | Instruction::LoadAttr(i)
                | Instruction::StoreAttr(i) => self
                    .names
                    .get(*i as usize)
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default(),
                Instruction::LoadFast(i) | Instruction::StoreFast(i) => self
                    .locals
                    .get(*i as usize)
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default(),
                _ => String::new(),
            };
            let _ = writeln!(out, "{}{:>4} {:>4}  {:?}{}", indent, line, pc, instr, detail);
        }
        for constant in &self.constants {
            if let Constant::Code(code) = constant {
                code.write_listing(out, depth + 1);
            }
        }
    }
}
