//! Stack machine that executes a [`CodeObject`] against a [`Namespace`].
//!
//! The machine trusts nothing about the artifact it is handed: a caller may
//! have swapped or edited it after compilation. Out-of-range table indices,
//! stack underflow and stray jumps all surface as `SystemError` faults
//! rather than panics.

use crate::builtins::BuiltinRegistry;
use crate::bytecode::{CodeObject, Constant, Instruction};
use crate::error::with_span;
use crate::fault;
use crate::namespace::Namespace;
use crate::ops::{eval_binary_op, eval_compare, eval_unary_op};
use crate::value::{Dict, Function, Value, ValueIter};
use anyhow::Result;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

/// Resource limits for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Deepest chain of nested function calls before a `RecursionError`.
    pub max_recursion_depth: usize,
}

impl Limits {
    pub const DEFAULT_RECURSION_DEPTH: usize = 200;

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_recursion_depth: Self::DEFAULT_RECURSION_DEPTH,
        }
    }
}

impl CodeObject {
    /// Executes the artifact with `namespace` as its global scope and
    /// returns the value it finishes with.
    ///
    /// Takes `&self`: one artifact can be run from several threads at once,
    /// each with its own namespace.
    pub fn run(&self, namespace: &mut Namespace, limits: &Limits) -> Result<Value> {
        Vm::new(namespace, limits).execute(self, Vec::new())
    }
}

/// Calls a function value (typically one defined by executed code and read
/// back out of the namespace) with positional `args`. Its global names
/// resolve against `namespace`.
pub fn call_function(
    func: &Value,
    args: Vec<Value>,
    namespace: &mut Namespace,
    limits: &Limits,
) -> Result<Value> {
    Vm::new(namespace, limits).call(func, args)
}

struct Vm<'a> {
    namespace: &'a mut Namespace,
    limits: &'a Limits,
    builtins: BuiltinRegistry,
    depth: usize,
}

struct Frame<'c> {
    code: &'c CodeObject,
    pc: usize,
    stack: Vec<Value>,
    locals: Vec<Option<Value>>,
    iterators: Vec<ValueIter>,
}

impl<'c> Frame<'c> {
    fn new(code: &'c CodeObject) -> Self {
        Self {
            code,
            pc: 0,
            stack: Vec::with_capacity(8),
            locals: vec![None; code.locals.len()],
            iterators: Vec::new(),
        }
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| fault!(SystemError, "stack underflow in {}", self.code.name))
    }

    fn top(&self) -> Result<&Value> {
        self.stack
            .last()
            .ok_or_else(|| fault!(SystemError, "stack underflow in {}", self.code.name))
    }

    /// Pops `n` values, returned in push order.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        if n > self.stack.len() {
            return Err(fault!(SystemError, "stack underflow in {}", self.code.name));
        }
        let at = self.stack.len() - n;
        Ok(self.stack.split_off(at))
    }

    fn constant(&self, index: u32) -> Result<&'c Constant> {
        self.code
            .constants
            .get(index as usize)
            .ok_or_else(|| fault!(SystemError, "constant index {} out of range", index))
    }

    fn name(&self, index: u32) -> Result<&'c str> {
        self.code
            .names
            .get(index as usize)
            .map(String::as_str)
            .ok_or_else(|| fault!(SystemError, "name index {} out of range", index))
    }

    fn local_slot(&mut self, index: u32) -> Result<&mut Option<Value>> {
        self.locals
            .get_mut(index as usize)
            .ok_or_else(|| fault!(SystemError, "local index {} out of range", index))
    }
}

impl<'a> Vm<'a> {
    fn new(namespace: &'a mut Namespace, limits: &'a Limits) -> Self {
        Self {
            namespace,
            limits,
            builtins: BuiltinRegistry::new(),
            depth: 0,
        }
    }

    fn call(&mut self, func: &Value, args: Vec<Value>) -> Result<Value> {
        match func {
            Value::Function(function) => {
                let function = Rc::clone(function);
                self.call_user_function(&function, args)
            }
            Value::Builtin(builtin) => builtin.call(&args),
            Value::BoundMethod(method) => method.receiver.call_method(method.name, &args),
            other => Err(fault!(
                TypeError,
                "'{}' object is not callable",
                other.type_name()
            )),
        }
    }

    fn call_user_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value> {
        let expected = function.code.arg_count;
        if args.len() != expected {
            return Err(fault!(
                TypeError,
                "{}() takes {} positional argument{} but {} {} given",
                function.name,
                expected,
                if expected == 1 { "" } else { "s" },
                args.len(),
                if args.len() == 1 { "was" } else { "were" }
            ));
        }
        if self.depth >= self.limits.max_recursion_depth {
            return Err(fault!(RecursionError, "maximum recursion depth exceeded"));
        }

        trace!(function = %function.name, depth = self.depth + 1, "call");
        self.depth += 1;
        let result = self.execute(&function.code, args);
        self.depth -= 1;
        result
    }

    fn execute(&mut self, code: &CodeObject, args: Vec<Value>) -> Result<Value> {
        let mut frame = Frame::new(code);
        for (slot, arg) in frame.locals.iter_mut().zip(args) {
            *slot = Some(arg);
        }

        loop {
            let pc = frame.pc;
            let Some(&instr) = code.instructions.get(pc) else {
                return Err(with_span(
                    fault!(SystemError, "instruction pointer {} out of range in {}", pc, code.name),
                    code.span_at(pc.saturating_sub(1)),
                ));
            };
            frame.pc += 1;

            match self.step(&mut frame, instr) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(err) => return Err(with_span(err, code.span_at(pc))),
            }
        }
    }

    /// Executes one instruction. Returns the frame's result on `ReturnValue`.
    fn step(&mut self, frame: &mut Frame<'_>, instr: Instruction) -> Result<Option<Value>> {
        match instr {
            Instruction::LoadConst(i) => {
                let value = match frame.constant(i)? {
                    Constant::None => Value::None,
                    Constant::Bool(b) => Value::Bool(*b),
                    Constant::Int(n) => Value::Int(*n),
                    Constant::Float(x) => Value::Float(*x),
                    Constant::Str(s) => Value::Str(s.clone()),
                    Constant::Code(code) => {
                        return Err(fault!(
                            SystemError,
                            "code object {} loaded as a value",
                            code.name
                        ));
                    }
                };
                frame.push(value);
            }

            Instruction::LoadName(i) => {
                let name = frame.name(i)?;
                let value = match self.namespace.get(name) {
                    Some(value) => value.clone(),
                    None => self
                        .builtins
                        .get(name)
                        .ok_or_else(|| fault!(NameError, "name '{}' is not defined", name))?,
                };
                frame.push(value);
            }

            Instruction::StoreName(i) => {
                let name = frame.name(i)?;
                let value = frame.pop()?;
                self.namespace.insert(name, value);
            }

            Instruction::LoadFast(i) => {
                let value = frame.local_slot(i)?.clone();
                match value {
                    Some(value) => frame.push(value),
                    None => {
                        let name = frame.code.locals.get(i as usize).map_or("?", String::as_str);
                        return Err(fault!(
                            UnboundLocalError,
                            "cannot access local variable '{}' where it is not associated with a value",
                            name
                        ));
                    }
                }
            }

            Instruction::StoreFast(i) => {
                let value = frame.pop()?;
                *frame.local_slot(i)? = Some(value);
            }

            Instruction::LoadAttr(i) => {
                let name = frame.name(i)?;
                let object = frame.pop()?;
                frame.push(object.get_attribute(name)?);
            }

            Instruction::StoreAttr(i) => {
                let name = frame.name(i)?;
                let object = frame.pop()?;
                let value = frame.pop()?;
                object.set_attribute(name, value)?;
            }

            Instruction::LoadSubscript => {
                let index = frame.pop()?;
                let object = frame.pop()?;
                frame.push(object.get_item(&index)?);
            }

            Instruction::StoreSubscript => {
                let index = frame.pop()?;
                let object = frame.pop()?;
                let value = frame.pop()?;
                object.set_item(index, value)?;
            }

            Instruction::BinaryOp(op) => {
                let right = frame.pop()?;
                let left = frame.pop()?;
                frame.push(eval_binary_op(&left, op, &right)?);
            }

            Instruction::UnaryOp(op) => {
                let operand = frame.pop()?;
                frame.push(eval_unary_op(op, &operand)?);
            }

            Instruction::Compare(op) => {
                let right = frame.pop()?;
                let left = frame.pop()?;
                frame.push(Value::Bool(eval_compare(&left, op, &right)?));
            }

            Instruction::BuildList(n) => {
                let items = frame.pop_n(n as usize)?;
                frame.push(Value::list(items));
            }

            Instruction::BuildTuple(n) => {
                let items = frame.pop_n(n as usize)?;
                frame.push(Value::tuple(items));
            }

            Instruction::BuildDict(n) => {
                let items = frame.pop_n(2 * n as usize)?;
                let mut dict = Dict::new();
                let mut items = items.into_iter();
                while let (Some(key), Some(value)) = (items.next(), items.next()) {
                    dict.insert(key, value)?;
                }
                frame.push(Value::dict(dict));
            }

            Instruction::UnpackSequence(n) => {
                let expected = n as usize;
                let items = frame.pop()?.to_vec()?;
                if items.len() < expected {
                    return Err(fault!(
                        ValueError,
                        "not enough values to unpack (expected {}, got {})",
                        expected,
                        items.len()
                    ));
                }
                if items.len() > expected {
                    return Err(fault!(
                        ValueError,
                        "too many values to unpack (expected {})",
                        expected
                    ));
                }
                frame.stack.extend(items.into_iter().rev());
            }

            Instruction::Call(n) => {
                let args = frame.pop_n(n as usize)?;
                let func = frame.pop()?;
                let result = self.call(&func, args)?;
                frame.push(result);
            }

            Instruction::MakeFunction(i) => {
                let Constant::Code(code) = frame.constant(i)? else {
                    return Err(fault!(SystemError, "constant {} is not a code object", i));
                };
                frame.push(Value::Function(Rc::new(Function {
                    name: code.name.clone(),
                    code: Arc::clone(code),
                })));
            }

            Instruction::Pop => {
                frame.pop()?;
            }

            Instruction::DupTop => {
                let top = frame.top()?.clone();
                frame.push(top);
            }

            Instruction::DupTwo => {
                let pair = frame.pop_n(2)?;
                frame.stack.extend(pair.iter().cloned());
                frame.stack.extend(pair);
            }

            Instruction::RotTwo => {
                let len = frame.stack.len();
                if len < 2 {
                    return Err(fault!(SystemError, "stack underflow in {}", frame.code.name));
                }
                frame.stack.swap(len - 1, len - 2);
            }

            Instruction::RotThree => {
                let len = frame.stack.len();
                if len < 3 {
                    return Err(fault!(SystemError, "stack underflow in {}", frame.code.name));
                }
                frame.stack[len - 3..].rotate_right(1);
            }

            Instruction::Jump(target) => frame.pc = target as usize,

            Instruction::PopJumpIfFalse(target) => {
                if !frame.pop()?.is_truthy() {
                    frame.pc = target as usize;
                }
            }

            Instruction::PopJumpIfTrue(target) => {
                if frame.pop()?.is_truthy() {
                    frame.pc = target as usize;
                }
            }

            Instruction::JumpIfFalseOrPop(target) => {
                if frame.top()?.is_truthy() {
                    frame.pop()?;
                } else {
                    frame.pc = target as usize;
                }
            }

            Instruction::JumpIfTrueOrPop(target) => {
                if frame.top()?.is_truthy() {
                    frame.pc = target as usize;
                } else {
                    frame.pop()?;
                }
            }

            Instruction::GetIter => {
                let iterable = frame.pop()?;
                frame.iterators.push(iterable.iterate()?);
            }

            Instruction::ForIter(target) => {
                let Some(iter) = frame.iterators.last_mut() else {
                    return Err(fault!(SystemError, "no active iterator in {}", frame.code.name));
                };
                match iter.next() {
                    Some(item) => frame.push(item),
                    None => {
                        frame.iterators.pop();
                        frame.pc = target as usize;
                    }
                }
            }

            Instruction::PopIter => {
                if frame.iterators.pop().is_none() {
                    return Err(fault!(SystemError, "no active iterator in {}", frame.code.name));
                }
            }

            Instruction::ReturnValue => return Ok(Some(frame.pop()?)),
        }
        Ok(None)
    }
}
