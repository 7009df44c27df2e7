use crate::value::{Value, nested};
use crate::{bail_fault, fault};
use anyhow::Result;
use coderun_syntax::ast::{BinaryOp, CompareOp, UnaryOp};
use coderun_syntax::Span;
use std::cmp::Ordering;

pub fn eval_binary_op(left: &Value, op: BinaryOp, right: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add => eval_add(left, right),
        BinaryOp::Sub => eval_sub(left, right),
        BinaryOp::Mul => eval_mul(left, right),
        BinaryOp::Div => eval_div(left, right),
        BinaryOp::FloorDiv => eval_floor_div(left, right),
        BinaryOp::Mod => eval_mod(left, right),
        BinaryOp::Pow => eval_pow(left, right),
    }
}

pub fn eval_unary_op(op: UnaryOp, operand: &Value) -> Result<Value> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, Value::Int(_) | Value::Bool(_)) => {
            let n = operand.as_int().unwrap_or_default();
            n.checked_neg().map(Value::Int).ok_or_else(overflow)
        }
        (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::Pos, Value::Int(_) | Value::Bool(_)) => {
            Ok(Value::Int(operand.as_int().unwrap_or_default()))
        }
        (UnaryOp::Neg, other) => bail_fault!(
            None::<Span>,
            TypeError,
            "bad operand type for unary -: '{}'",
            other.type_name()
        ),
        (UnaryOp::Pos, other) => bail_fault!(
            None::<Span>,
            TypeError,
            "bad operand type for unary +: '{}'",
            other.type_name()
        ),
    }
}

/// Evaluates a single comparison (one link of a chain).
pub fn eval_compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool> {
    let ordered = |test: fn(Ordering) -> bool| -> Result<bool> {
        Ok(partial_order(left, right, op.symbol())?.is_some_and(test))
    };

    match op {
        CompareOp::Eq => left.py_eq(right),
        CompareOp::NotEq => left.py_eq(right).map(|eq| !eq),
        CompareOp::Is => Ok(left.is_same(right)),
        CompareOp::IsNot => Ok(!left.is_same(right)),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
        CompareOp::Lt => ordered(Ordering::is_lt),
        CompareOp::LtE => ordered(Ordering::is_le),
        CompareOp::Gt => ordered(Ordering::is_gt),
        CompareOp::GtE => ordered(Ordering::is_ge),
    }
}

/// Orders two values. `None` means unordered (a NaN was involved).
pub fn partial_order(left: &Value, right: &Value, symbol: &str) -> Result<Option<Ordering>> {
    order_at(left, right, symbol, 0)
}

fn order_at(left: &Value, right: &Value, symbol: &str, depth: usize) -> Result<Option<Ordering>> {
    if let Some((a, b)) = ints(left, right) {
        return Ok(Some(a.cmp(&b)));
    }
    if let Some((a, b)) = floats(left, right) {
        return Ok(a.partial_cmp(&b));
    }

    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            let (a, b) = (a.borrow().clone(), b.borrow().clone());
            sequence_order(&a, &b, symbol, nested(depth, "comparison")?)
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            sequence_order(a, b, symbol, nested(depth, "comparison")?)
        }
        _ => bail_fault!(
            None::<Span>,
            TypeError,
            "'{}' not supported between instances of '{}' and '{}'",
            symbol,
            left.type_name(),
            right.type_name()
        ),
    }
}

fn sequence_order(a: &[Value], b: &[Value], symbol: &str, depth: usize) -> Result<Option<Ordering>> {
    for (x, y) in a.iter().zip(b) {
        if !x.py_eq(y)? {
            return order_at(x, y, symbol, depth);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// Membership test: `item in container`.
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match container {
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(needle.as_str())),
            other => bail_fault!(
                None::<Span>,
                TypeError,
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ),
        },
        Value::List(items) => position_of(&items.borrow(), item).map(|i| i.is_some()),
        Value::Tuple(items) => position_of(items, item).map(|i| i.is_some()),
        Value::Dict(dict) => dict.borrow().contains_key(item),
        Value::Range { start, stop, step } => {
            let n = match item {
                Value::Float(f) if f.fract() == 0.0 => *f as i64,
                other => match other.as_int() {
                    Some(n) => n,
                    None => return Ok(false),
                },
            };
            let in_bounds = if *step > 0 {
                *start <= n && n < *stop
            } else {
                *stop < n && n <= *start
            };
            Ok(in_bounds && (n as i128 - *start as i128) % (*step as i128) == 0)
        }
        other => bail_fault!(
            None::<Span>,
            TypeError,
            "argument of type '{}' is not iterable",
            other.type_name()
        ),
    }
}

/// Index of the first item equal to `item`.
pub fn position_of(items: &[Value], item: &Value) -> Result<Option<usize>> {
    for (i, x) in items.iter().enumerate() {
        if x.py_eq(item)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

// ============================================================================
// ARITHMETIC
// ============================================================================

/// Both operands as integers, when both are `int` or `bool`.
fn ints(left: &Value, right: &Value) -> Option<(i64, i64)> {
    match (left, right) {
        (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
            Some((left.as_int()?, right.as_int()?))
        }
        _ => None,
    }
}

/// Both operands as floats, when both are numbers.
fn floats(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_float()?, right.as_float()?))
}

fn overflow() -> anyhow::Error {
    fault!(OverflowError, "integer overflow")
}

fn unsupported(symbol: &str, left: &Value, right: &Value) -> anyhow::Error {
    fault!(
        TypeError,
        "unsupported operand type(s) for {}: '{}' and '{}'",
        symbol,
        left.type_name(),
        right.type_name()
    )
}

fn eval_add(left: &Value, right: &Value) -> Result<Value> {
    if let Some((a, b)) = ints(left, right) {
        return a.checked_add(b).map(Value::Int).ok_or_else(overflow);
    }
    if let Some((a, b)) = floats(left, right) {
        return Ok(Value::Float(a + b));
    }

    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::tuple(items))
        }
        _ => Err(unsupported("+", left, right)),
    }
}

fn eval_sub(left: &Value, right: &Value) -> Result<Value> {
    if let Some((a, b)) = ints(left, right) {
        return a.checked_sub(b).map(Value::Int).ok_or_else(overflow);
    }
    match floats(left, right) {
        Some((a, b)) => Ok(Value::Float(a - b)),
        None => Err(unsupported("-", left, right)),
    }
}

fn eval_mul(left: &Value, right: &Value) -> Result<Value> {
    if let Some((a, b)) = ints(left, right) {
        return a.checked_mul(b).map(Value::Int).ok_or_else(overflow);
    }
    if let Some((a, b)) = floats(left, right) {
        return Ok(Value::Float(a * b));
    }

    let (seq, count) = match (left, right) {
        (seq, Value::Int(_) | Value::Bool(_)) => (seq, right.as_int().unwrap_or_default()),
        (Value::Int(_) | Value::Bool(_), seq) => (seq, left.as_int().unwrap_or_default()),
        _ => return Err(unsupported("*", left, right)),
    };
    let count = usize::try_from(count).unwrap_or(0);

    match seq {
        Value::Str(s) => match repeat_len(s.len(), count)? {
            0 => Ok(Value::Str(String::new())),
            _ => Ok(Value::Str(s.repeat(count))),
        },
        Value::List(items) => Ok(Value::list(repeat_items(&items.borrow(), count)?)),
        Value::Tuple(items) => Ok(Value::tuple(repeat_items(items, count)?)),
        _ => Err(unsupported("*", left, right)),
    }
}

/// Longest sequence (items, or bytes for strings) that `*` builds.
pub const MAX_REPEAT_LEN: usize = 1 << 24;

fn repeat_len(len: usize, count: usize) -> Result<usize> {
    match len.checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(total),
        _ => Err(fault!(OverflowError, "repeated sequence is too long")),
    }
}

fn repeat_items(items: &[Value], count: usize) -> Result<Vec<Value>> {
    let total = repeat_len(items.len(), count)?;
    if total == 0 {
        return Ok(Vec::new());
    }
    let mut out = Vec::with_capacity(total);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

fn eval_div(left: &Value, right: &Value) -> Result<Value> {
    let Some((a, b)) = floats(left, right) else {
        return Err(unsupported("/", left, right));
    };
    if b == 0.0 {
        bail_fault!(None::<Span>, ZeroDivisionError, "division by zero");
    }
    Ok(Value::Float(a / b))
}

fn eval_floor_div(left: &Value, right: &Value) -> Result<Value> {
    if let Some((a, b)) = ints(left, right) {
        if b == 0 {
            bail_fault!(None::<Span>, ZeroDivisionError, "integer division or modulo by zero");
        }
        let q = a.checked_div(b).ok_or_else(overflow)?;
        let adjust = a % b != 0 && ((a < 0) != (b < 0));
        return Ok(Value::Int(if adjust { q - 1 } else { q }));
    }

    let Some((a, b)) = floats(left, right) else {
        return Err(unsupported("//", left, right));
    };
    if b == 0.0 {
        bail_fault!(None::<Span>, ZeroDivisionError, "float floor division by zero");
    }
    Ok(Value::Float((a / b).floor()))
}

fn eval_mod(left: &Value, right: &Value) -> Result<Value> {
    if let Some((a, b)) = ints(left, right) {
        if b == 0 {
            bail_fault!(None::<Span>, ZeroDivisionError, "integer division or modulo by zero");
        }
        let r = a.checked_rem(b).unwrap_or(0);
        let r = if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r };
        return Ok(Value::Int(r));
    }

    let Some((a, b)) = floats(left, right) else {
        return Err(unsupported("%", left, right));
    };
    if b == 0.0 {
        bail_fault!(None::<Span>, ZeroDivisionError, "float modulo");
    }
    let r = a % b;
    let r = if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r };
    Ok(Value::Float(r))
}

fn eval_pow(left: &Value, right: &Value) -> Result<Value> {
    if let Some((a, b)) = ints(left, right) {
        if b >= 0 {
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            return a.checked_pow(exp).map(Value::Int).ok_or_else(overflow);
        }
        if a == 0 {
            bail_fault!(
                None::<Span>,
                ZeroDivisionError,
                "0.0 cannot be raised to a negative power"
            );
        }
        return Ok(Value::Float((a as f64).powf(b as f64)));
    }

    let Some((a, b)) = floats(left, right) else {
        return Err(unsupported("** or pow()", left, right));
    };
    if a == 0.0 && b < 0.0 {
        bail_fault!(
            None::<Span>,
            ZeroDivisionError,
            "0.0 cannot be raised to a negative power"
        );
    }
    Ok(Value::Float(a.powf(b)))
}
