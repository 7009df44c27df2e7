use crate::builtins::Builtin;
use crate::bytecode::CodeObject;
use crate::fault;
use anyhow::Result;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A runtime value.
///
/// Scalars are stored inline. Lists and dicts are shared and mutable, so
/// `b = a; b.append(1)` is visible through `a`. Tuples share their items but
/// never change.
#[derive(Debug, Clone)]
pub enum Value {
    // Scalars
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),

    // Containers
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<Dict>>),
    Range { start: i64, stop: i64, step: i64 },

    // Callables
    Function(Rc<Function>),
    Builtin(Builtin),
    BoundMethod(Rc<BoundMethod>),
}

/// A user-defined function. Globals are looked up in whatever namespace the
/// function is called with.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub code: Arc<CodeObject>,
}

/// A method looked up on a receiver, waiting to be called.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub receiver: Value,
    pub name: &'static str,
}

impl Value {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Rc::new(items))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    // ========================================================================
    // TYPE CHECKS
    // ========================================================================

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range { .. } => "range",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::BoundMethod(_) => "builtin_function_or_method",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Builtin(_) | Value::BoundMethod(_)
        )
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(dict) => !dict.borrow().is_empty(),
            Value::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            Value::Function(_) | Value::Builtin(_) | Value::BoundMethod(_) => true,
        }
    }

    /// Integer view of ints and bools.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Float view of any number.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    // ========================================================================
    // EQUALITY, IDENTITY AND HASHING
    // ========================================================================

    /// Structural equality. Numbers compare by value across `bool`, `int`
    /// and `float`. Fails with a `RecursionError` fault once the containers
    /// nest deeper than [`MAX_VALUE_DEPTH`], which two distinct
    /// self-referential lists always do.
    pub fn py_eq(&self, other: &Value) -> Result<bool> {
        self.eq_at(other, 0)
    }

    fn eq_at(&self, other: &Value, depth: usize) -> Result<bool> {
        let eq = match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                match (self.as_float(), other.as_float()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                self.as_int() == other.as_int()
            }
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || seq_eq(&a.borrow(), &b.borrow(), nested(depth, "comparison")?)?
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                Rc::ptr_eq(a, b) || seq_eq(a, b, nested(depth, "comparison")?)?
            }
            (Value::Dict(a), Value::Dict(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().eq_at(&b.borrow(), nested(depth, "comparison")?)?
            }
            (
                Value::Range { start: a0, stop: a1, step: a2 },
                Value::Range { start: b0, stop: b1, step: b2 },
            ) => (a0, a1, a2) == (b0, b1, b2),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                a.name == b.name && a.receiver.is_same(&b.receiver)
            }
            _ => false,
        };
        Ok(eq)
    }

    /// Identity, as tested by `is`.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Key used to index dicts. Fails for mutable containers.
    pub fn hash_key(&self) -> Result<HashKey> {
        self.hash_key_at(0)
    }

    fn hash_key_at(&self, depth: usize) -> Result<HashKey> {
        let key = match self {
            Value::None => HashKey::None,
            Value::Bool(b) => HashKey::Int(*b as i64),
            Value::Int(n) => HashKey::Int(*n),
            Value::Float(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    HashKey::Int(*f as i64)
                } else {
                    HashKey::Float(f.to_bits())
                }
            }
            Value::Str(s) => HashKey::Str(s.clone()),
            Value::Tuple(items) => {
                let depth = nested(depth, "hashing")?;
                HashKey::Tuple(
                    items
                        .iter()
                        .map(|item| item.hash_key_at(depth))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            Value::Range { start, stop, step } => HashKey::Tuple(vec![
                HashKey::Str("range".to_string()),
                HashKey::Int(*start),
                HashKey::Int(*stop),
                HashKey::Int(*step),
            ]),
            Value::Function(f) => HashKey::Identity(Rc::as_ptr(f) as *const () as usize),
            Value::Builtin(b) => HashKey::Str(format!("<builtin {}>", b.name)),
            Value::List(_) | Value::Dict(_) | Value::BoundMethod(_) => {
                return Err(fault!(TypeError, "unhashable type: '{}'", self.type_name()));
            }
        };
        Ok(key)
    }

    // ========================================================================
    // ITERATION
    // ========================================================================

    pub fn iterate(&self) -> Result<ValueIter> {
        let iter = match self {
            Value::List(items) => ValueIter::List {
                items: Rc::clone(items),
                index: 0,
            },
            Value::Tuple(items) => ValueIter::Items {
                items: Rc::clone(items),
                index: 0,
            },
            Value::Str(s) => ValueIter::Items {
                items: Rc::new(s.chars().map(|c| Value::Str(c.to_string())).collect()),
                index: 0,
            },
            Value::Dict(dict) => ValueIter::Items {
                items: Rc::new(dict.borrow().keys().cloned().collect()),
                index: 0,
            },
            Value::Range { start, stop, step } => ValueIter::Range {
                next: *start,
                stop: *stop,
                step: *step,
            },
            other => {
                return Err(fault!(TypeError, "'{}' object is not iterable", other.type_name()));
            }
        };
        Ok(iter)
    }

    /// Collects every item of an iterable.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            other => Ok(other.iterate()?.collect()),
        }
    }

    // ========================================================================
    // FORMATTING
    // ========================================================================

    /// The `repr()` of the value.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out, &mut Vec::new());
        out
    }

    /// `seen` holds the containers being written, outermost first. Past
    /// [`MAX_VALUE_DEPTH`] containers are elided as `...`.
    fn write_repr(&self, out: &mut String, seen: &mut Vec<usize>) {
        use std::fmt::Write;

        if seen.len() >= MAX_VALUE_DEPTH
            && matches!(self, Value::List(_) | Value::Tuple(_) | Value::Dict(_))
        {
            out.push_str("...");
            return;
        }

        match self {
            Value::None => out.push_str("None"),
            Value::Bool(true) => out.push_str("True"),
            Value::Bool(false) => out.push_str("False"),
            Value::Int(n) => {
                let _ = write!(out, "{}", n);
            }
            Value::Float(f) => out.push_str(&format_float(*f)),
            Value::Str(s) => out.push_str(&quote_str(s)),
            Value::List(items) => {
                let addr = Rc::as_ptr(items) as *const () as usize;
                if seen.contains(&addr) {
                    out.push_str("[...]");
                    return;
                }
                seen.push(addr);
                out.push('[');
                write_items(&items.borrow(), out, seen);
                out.push(']');
                seen.pop();
            }
            Value::Tuple(items) => {
                seen.push(Rc::as_ptr(items) as *const () as usize);
                out.push('(');
                write_items(items, out, seen);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
                seen.pop();
            }
            Value::Dict(dict) => {
                let addr = Rc::as_ptr(dict) as *const () as usize;
                if seen.contains(&addr) {
                    out.push_str("{...}");
                    return;
                }
                seen.push(addr);
                out.push('{');
                for (i, (key, value)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, seen);
                    out.push_str(": ");
                    value.write_repr(out, seen);
                }
                out.push('}');
                seen.pop();
            }
            Value::Range { start, stop, step } => {
                if *step == 1 {
                    let _ = write!(out, "range({}, {})", start, stop);
                } else {
                    let _ = write!(out, "range({}, {}, {})", start, stop, step);
                }
            }
            Value::Function(func) => {
                let _ = write!(out, "<function {}>", func.name);
            }
            Value::Builtin(builtin) => {
                let _ = write!(out, "<built-in function {}>", builtin.name);
            }
            Value::BoundMethod(method) => {
                let _ = write!(
                    out,
                    "<built-in method {} of {} object>",
                    method.name,
                    method.receiver.type_name()
                );
            }
        }
    }
}

/// `str()` of the value: strings print bare, everything else as `repr()`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

/// Falls back to `false` where `py_eq` would raise.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.py_eq(other).unwrap_or(false)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

/// Deepest container nesting that equality, ordering, hashing and `repr`
/// descend into.
pub const MAX_VALUE_DEPTH: usize = 200;

/// Depth for the items of a container at `depth`.
pub(crate) fn nested(depth: usize, what: &str) -> Result<usize> {
    if depth >= MAX_VALUE_DEPTH {
        return Err(fault!(RecursionError, "maximum recursion depth exceeded in {}", what));
    }
    Ok(depth + 1)
}

fn seq_eq(a: &[Value], b: &[Value], depth: usize) -> Result<bool> {
    if a.len() != b.len() {
        return Ok(false);
    }
    for (x, y) in a.iter().zip(b) {
        if !x.eq_at(y, depth)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn write_items(items: &[Value], out: &mut String, seen: &mut Vec<usize>) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_repr(out, seen);
    }
}

/// Formats a float the way `repr()` shows it: always with a fractional part
/// or an exponent.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let abs = f.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let s = format!("{:e}", f);
        if let Some((mantissa, exp)) = s.split_once('e')
            && let Ok(exp) = exp.parse::<i32>()
        {
            let sign = if exp < 0 { '-' } else { '+' };
            return format!("{}e{}{:02}", mantissa, sign, exp.abs());
        }
        return s;
    }

    let s = format!("{}", f);
    if s.contains('.') { s } else { format!("{}.0", s) }
}

fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

pub(crate) fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    let (start, stop, step) = (start as i128, stop as i128, step as i128);
    let len = if step > 0 && start < stop {
        (stop - start - 1) / step + 1
    } else if step < 0 && start > stop {
        (start - stop - 1) / (-step) + 1
    } else {
        0
    };
    len as i64
}

// ============================================================================
// HASH KEYS AND DICTS
// ============================================================================

/// Normalised hashable view of a [`Value`]. `True`, `1` and `1.0` map to the
/// same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(String),
    Tuple(Vec<HashKey>),
    Identity(usize),
}

/// Insertion-ordered mapping.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<HashKey, usize>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Result<Option<&Value>> {
        let hk = key.hash_key()?;
        Ok(self.index.get(&hk).map(|&i| &self.entries[i].1))
    }

    pub fn contains_key(&self, key: &Value) -> Result<bool> {
        Ok(self.index.contains_key(&key.hash_key()?))
    }

    /// Inserts or overwrites. An existing entry keeps its original key and
    /// position.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<()> {
        let hk = key.hash_key()?;
        match self.index.get(&hk) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(hk, self.entries.len());
                self.entries.push((key, value));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    fn eq_at(&self, other: &Dict, depth: usize) -> Result<bool> {
        if self.len() != other.len() {
            return Ok(false);
        }
        for (key, value) in &self.entries {
            match other.get(key)? {
                Some(theirs) if theirs.eq_at(value, depth)? => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

// ============================================================================
// ITERATORS
// ============================================================================

/// Iteration state for a `for` loop or a builtin consuming an iterable.
#[derive(Debug, Clone)]
pub enum ValueIter {
    /// Reads the list live, so appends during iteration are seen.
    List {
        items: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    Items {
        items: Rc<Vec<Value>>,
        index: usize,
    },
    Range {
        next: i64,
        stop: i64,
        step: i64,
    },
}

impl Iterator for ValueIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            ValueIter::List { items, index } => {
                let item = items.borrow().get(*index).cloned()?;
                *index += 1;
                Some(item)
            }
            ValueIter::Items { items, index } => {
                let item = items.get(*index).cloned()?;
                *index += 1;
                Some(item)
            }
            ValueIter::Range { next, stop, step } => {
                let done = if *step > 0 { *next >= *stop } else { *next <= *stop };
                if done {
                    return None;
                }
                let current = *next;
                match next.checked_add(*step) {
                    Some(n) => *next = n,
                    None => *next = *stop,
                }
                Some(Value::Int(current))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_types() {
        assert!(Value::Int(1).py_eq(&Value::Float(1.0)).unwrap());
        assert!(Value::Bool(true).py_eq(&Value::Int(1)).unwrap());
        assert!(!Value::Int(1).py_eq(&Value::Str("1".into())).unwrap());
    }

    #[test]
    fn hash_keys_normalise_numbers() {
        let one = Value::Int(1).hash_key().unwrap();
        assert_eq!(Value::Float(1.0).hash_key().unwrap(), one);
        assert_eq!(Value::Bool(true).hash_key().unwrap(), one);
        assert_ne!(Value::Float(1.5).hash_key().unwrap(), one);
    }

    #[test]
    fn lists_are_unhashable() {
        let err = Value::list(vec![]).hash_key().unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn float_repr() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e-5), "1.5e-05");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn container_repr() {
        let list = Value::list(vec![Value::Int(1), Value::str("a"), Value::None]);
        assert_eq!(list.repr(), "[1, 'a', None]");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).repr(), "(1,)");
        assert_eq!(Value::tuple(vec![]).repr(), "()");

        let mut dict = Dict::new();
        dict.insert(Value::str("k"), Value::Bool(true)).unwrap();
        assert_eq!(Value::dict(dict).repr(), "{'k': True}");
    }

    #[test]
    fn recursive_list_repr() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.repr(), "[1, [...]]");
    }

    fn self_referential_list() -> Value {
        let list = Value::list(vec![]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        list
    }

    fn fault_kind(err: &anyhow::Error) -> Option<crate::error::FaultKind> {
        err.downcast_ref::<crate::error::RuntimeFault>().map(|f| f.kind)
    }

    #[test]
    fn distinct_cyclic_lists_fail_to_compare() {
        let (a, b) = (self_referential_list(), self_referential_list());
        assert!(a.py_eq(&a).unwrap());

        let err = a.py_eq(&b).unwrap_err();
        assert_eq!(fault_kind(&err), Some(crate::error::FaultKind::RecursionError));
        assert_eq!(
            err.to_string(),
            "RecursionError: maximum recursion depth exceeded in comparison"
        );
        assert_ne!(a, b);
    }

    #[test]
    fn deeply_nested_values_are_bounded() {
        let mut tuple = Value::tuple(vec![]);
        let mut list = Value::list(vec![]);
        for _ in 0..MAX_VALUE_DEPTH * 5 {
            tuple = Value::tuple(vec![tuple]);
            list = Value::list(vec![list]);
        }

        let err = tuple.hash_key().unwrap_err();
        assert_eq!(fault_kind(&err), Some(crate::error::FaultKind::RecursionError));

        let repr = list.repr();
        assert!(repr.starts_with("[[[["));
        assert!(repr.contains("..."));
        assert_eq!(repr.matches('[').count(), MAX_VALUE_DEPTH);
    }

    #[test]
    fn string_repr_picks_quotes() {
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::str("a\nb").repr(), "'a\\nb'");
        assert_eq!(Value::str("plain").to_string(), "plain");
    }

    #[test]
    fn dict_keeps_insertion_order() {
        let mut dict = Dict::new();
        dict.insert(Value::str("b"), Value::Int(1)).unwrap();
        dict.insert(Value::str("a"), Value::Int(2)).unwrap();
        dict.insert(Value::str("b"), Value::Int(3)).unwrap();
        let keys: Vec<_> = dict.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(dict.get(&Value::str("b")).unwrap(), Some(&Value::Int(3)));
    }

    #[test]
    fn range_iteration() {
        let items: Vec<_> = Value::Range { start: 5, stop: 0, step: -2 }
            .iterate()
            .unwrap()
            .collect();
        assert_eq!(items, vec![Value::Int(5), Value::Int(3), Value::Int(1)]);
        assert_eq!(range_len(0, 10, 3), 4);
        assert_eq!(range_len(0, -1, 1), 0);
    }

    #[test]
    fn ints_are_not_iterable() {
        let err = Value::Int(3).iterate().unwrap_err();
        assert_eq!(err.to_string(), "TypeError: 'int' object is not iterable");
    }
}
