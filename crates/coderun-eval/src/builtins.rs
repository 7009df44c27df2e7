use crate::fault;
use crate::ops::{eval_binary_op, partial_order};
use crate::value::{Value, format_float, range_len};
use anyhow::Result;
use coderun_syntax::ast::BinaryOp;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;

pub type BuiltinFn = fn(&[Value]) -> Result<Value>;

/// A named native function.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl Builtin {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.func)(args)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<built-in function {}>", self.name)
    }
}

static BUILTIN_FUNCTIONS: Lazy<FxHashMap<&'static str, BuiltinFn>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("print", builtin_print as BuiltinFn);
    map.insert("len", builtin_len as BuiltinFn);
    map.insert("range", builtin_range as BuiltinFn);
    map.insert("abs", builtin_abs as BuiltinFn);
    map.insert("min", builtin_min as BuiltinFn);
    map.insert("max", builtin_max as BuiltinFn);
    map.insert("sum", builtin_sum as BuiltinFn);
    map.insert("str", builtin_str as BuiltinFn);
    map.insert("repr", builtin_repr as BuiltinFn);
    map.insert("int", builtin_int as BuiltinFn);
    map.insert("float", builtin_float as BuiltinFn);
    map.insert("bool", builtin_bool as BuiltinFn);
    map.insert("list", builtin_list as BuiltinFn);
    map.insert("tuple", builtin_tuple as BuiltinFn);
    map.insert("sorted", builtin_sorted as BuiltinFn);
    map
});

/// Fallback scope consulted after the namespace when a global name is loaded.
#[derive(Clone)]
pub struct BuiltinRegistry;

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        BUILTIN_FUNCTIONS
            .get_key_value(name)
            .map(|(&name, &func)| Value::Builtin(Builtin { name, func }))
    }

    pub fn has(&self, name: &str) -> bool {
        BUILTIN_FUNCTIONS.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = BUILTIN_FUNCTIONS.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("exactly {}", min)
        } else if args.len() < min {
            format!("at least {}", min)
        } else {
            format!("at most {}", max)
        };
        return Err(fault!(
            TypeError,
            "{}() takes {} argument{} ({} given)",
            name,
            expected,
            if min == max && min == 1 { "" } else { "s" },
            args.len()
        ));
    }
    Ok(())
}

fn index_arg(name: &str, value: &Value) -> Result<i64> {
    value.as_int().ok_or_else(|| {
        fault!(
            TypeError,
            "'{}' object cannot be interpreted as an integer (in {}())",
            value.type_name(),
            name
        )
    })
}

pub fn builtin_print(args: &[Value]) -> Result<Value> {
    let line: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    println!("{}", line.join(" "));
    Ok(Value::None)
}

pub fn builtin_len(args: &[Value]) -> Result<Value> {
    expect_args("len", args, 1, 1)?;
    let len = match &args[0] {
        Value::Str(s) => s.chars().count() as i64,
        Value::List(items) => items.borrow().len() as i64,
        Value::Tuple(items) => items.len() as i64,
        Value::Dict(dict) => dict.borrow().len() as i64,
        Value::Range { start, stop, step } => range_len(*start, *stop, *step),
        other => return Err(fault!(
            TypeError,
            "object of type '{}' has no len()",
            other.type_name()
        )),
    };
    Ok(Value::Int(len))
}

pub fn builtin_range(args: &[Value]) -> Result<Value> {
    expect_args("range", args, 1, 3)?;
    let (start, stop, step) = match args {
        [stop] => (0, index_arg("range", stop)?, 1),
        [start, stop] => (index_arg("range", start)?, index_arg("range", stop)?, 1),
        [start, stop, step] => (
            index_arg("range", start)?,
            index_arg("range", stop)?,
            index_arg("range", step)?,
        ),
        _ => unreachable!("argument count checked above"),
    };
    if step == 0 {
        return Err(fault!(ValueError, "range() arg 3 must not be zero"));
    }
    Ok(Value::Range { start, stop, step })
}

pub fn builtin_abs(args: &[Value]) -> Result<Value> {
    expect_args("abs", args, 1, 1)?;
    match &args[0] {
        Value::Float(f) => Ok(Value::Float(f.abs())),
        v @ (Value::Int(_) | Value::Bool(_)) => v
            .as_int()
            .and_then(i64::checked_abs)
            .map(Value::Int)
            .ok_or_else(|| fault!(OverflowError, "integer overflow")),
        other => Err(fault!(
            TypeError,
            "bad operand type for abs(): '{}'",
            other.type_name()
        )),
    }
}

/// Shared body of `min()` and `max()`: one iterable or several arguments.
fn extreme(name: &str, args: &[Value], wanted: Ordering) -> Result<Value> {
    expect_args(name, args, 1, usize::MAX)?;
    let items = match args {
        [iterable] => iterable.to_vec()?,
        many => many.to_vec(),
    };

    let mut iter = items.into_iter();
    let Some(mut best) = iter.next() else {
        return Err(fault!(ValueError, "{}() arg is an empty sequence", name));
    };
    let symbol = if wanted == Ordering::Less { "<" } else { ">" };
    for item in iter {
        if partial_order(&item, &best, symbol)? == Some(wanted) {
            best = item;
        }
    }
    Ok(best)
}

pub fn builtin_min(args: &[Value]) -> Result<Value> {
    extreme("min", args, Ordering::Less)
}

pub fn builtin_max(args: &[Value]) -> Result<Value> {
    extreme("max", args, Ordering::Greater)
}

pub fn builtin_sum(args: &[Value]) -> Result<Value> {
    expect_args("sum", args, 1, 2)?;
    let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
    if matches!(total, Value::Str(_)) {
        return Err(fault!(TypeError, "sum() can't sum strings [use ''.join(seq) instead]"));
    }
    for item in args[0].iterate()? {
        total = eval_binary_op(&total, BinaryOp::Add, &item)?;
    }
    Ok(total)
}

pub fn builtin_str(args: &[Value]) -> Result<Value> {
    expect_args("str", args, 0, 1)?;
    Ok(Value::Str(args.first().map(|v| v.to_string()).unwrap_or_default()))
}

pub fn builtin_repr(args: &[Value]) -> Result<Value> {
    expect_args("repr", args, 1, 1)?;
    Ok(Value::Str(args[0].repr()))
}

pub fn builtin_int(args: &[Value]) -> Result<Value> {
    expect_args("int", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::Int(0));
    };

    match value {
        Value::Int(_) | Value::Bool(_) => Ok(Value::Int(value.as_int().unwrap_or_default())),
        Value::Float(f) => {
            if f.is_nan() {
                return Err(fault!(ValueError, "cannot convert float NaN to integer"));
            }
            if f.is_infinite() || *f >= i64::MAX as f64 || *f < i64::MIN as f64 {
                return Err(fault!(OverflowError, "cannot convert float {} to integer", format_float(*f)));
            }
            Ok(Value::Int(f.trunc() as i64))
        }
        Value::Str(s) => {
            let cleaned = s.trim().replace('_', "");
            cleaned.parse::<i64>().map(Value::Int).map_err(|_| {
                fault!(
                    ValueError,
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                )
            })
        }
        other => Err(fault!(
            TypeError,
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        )),
    }
}

pub fn builtin_float(args: &[Value]) -> Result<Value> {
    expect_args("float", args, 0, 1)?;
    let Some(value) = args.first() else {
        return Ok(Value::Float(0.0));
    };

    if let Some(f) = value.as_float() {
        return Ok(Value::Float(f));
    }
    match value {
        Value::Str(s) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.trim_start_matches(['+', '-']) {
                "inf" | "infinity" | "nan" => text.replace("infinity", "inf").parse::<f64>(),
                _ => text.replace('_', "").parse::<f64>(),
            };
            parsed.map(Value::Float).map_err(|_| {
                fault!(ValueError, "could not convert string to float: {}", value.repr())
            })
        }
        other => Err(fault!(
            TypeError,
            "float() argument must be a string or a number, not '{}'",
            other.type_name()
        )),
    }
}

pub fn builtin_bool(args: &[Value]) -> Result<Value> {
    expect_args("bool", args, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

pub fn builtin_list(args: &[Value]) -> Result<Value> {
    expect_args("list", args, 0, 1)?;
    match args.first() {
        Some(iterable) => Ok(Value::list(iterable.to_vec()?)),
        None => Ok(Value::list(Vec::new())),
    }
}

pub fn builtin_tuple(args: &[Value]) -> Result<Value> {
    expect_args("tuple", args, 0, 1)?;
    match args.first() {
        Some(Value::Tuple(items)) => Ok(Value::Tuple(items.clone())),
        Some(iterable) => Ok(Value::tuple(iterable.to_vec()?)),
        None => Ok(Value::tuple(Vec::new())),
    }
}

pub fn builtin_sorted(args: &[Value]) -> Result<Value> {
    expect_args("sorted", args, 1, 1)?;
    let mut items = args[0].to_vec()?;
    sort_values(&mut items)?;
    Ok(Value::list(items))
}

/// Stable sort with the language's ordering. The first failed comparison is
/// reported once the sort finishes.
pub fn sort_values(items: &mut [Value]) -> Result<()> {
    let failure: RefCell<Option<anyhow::Error>> = RefCell::new(None);
    items.sort_by(|a, b| {
        if failure.borrow().is_some() {
            return Ordering::Equal;
        }
        match partial_order(a, b, "<") {
            Ok(ord) => ord.unwrap_or(Ordering::Equal),
            Err(err) => {
                *failure.borrow_mut() = Some(err);
                Ordering::Equal
            }
        }
    });
    match failure.into_inner() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
