//! Attribute access, method calls and subscripting on [`Value`]s.

use crate::builtins::sort_values;
use crate::fault;
use crate::ops::position_of;
use crate::value::{BoundMethod, Value, range_len};
use anyhow::Result;
use std::rc::Rc;

const LIST_METHODS: &[&str] = &[
    "append", "pop", "extend", "insert", "index", "count", "reverse", "sort",
];
const DICT_METHODS: &[&str] = &["get", "keys", "values", "items"];
const STR_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "split",
    "join",
    "replace",
    "startswith",
    "endswith",
];

impl Value {
    // ========================================================================
    // ATTRIBUTES
    // ========================================================================

    /// Looks up `name` on the value. Only methods exist, so the result is
    /// always a bound method.
    pub fn get_attribute(&self, name: &str) -> Result<Value> {
        let table = match self {
            Value::List(_) => LIST_METHODS,
            Value::Dict(_) => DICT_METHODS,
            Value::Str(_) => STR_METHODS,
            _ => &[],
        };

        match table.iter().find(|&&m| m == name) {
            Some(&method) => Ok(Value::BoundMethod(Rc::new(BoundMethod {
                receiver: self.clone(),
                name: method,
            }))),
            None => Err(fault!(
                AttributeError,
                "'{}' object has no attribute '{}'",
                self.type_name(),
                name
            )),
        }
    }

    pub fn set_attribute(&self, name: &str, _value: Value) -> Result<()> {
        if self.get_attribute(name).is_ok() {
            return Err(fault!(
                AttributeError,
                "'{}' object attribute '{}' is read-only",
                self.type_name(),
                name
            ));
        }
        Err(fault!(
            AttributeError,
            "'{}' object has no attribute '{}'",
            self.type_name(),
            name
        ))
    }

    // ========================================================================
    // METHOD CALLS
    // ========================================================================

    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self {
            Value::List(_) => self.call_list_method(name, args),
            Value::Dict(_) => self.call_dict_method(name, args),
            Value::Str(s) => call_string_method(s, name, args),
            _ => Err(fault!(
                AttributeError,
                "'{}' object has no attribute '{}'",
                self.type_name(),
                name
            )),
        }
    }

    fn call_list_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        let Value::List(list) = self else {
            return Err(fault!(SystemError, "list method called on {}", self.type_name()));
        };

        match name {
            "append" => {
                expect_method_args("list", name, args, 1, 1)?;
                list.borrow_mut().push(args[0].clone());
                Ok(Value::None)
            }

            "pop" => {
                expect_method_args("list", name, args, 0, 1)?;
                let mut items = list.borrow_mut();
                if items.is_empty() {
                    return Err(fault!(IndexError, "pop from empty list"));
                }
                let index = match args.first() {
                    Some(index) => {
                        let raw = index_value("list", index)?;
                        normalize_index(raw, items.len())
                            .ok_or_else(|| fault!(IndexError, "pop index out of range"))?
                    }
                    None => items.len() - 1,
                };
                Ok(items.remove(index))
            }

            "extend" => {
                expect_method_args("list", name, args, 1, 1)?;
                let extra = args[0].to_vec()?;
                list.borrow_mut().extend(extra);
                Ok(Value::None)
            }

            "insert" => {
                expect_method_args("list", name, args, 2, 2)?;
                let raw = index_value("list", &args[0])?;
                let mut items = list.borrow_mut();
                let len = items.len() as i64;
                let index = if raw < 0 { (raw + len).max(0) } else { raw.min(len) };
                items.insert(index as usize, args[1].clone());
                Ok(Value::None)
            }

            "index" => {
                expect_method_args("list", name, args, 1, 1)?;
                position_of(&list.borrow(), &args[0])?
                    .map(|i| Value::Int(i as i64))
                    .ok_or_else(|| fault!(ValueError, "{} is not in list", args[0].repr()))
            }

            "count" => {
                expect_method_args("list", name, args, 1, 1)?;
                let mut count = 0;
                for item in list.borrow().iter() {
                    if item.py_eq(&args[0])? {
                        count += 1;
                    }
                }
                Ok(Value::Int(count))
            }

            "reverse" => {
                expect_method_args("list", name, args, 0, 0)?;
                list.borrow_mut().reverse();
                Ok(Value::None)
            }

            "sort" => {
                expect_method_args("list", name, args, 0, 0)?;
                let mut items = list.borrow().clone();
                sort_values(&mut items)?;
                *list.borrow_mut() = items;
                Ok(Value::None)
            }

            _ => Err(fault!(AttributeError, "'list' object has no attribute '{}'", name)),
        }
    }

    fn call_dict_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        let Value::Dict(dict) = self else {
            return Err(fault!(SystemError, "dict method called on {}", self.type_name()));
        };
        let dict = dict.borrow();

        match name {
            "get" => {
                expect_method_args("dict", name, args, 1, 2)?;
                let default = args.get(1).cloned().unwrap_or(Value::None);
                Ok(dict.get(&args[0])?.cloned().unwrap_or(default))
            }

            "keys" => {
                expect_method_args("dict", name, args, 0, 0)?;
                Ok(Value::list(dict.keys().cloned().collect()))
            }

            "values" => {
                expect_method_args("dict", name, args, 0, 0)?;
                Ok(Value::list(dict.values().cloned().collect()))
            }

            "items" => {
                expect_method_args("dict", name, args, 0, 0)?;
                let items = dict
                    .iter()
                    .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                    .collect();
                Ok(Value::list(items))
            }

            _ => Err(fault!(AttributeError, "'dict' object has no attribute '{}'", name)),
        }
    }

    // ========================================================================
    // SUBSCRIPTS
    // ========================================================================

    /// `self[index]`
    pub fn get_item(&self, index: &Value) -> Result<Value> {
        match self {
            Value::List(items) => {
                let items = items.borrow();
                let i = sequence_index("list", index, items.len())?;
                Ok(items[i].clone())
            }
            Value::Tuple(items) => {
                let i = sequence_index("tuple", index, items.len())?;
                Ok(items[i].clone())
            }
            Value::Str(s) => {
                let len = s.chars().count();
                let i = sequence_index("string", index, len)?;
                Ok(Value::Str(s.chars().nth(i).map(String::from).unwrap_or_default()))
            }
            Value::Range { start, stop, step } => {
                let len = range_len(*start, *stop, *step) as usize;
                let i = sequence_index("range object", index, len)?;
                Ok(Value::Int(start + step * i as i64))
            }
            Value::Dict(dict) => dict
                .borrow()
                .get(index)?
                .cloned()
                .ok_or_else(|| fault!(KeyError, "{}", index.repr())),
            other => Err(fault!(
                TypeError,
                "'{}' object is not subscriptable",
                other.type_name()
            )),
        }
    }

    /// `self[index] = value`
    pub fn set_item(&self, index: Value, value: Value) -> Result<()> {
        match self {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let i = sequence_index("list", &index, items.len())
                    .map_err(|_| fault!(IndexError, "list assignment index out of range"))?;
                items[i] = value;
                Ok(())
            }
            Value::Dict(dict) => dict.borrow_mut().insert(index, value),
            other => Err(fault!(
                TypeError,
                "'{}' object does not support item assignment",
                other.type_name()
            )),
        }
    }
}

fn call_string_method(s: &str, name: &str, args: &[Value]) -> Result<Value> {
    match name {
        "upper" => {
            expect_method_args("str", name, args, 0, 0)?;
            Ok(Value::Str(s.to_uppercase()))
        }

        "lower" => {
            expect_method_args("str", name, args, 0, 0)?;
            Ok(Value::Str(s.to_lowercase()))
        }

        "strip" => {
            expect_method_args("str", name, args, 0, 1)?;
            match args.first() {
                None | Some(Value::None) => Ok(Value::Str(s.trim().to_string())),
                Some(chars) => {
                    let chars: Vec<char> = str_arg(name, chars)?.chars().collect();
                    Ok(Value::Str(s.trim_matches(chars.as_slice()).to_string()))
                }
            }
        }

        "split" => {
            expect_method_args("str", name, args, 0, 1)?;
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                Some(sep) => {
                    let sep = str_arg(name, sep)?;
                    if sep.is_empty() {
                        return Err(fault!(ValueError, "empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
            };
            Ok(Value::list(parts))
        }

        "join" => {
            expect_method_args("str", name, args, 1, 1)?;
            let mut parts = Vec::new();
            for (i, item) in args[0].iterate()?.enumerate() {
                match item {
                    Value::Str(part) => parts.push(part),
                    other => {
                        return Err(fault!(
                            TypeError,
                            "sequence item {}: expected str instance, {} found",
                            i,
                            other.type_name()
                        ));
                    }
                }
            }
            Ok(Value::Str(parts.join(s)))
        }

        "replace" => {
            expect_method_args("str", name, args, 2, 2)?;
            let from = str_arg(name, &args[0])?;
            let to = str_arg(name, &args[1])?;
            Ok(Value::Str(s.replace(from, to)))
        }

        "startswith" => {
            expect_method_args("str", name, args, 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg(name, &args[0])?)))
        }

        "endswith" => {
            expect_method_args("str", name, args, 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg(name, &args[0])?)))
        }

        _ => Err(fault!(AttributeError, "'str' object has no attribute '{}'", name)),
    }
}

fn expect_method_args(
    type_name: &str,
    name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("exactly {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(fault!(
            TypeError,
            "{}.{}() takes {} argument(s) ({} given)",
            type_name,
            name,
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn str_arg<'a>(method: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| {
        fault!(
            TypeError,
            "{}() argument must be str, not {}",
            method,
            value.type_name()
        )
    })
}

fn index_value(type_name: &str, index: &Value) -> Result<i64> {
    index.as_int().ok_or_else(|| {
        fault!(
            TypeError,
            "{} indices must be integers, not {}",
            type_name,
            index.type_name()
        )
    })
}

fn normalize_index(raw: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if raw < 0 { raw + len } else { raw };
    (0..len).contains(&i).then_some(i as usize)
}

fn sequence_index(type_name: &str, index: &Value, len: usize) -> Result<usize> {
    let raw = index_value(type_name, index)?;
    normalize_index(raw, len).ok_or_else(|| fault!(IndexError, "{} index out of range", type_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dict;

    fn call(receiver: &Value, name: &str, args: &[Value]) -> Result<Value> {
        match receiver.get_attribute(name)? {
            Value::BoundMethod(m) => m.receiver.call_method(m.name, args),
            other => panic!("expected bound method, got {:?}", other),
        }
    }

    #[test]
    fn list_methods_mutate_shared_list() {
        let list = Value::list(vec![Value::Int(1)]);
        let alias = list.clone();
        call(&list, "append", &[Value::Int(2)]).unwrap();
        call(&list, "insert", &[Value::Int(0), Value::Int(0)]).unwrap();
        assert_eq!(alias.repr(), "[0, 1, 2]");

        assert_eq!(call(&list, "pop", &[]).unwrap(), Value::Int(2));
        assert_eq!(call(&list, "pop", &[Value::Int(0)]).unwrap(), Value::Int(0));
        assert_eq!(alias.repr(), "[1]");
    }

    #[test]
    fn list_extend_with_itself() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        call(&list, "extend", &[list.clone()]).unwrap();
        assert_eq!(list.repr(), "[1, 2, 1, 2]");
    }

    #[test]
    fn list_index_and_count() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
        assert_eq!(call(&list, "index", &[Value::Int(2)]).unwrap(), Value::Int(1));
        assert_eq!(call(&list, "count", &[Value::Int(1)]).unwrap(), Value::Int(2));
        let err = call(&list, "index", &[Value::Int(9)]).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: 9 is not in list");
    }

    #[test]
    fn pop_from_empty_list() {
        let err = call(&Value::list(vec![]), "pop", &[]).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: pop from empty list");
    }

    #[test]
    fn dict_methods() {
        let mut dict = Dict::new();
        dict.insert(Value::str("a"), Value::Int(1)).unwrap();
        let dict = Value::dict(dict);

        assert_eq!(call(&dict, "get", &[Value::str("a")]).unwrap(), Value::Int(1));
        assert_eq!(
            call(&dict, "get", &[Value::str("z"), Value::Int(0)]).unwrap(),
            Value::Int(0)
        );
        assert_eq!(call(&dict, "items", &[]).unwrap().repr(), "[('a', 1)]");
    }

    #[test]
    fn string_methods() {
        let s = Value::str("  a,b ");
        assert_eq!(call(&s, "strip", &[]).unwrap(), Value::str("a,b"));
        assert_eq!(call(&Value::str("a,b"), "split", &[Value::str(",")]).unwrap().repr(), "['a', 'b']");
        let parts = Value::list(vec![Value::str("x"), Value::str("y")]);
        assert_eq!(call(&Value::str("-"), "join", &[parts]).unwrap(), Value::str("x-y"));
        assert_eq!(
            call(&Value::str("abc"), "startswith", &[Value::str("ab")]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn unknown_attribute() {
        let err = Value::Int(1).get_attribute("real").unwrap_err();
        assert_eq!(err.to_string(), "AttributeError: 'int' object has no attribute 'real'");
    }

    #[test]
    fn subscripts() {
        let list = Value::list(vec![Value::Int(10), Value::Int(20)]);
        assert_eq!(list.get_item(&Value::Int(-1)).unwrap(), Value::Int(20));
        let err = list.get_item(&Value::Int(2)).unwrap_err();
        assert_eq!(err.to_string(), "IndexError: list index out of range");

        list.set_item(Value::Int(0), Value::Int(0)).unwrap();
        assert_eq!(list.repr(), "[0, 20]");

        let range = Value::Range { start: 1, stop: 10, step: 2 };
        assert_eq!(range.get_item(&Value::Int(2)).unwrap(), Value::Int(5));

        let err = Value::tuple(vec![]).set_item(Value::Int(0), Value::None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: 'tuple' object does not support item assignment"
        );
    }

    #[test]
    fn missing_dict_key() {
        let dict = Value::dict(Dict::new());
        let err = dict.get_item(&Value::str("k")).unwrap_err();
        assert_eq!(err.to_string(), "KeyError: 'k'");
    }
}
