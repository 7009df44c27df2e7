use crate::value::Value;
use rustc_hash::FxHashMap;

/// The global scope code runs against.
///
/// A namespace is owned by the caller and lent to the engine for the length
/// of a run; executed code reads and writes it in place.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    vars: FxHashMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Names in sorted order, for stable display.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl std::ops::Index<&str> for Namespace {
    type Output = Value;

    /// Panics when `name` is unbound; use [`Namespace::get`] otherwise.
    fn index(&self, name: &str) -> &Value {
        match self.vars.get(name) {
            Some(value) => value,
            None => panic!("name '{}' is not defined in namespace", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_lookup() {
        let ns = Namespace::new().with("x", 3_i64).with("name", "abc");
        assert_eq!(ns["x"], Value::Int(3));
        assert_eq!(ns.get("name"), Some(&Value::str("abc")));
        assert_eq!(ns.names(), vec!["name", "x"]);
    }

    #[test]
    fn insert_and_remove() {
        let mut ns = Namespace::new();
        assert!(ns.insert("a", Value::Int(1)).is_none());
        assert_eq!(ns.insert("a", Value::Int(2)), Some(Value::Int(1)));
        assert_eq!(ns.remove("a"), Some(Value::Int(2)));
        assert!(ns.is_empty());
    }

    #[test]
    fn collect_from_pairs() {
        let ns: Namespace = vec![("a", Value::Int(1)), ("b", Value::None)].into_iter().collect();
        assert_eq!(ns.len(), 2);
        assert!(ns.contains("b"));
    }
}
