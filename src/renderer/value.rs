//! Variable values supplied at render time

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A render-time value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// No value; renders empty
    #[default]
    #[serde(skip)]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Text a `{name}` reference renders to
    ///
    /// Null, booleans and whitespace-only strings render empty.
    pub fn render(&self) -> String {
        match self {
            Value::Null | Value::Bool(_) => String::new(),
            Value::String(s) if s.trim().is_empty() => String::new(),
            other => other.as_text(),
        }
    }

    /// Text form used by `eq` comparisons
    pub fn as_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }

    /// Whether a placeholder bound to this value counts as filled in
    ///
    /// Numbers always count, including zero.
    pub fn is_resolved(&self) -> bool {
        match self {
            Value::Null | Value::Bool(_) => false,
            Value::Integer(_) | Value::Float(_) => true,
            Value::String(s) => !s.trim().is_empty(),
        }
    }

    /// Whether a `nonempty` test fails for this value
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null | Value::Bool(false) => true,
            Value::Bool(true) | Value::Integer(_) | Value::Float(_) => false,
            Value::String(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// The variable environment templates render against
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables {
    values: BTreeMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Rendered text of a variable; missing variables render empty
    pub fn render(&self, name: &str) -> String {
        self.get(name).map(Value::render).unwrap_or_default()
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.get(name).is_some_and(Value::is_resolved)
    }

    pub fn is_blank(&self, name: &str) -> bool {
        self.get(name).map_or(true, Value::is_blank)
    }

    /// Copy every entry of `other` over this environment
    pub fn extend(&mut self, other: &Variables) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        for (name, value) in iter {
            vars.set(name, value);
        }
        vars
    }
}
