//! Dynamically typed values, as read from and written to components
//! through bindings.

use std::{collections::BTreeMap, fmt::{self, Display}};

use kstring::KString;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(KString),
    List(Vec<Value>),
    Map(BTreeMap<KString, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness as used by conditionals and the `not` helper: null,
    /// false, zero, and empty strings, lists and maps are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(v) => !v.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    /// The text used when a value is rendered; null renders as the
    /// empty string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.to_string(),
            v => v.to_string(),
        }
    }

    /// Navigate one key path segment. Lists answer `count`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(key),
            _ => None,
        }
    }

    /// Like `get` but also derives values that aren't stored
    /// (currently only `count` on lists and maps).
    pub fn get_derived(&self, key: &str) -> Option<Value> {
        match (self, key) {
            (Value::List(v), "count") => Some(Value::Int(v.len() as i64)),
            (Value::Map(m), k) => m.get(k).cloned().or_else(
                || if k == "count" { Some(Value::Int(m.len() as i64)) } else { None }),
            _ => None,
        }
    }

    /// Store `value` at the nested `path` (all segments but the last
    /// have to be maps or null, null is replaced with an empty map).
    pub fn set_path(&mut self, path: &[KString], value: Value) -> Result<(), String> {
        let (first, rest) = match path.split_first() {
            Some(fr) => fr,
            None => {
                *self = value;
                return Ok(())
            }
        };
        if self.is_null() {
            *self = Value::Map(BTreeMap::new());
        }
        match self {
            Value::Map(m) => {
                let slot = m.entry(first.clone()).or_insert(Value::Null);
                slot.set_path(rest, value)
            }
            other => Err(format!("can't set {first:?} on non-map value {other}")),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::List(v) => {
                f.write_str("(")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(KString::from_ref(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(KString::from_string(s))
    }
}

impl From<KString> for Value {
    fn from(s: KString) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
