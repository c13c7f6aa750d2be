//! Named functions callable from `~name(arg, ...)` bindings.

use std::{collections::HashMap, fmt::{self, Debug}, sync::Arc};

use anyhow::{Result, bail};
use kstring::KString;
use lazy_static::lazy_static;

use crate::value::Value;

pub type HelperFunction = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

#[derive(Clone, Default)]
pub struct HelperFunctions {
    functions: HashMap<KString, HelperFunction>,
}

impl Debug for HelperFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.functions.keys().map(|k| k.as_str()).collect();
        names.sort();
        f.write_fmt(format_args!("HelperFunctions({names:?})"))
    }
}

fn expect_args(name: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        bail!("helper function {name:?} takes {n} argument(s), got {}", args.len())
    }
    Ok(())
}

fn string_arg(args: &[Value], i: usize) -> String {
    args.get(i).map(Value::to_display_string).unwrap_or_default()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn uppercase(args: &[Value]) -> Result<Value> {
    expect_args("uppercase", args, 1)?;
    Ok(Value::from(string_arg(args, 0).to_uppercase()))
}

fn lowercase(args: &[Value]) -> Result<Value> {
    expect_args("lowercase", args, 1)?;
    Ok(Value::from(string_arg(args, 0).to_lowercase()))
}

fn capitalize_helper(args: &[Value]) -> Result<Value> {
    expect_args("capitalize", args, 1)?;
    Ok(Value::from(capitalize(&string_arg(args, 0))))
}

fn length(args: &[Value]) -> Result<Value> {
    expect_args("length", args, 1)?;
    Ok(match &args[0] {
        Value::Null => Value::Int(0),
        Value::String(s) => Value::from(s.chars().count()),
        Value::List(v) => Value::from(v.len()),
        Value::Map(m) => Value::from(m.len()),
        other => bail!("length: not applicable to {other}"),
    })
}

fn not(args: &[Value]) -> Result<Value> {
    expect_args("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn equals(args: &[Value]) -> Result<Value> {
    expect_args("equals", args, 2)?;
    Ok(Value::Bool(args[0] == args[1]))
}

fn concat(args: &[Value]) -> Result<Value> {
    Ok(Value::from(args.iter().map(Value::to_display_string).collect::<String>()))
}

/// First argument that is truthy, or the last one.
fn default(args: &[Value]) -> Result<Value> {
    Ok(args.iter().find(|v| v.is_truthy())
       .or_else(|| args.last())
       .cloned()
       .unwrap_or(Value::Null))
}

const BUILTINS: &[(&str, fn(&[Value]) -> Result<Value>)] = &[
    ("uppercase", uppercase),
    ("lowercase", lowercase),
    ("capitalize", capitalize_helper),
    ("length", length),
    ("not", not),
    ("equals", equals),
    ("concat", concat),
    ("default", default),
];

lazy_static! {
    static ref BUILTIN_FUNCTIONS: HelperFunctions = {
        let mut functions = HashMap::new();
        for &(name, f) in BUILTINS {
            let f: HelperFunction = Arc::new(f);
            functions.insert(KString::from_static(name), f);
        }
        HelperFunctions { functions }
    };
}

impl HelperFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        BUILTIN_FUNCTIONS.clone()
    }

    /// Using chaining; fails if `name` is already registered.
    pub fn register<F>(&mut self, name: &str, f: F) -> Result<&mut Self>
    where F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static
    {
        let key = KString::from_ref(name);
        if self.functions.contains_key(&key) {
            bail!("helper function {name:?} is already registered")
        }
        self.functions.insert(key, Arc::new(f));
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&HelperFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.get(name) {
            Some(f) => f(args),
            None => bail!("unknown helper function {name:?}"),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_builtins() -> Result<()> {
        let h = HelperFunctions::with_builtins();
        assert_eq!(h.call("uppercase", &["abc".into()])?, Value::from("ABC"));
        assert_eq!(h.call("capitalize", &["élan".into()])?, Value::from("Élan"));
        assert_eq!(h.call("length", &[vec![1, 2, 3].into()])?, Value::Int(3));
        assert_eq!(h.call("default", &[Value::Null, "x".into()])?, Value::from("x"));
        assert_eq!(h.call("concat", &["a".into(), Value::Int(1)])?, Value::from("a1"));
        assert!(h.call("uppercase", &[]).is_err());
        assert!(h.call("nope", &[]).is_err());
        Ok(())
    }

    #[test]
    fn t_register_duplicate() {
        let mut h = HelperFunctions::with_builtins();
        assert!(h.register("twice", |args| Ok(args[0].clone())).is_ok());
        assert!(h.register("twice", |_| Ok(Value::Null)).is_err());
        assert!(h.register("not", |_| Ok(Value::Null)).is_err());
    }
}
