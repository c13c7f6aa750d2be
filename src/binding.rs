//! Classification of binding values (the right hand sides in
//! declaration bodies) into constants, key paths and helper function
//! calls, and their evaluation against a component.

use std::fmt::{self, Display};

use anyhow::{Result, anyhow, bail};
use itertools::Itertools;
use kstring::KString;

use crate::component::Component;
use crate::helper_functions::HelperFunctions;
use crate::value::Value;


/// A dot separated property path, e.g. `session.user.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath(Vec<KString>);

impl KeyPath {
    pub fn parse(s: &str) -> Result<Self, BindingSyntaxError> {
        let segments: Vec<KString> = s.split('.').map(KString::from_ref).collect();
        if segments.iter().any(|seg| seg.is_empty() || !is_identifier(seg)) {
            return Err(BindingSyntaxError::InvalidKeyPath(s.into()))
        }
        Ok(KeyPath(segments))
    }

    pub fn segments(&self) -> &[KString] {
        &self.0
    }

    pub fn first(&self) -> &str {
        // parse never creates an empty path
        &self.0[0]
    }

    pub fn value_in(&self, component: &dyn Component) -> Value {
        let mut value = component.value_for_key(self.first()).unwrap_or_default();
        for segment in &self.0[1..] {
            value = value.get_derived(segment).unwrap_or_default();
        }
        value
    }

    /// Writes `value` back; for nested paths the root value is
    /// rebuilt and stored through its first segment.
    pub fn set_value_in(&self, component: &mut dyn Component, value: Value) -> Result<()> {
        if self.0.len() == 1 {
            return component.take_value_for_key(self.first(), value)
        }
        let mut root = component.value_for_key(self.first()).unwrap_or_default();
        root.set_path(&self.0[1..], value).map_err(
            |e| anyhow!("setting key path {self}: {e}"))?;
        component.take_value_for_key(self.first(), root)
    }
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.iter().join("."))
    }
}

fn is_identifier(s: &str) -> bool {
    s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '@' || c == '-')
}


#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Constant(Value),
    KeyPath(KeyPath),
    HelperFunctionCall {
        name: KString,
        arguments: Vec<Binding>,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingSyntaxError {
    #[error("invalid key path {0:?}")]
    InvalidKeyPath(String),
    #[error("unterminated string literal in {0:?}")]
    UnterminatedString(String),
    #[error("unbalanced parentheses in {0:?}")]
    UnbalancedParens(String),
    #[error("empty helper expression")]
    EmptyExpression,
    #[error("unexpected text after expression in {0:?}")]
    TrailingText(String),
}

impl Binding {
    pub fn constant(v: impl Into<Value>) -> Self {
        Binding::Constant(v.into())
    }

    /// Whether pushing a value back through this binding can work.
    pub fn is_settable(&self) -> bool {
        matches!(self, Binding::KeyPath(_))
    }

    /// Collects all helper function names used, including in nested
    /// arguments.
    pub fn helper_names<'s>(&'s self, out: &mut Vec<&'s str>) {
        if let Binding::HelperFunctionCall { name, arguments } = self {
            out.push(name.as_str());
            for a in arguments {
                a.helper_names(out);
            }
        }
    }

    pub fn value_in(&self, component: &dyn Component, helpers: &HelperFunctions)
                    -> Result<Value>
    {
        match self {
            Binding::Constant(v) => Ok(v.clone()),
            Binding::KeyPath(path) => Ok(path.value_in(component)),
            Binding::HelperFunctionCall { name, arguments } => {
                let args = arguments.iter()
                    .map(|a| a.value_in(component, helpers))
                    .collect::<Result<Vec<Value>>>()?;
                helpers.call(name, &args)
            }
        }
    }

    pub fn set_value_in(&self, component: &mut dyn Component, value: Value) -> Result<()> {
        match self {
            Binding::KeyPath(path) => path.set_value_in(component, value),
            _ => bail!("binding {self} is not settable"),
        }
    }
}

/// Re-serializes into declaration syntax; resolving the output again
/// gives the same binding.
impl Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Constant(v) => write_constant(f, v),
            Binding::KeyPath(p) => write!(f, "{p}"),
            Binding::HelperFunctionCall { name, arguments } => {
                write!(f, "~{name}(")?;
                for (i, a) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match a {
                        // nested calls don't take the `~` prefix
                        Binding::HelperFunctionCall { .. } =>
                            write!(f, "{}", &a.to_string()[1..])?,
                        _ => write!(f, "{a}")?,
                    }
                }
                f.write_str(")")
            }
        }
    }
}

fn write_constant(f: &mut fmt::Formatter<'_>, v: &Value) -> fmt::Result {
    match v {
        Value::Null => f.write_str("null"),
        Value::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
        Value::Int(i) => write!(f, "{i}"),
        // Display never uses exponents; the `.0` keeps it a float
        Value::Float(x) if x.is_finite() => {
            let s = x.to_string();
            if s.contains('.') {
                f.write_str(&s)
            } else {
                write!(f, "{s}.0")
            }
        }
        other => write!(f, "\"{}\"", escape_string(&other.to_display_string())),
    }
}

pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Resolves backslash escapes: `\n`, `\r`, `\t`, and any other
/// escaped character stands for itself.
pub fn unescape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}


// `#` never appears in a key path, so placeholders can't be
// confused with one.
const PLACEHOLDER_PREFIX: &str = "#qs";
const PLACEHOLDER_SUFFIX: &str = "#";

/// String literals cut out of a declaration text before it is split
/// into blocks, stored with their escapes still in place.
#[derive(Debug, Default)]
pub struct QuotedStrings {
    strings: Vec<String>,
}

impl QuotedStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the (still escaped) contents of a literal, returning the
    /// placeholder token to put into the text instead.
    pub fn push(&mut self, escaped_contents: String) -> String {
        let i = self.strings.len();
        self.strings.push(escaped_contents);
        format!("{PLACEHOLDER_PREFIX}{i}{PLACEHOLDER_SUFFIX}")
    }

    /// If `token` is exactly a placeholder, the escaped literal it
    /// stands for.
    pub fn lookup(&self, token: &str) -> Option<&str> {
        let i: usize = token.strip_prefix(PLACEHOLDER_PREFIX)?
            .strip_suffix(PLACEHOLDER_SUFFIX)?
            .parse().ok()?;
        self.strings.get(i).map(String::as_str)
    }

    /// Put all placeholders in `s` back as quoted literals.
    pub fn reinline(&self, s: &str) -> String {
        let mut out = String::new();
        let mut rest = s;
        while let Some(pos) = rest.find(PLACEHOLDER_PREFIX) {
            out.push_str(&rest[..pos]);
            let after = &rest[pos..];
            let digits_end = after[PLACEHOLDER_PREFIX.len()..]
                .find(|c: char| !c.is_ascii_digit())
                .map(|n| n + PLACEHOLDER_PREFIX.len())
                .unwrap_or(after.len());
            let token_end = digits_end + PLACEHOLDER_SUFFIX.len();
            match after.get(..token_end).and_then(|token| self.lookup(token)) {
                Some(literal) => {
                    out.push('"');
                    out.push_str(literal);
                    out.push('"');
                    rest = &after[token_end..];
                }
                None => {
                    out.push_str(PLACEHOLDER_PREFIX);
                    rest = &after[PLACEHOLDER_PREFIX.len()..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}


fn is_numeric(s: &str) -> bool {
    let digits = s.strip_prefix(|c| c == '-' || c == '+').unwrap_or(s);
    digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
}

fn parse_number(s: &str) -> Option<Value> {
    if s.contains('.') {
        s.parse::<f64>().ok().map(Value::Float)
    } else {
        s.parse::<i64>().ok().map(Value::Int)
            .or_else(|| s.parse::<f64>().ok().map(Value::Float))
    }
}

/// Classify an unquoted token that isn't a placeholder.
fn classify_bare(s: &str) -> Result<Binding, BindingSyntaxError> {
    if is_numeric(s) {
        if let Some(v) = parse_number(s) {
            return Ok(Binding::Constant(v))
        }
    }
    let lc = s.to_ascii_lowercase();
    match lc.as_str() {
        "true" | "yes" => Ok(Binding::Constant(Value::Bool(true))),
        "false" | "no" | "nil" | "null" => Ok(Binding::Constant(Value::Bool(false))),
        _ => Ok(Binding::KeyPath(KeyPath::parse(s)?)),
    }
}

/// Turn the raw right hand side of a binding into a `Binding`. The
/// first matching rule wins: `~` expressions, quoted literals,
/// numbers, booleans, key paths.
pub fn resolve_binding(raw: &str, quoted: &QuotedStrings)
                       -> Result<Binding, BindingSyntaxError>
{
    let raw = raw.trim();
    if let Some(expr) = raw.strip_prefix('~') {
        let expr = quoted.reinline(expr);
        return parse_expression(&expr)
    }
    if let Some(literal) = quoted.lookup(raw) {
        return Ok(Binding::Constant(Value::from(unescape_string(literal))))
    }
    classify_bare(raw)
}


/// Parser for helper expressions: `name(arg, ...)`, bare tokens and
/// quoted strings, arguments possibly nested.
struct ExprParser<'s> {
    input: &'s str,
    pos: usize,
}

impl<'s> ExprParser<'s> {
    fn rest(&self) -> &'s str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn parse_string(&mut self) -> Result<Binding, BindingSyntaxError> {
        // at the opening quote
        let start = self.pos + 1;
        let mut escaped = false;
        for (i, c) in self.input[start..].char_indices() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                let contents = &self.input[start..start + i];
                self.pos = start + i + 1;
                return Ok(Binding::Constant(Value::from(unescape_string(contents))))
            }
        }
        Err(BindingSyntaxError::UnterminatedString(self.input.into()))
    }

    fn parse_term(&mut self) -> Result<Binding, BindingSyntaxError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(BindingSyntaxError::EmptyExpression),
            Some('"') => self.parse_string(),
            Some(_) => {
                let rest = self.rest();
                let len = rest.find(|c: char| c == '(' || c == ')' || c == ','
                                    || c.is_whitespace())
                    .unwrap_or(rest.len());
                let token = &rest[..len];
                if token.is_empty() {
                    return Err(BindingSyntaxError::UnbalancedParens(self.input.into()))
                }
                self.pos += len;
                self.skip_whitespace();
                if self.peek() == Some('(') {
                    self.pos += 1;
                    let arguments = self.parse_arguments()?;
                    Ok(Binding::HelperFunctionCall {
                        name: KString::from_ref(token),
                        arguments,
                    })
                } else {
                    classify_bare(token)
                }
            }
        }
    }

    /// After the opening paren, up to and including the closing one.
    fn parse_arguments(&mut self) -> Result<Vec<Binding>, BindingSyntaxError> {
        let mut arguments = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(arguments)
        }
        loop {
            arguments.push(self.parse_term()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(arguments)
                }
                _ => return Err(BindingSyntaxError::UnbalancedParens(self.input.into())),
            }
        }
    }
}

/// The part after `~`, with string literals inlined.
pub fn parse_expression(expr: &str) -> Result<Binding, BindingSyntaxError> {
    let mut parser = ExprParser { input: expr, pos: 0 };
    let binding = parser.parse_term()?;
    parser.skip_whitespace();
    if parser.pos < expr.len() {
        return Err(BindingSyntaxError::TrailingText(expr.into()))
    }
    Ok(binding)
}
