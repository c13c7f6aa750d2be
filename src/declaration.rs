//! Parser for declaration files:
//!
//! ```text
//! // line comment
//! Name : TypeName { key1 = value1; key2 = "literal"; }
//! /* block comment */
//! ```

use std::{collections::BTreeMap, fmt::{self, Display}};

use kstring::KString;

use crate::binding::{Binding, BindingSyntaxError, QuotedStrings, resolve_binding,
                     unescape_string};


#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeclarationFormatError {
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("missing '}}' for declaration {header:?}")]
    UnterminatedBlock { header: String },
    #[error("text after the last declaration: {0:?}")]
    TrailingText(String),
    #[error("missing ':' in declaration header {header:?}")]
    MissingColon { header: String },
    #[error("missing tag name in declaration header {header:?}")]
    MissingTagName { header: String },
    #[error("missing type name in declaration header {header:?}")]
    MissingTypeName { header: String },
    #[error("duplicate tag name {0:?}")]
    DuplicateTagName(String),
    #[error("no '=' in binding {line:?} of declaration {tag:?}")]
    MissingEquals { tag: String, line: String },
    #[error("missing binding name in {line:?} of declaration {tag:?}")]
    MissingKey { tag: String, line: String },
    #[error("missing value in binding {line:?} of declaration {tag:?}")]
    MissingValue { tag: String, line: String },
    #[error("binding {key:?} given twice in declaration {tag:?}")]
    DuplicateBinding { tag: String, key: String },
    #[error("binding {key:?} of declaration {tag:?}: {source}")]
    InvalidBinding { tag: String, key: String, source: BindingSyntaxError },
}


/// The bindings of one declaration, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(Vec<(KString, Binding)>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.0.iter().find(|(k, _)| k.as_str() == name).map(|(_, b)| b)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns false (and keeps the old binding) if `name` was
    /// already present.
    pub fn insert(&mut self, name: KString, binding: Binding) -> bool {
        if self.contains(&name) {
            return false
        }
        self.0.push((name, binding));
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        let i = self.0.iter().position(|(k, _)| k.as_str() == name)?;
        Some(self.0.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.0.iter().map(|(k, b)| (k.as_str(), b))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}


#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: KString,
    pub type_name: KString,
    pub bindings: Bindings,
}

impl Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {} {{", self.name, self.type_name)?;
        for (k, b) in self.bindings.iter() {
            write!(f, " {k} = {b};")?;
        }
        f.write_str(" }")
    }
}

/// Tag name -> declaration.
pub type Declarations = BTreeMap<KString, Declaration>;


/// Removes `/* */` comments. Quoted strings are passed through
/// unchanged; a comment opened by `/*/` is not closed by its own
/// slash.
fn strip_block_comments(s: &str) -> Result<String, DeclarationFormatError> {
    enum State {
        Outside,
        InsideString,
        InsideComment { start: usize },
    }
    let mut out = String::with_capacity(s.len());
    let mut state = State::Outside;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match state {
            State::Outside => {
                if c == '/' && matches!(chars.peek(), Some((_, '*'))) {
                    chars.next();
                    state = State::InsideComment { start: i };
                } else if c == '/' && matches!(chars.peek(), Some((_, '/'))) {
                    // line comments are left for the next pass, but
                    // quotes in them must not start a string
                    out.push(c);
                    for (_, c2) in chars.by_ref() {
                        out.push(c2);
                        if c2 == '\n' {
                            break
                        }
                    }
                } else {
                    out.push(c);
                    if c == '"' {
                        state = State::InsideString;
                    }
                }
            }
            State::InsideString => {
                out.push(c);
                if c == '\\' {
                    if let Some((_, c2)) = chars.next() {
                        out.push(c2);
                    }
                } else if c == '"' {
                    state = State::Outside;
                }
            }
            State::InsideComment { start } => {
                if c == '*' && i > start + 1 && matches!(chars.peek(), Some((_, '/'))) {
                    chars.next();
                    state = State::Outside;
                }
            }
        }
    }
    match state {
        State::InsideComment { .. } => Err(DeclarationFormatError::UnterminatedComment),
        // reported by the next pass
        _ => Ok(out)
    }
}

/// Removes `//` comments (leaving the newline) and replaces each
/// string literal with a placeholder recorded in `quoted`.
fn extract_quotes_and_line_comments(
    s: &str,
    quoted: &mut QuotedStrings
) -> Result<String, DeclarationFormatError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '/' if matches!(chars.peek(), Some((_, '/'))) => {
                for (_, c2) in chars.by_ref() {
                    if c2 == '\n' {
                        break
                    }
                }
                out.push('\n');
            }
            '"' => {
                let start = i + 1;
                let mut end = None;
                while let Some((j, c2)) = chars.next() {
                    match c2 {
                        '\\' => { chars.next(); }
                        '"' => {
                            end = Some(j);
                            break
                        }
                        _ => ()
                    }
                }
                let end = end.ok_or(DeclarationFormatError::UnterminatedString)?;
                out.push_str(&quoted.push(s[start..end].to_string()));
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Splits into (header, body) pairs; the body is the text between
/// the braces.
fn split_blocks(s: &str) -> Result<Vec<(String, String)>, DeclarationFormatError> {
    let mut blocks = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find('{') {
        let header = rest[..open].trim();
        let header = header.trim_start_matches(';').trim();
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(
            || DeclarationFormatError::UnterminatedBlock { header: header.into() })?;
        blocks.push((header.to_string(), after[..close].to_string()));
        rest = &after[close + 1..];
    }
    let trailing = rest.trim().trim_start_matches(';').trim();
    if !trailing.is_empty() {
        return Err(DeclarationFormatError::TrailingText(trailing.into()))
    }
    Ok(blocks)
}

fn parse_body(
    tag: &str,
    body: &str,
    quoted: &QuotedStrings
) -> Result<Bindings, DeclarationFormatError> {
    let mut bindings = Bindings::new();
    for line in body.split(';') {
        let line = line.trim();
        if line.is_empty() {
            continue
        }
        let (key, value) = line.split_once('=').ok_or_else(
            || DeclarationFormatError::MissingEquals {
                tag: tag.into(), line: line.into()
            })?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(DeclarationFormatError::MissingKey {
                tag: tag.into(), line: line.into()
            })
        }
        if value.is_empty() {
            return Err(DeclarationFormatError::MissingValue {
                tag: tag.into(), line: line.into()
            })
        }
        // keys may be given as string literals, too
        let key = match quoted.lookup(key) {
            Some(literal) => unescape_string(literal),
            None => key.to_string(),
        };
        let binding = resolve_binding(value, quoted).map_err(
            |source| DeclarationFormatError::InvalidBinding {
                tag: tag.into(), key: key.clone(), source
            })?;
        if !bindings.insert(KString::from_ref(&key), binding) {
            return Err(DeclarationFormatError::DuplicateBinding {
                tag: tag.into(), key
            })
        }
    }
    Ok(bindings)
}

pub fn parse_declarations(text: &str) -> Result<Declarations, DeclarationFormatError> {
    let mut quoted = QuotedStrings::new();
    let without_block_comments = strip_block_comments(text)?;
    let stripped = extract_quotes_and_line_comments(&without_block_comments, &mut quoted)?;
    let mut declarations = Declarations::new();
    for (header, body) in split_blocks(&stripped)? {
        let (name, type_name) = header.split_once(':').ok_or_else(
            || DeclarationFormatError::MissingColon { header: header.clone() })?;
        let name = name.trim();
        let type_name = type_name.trim();
        if name.is_empty() {
            return Err(DeclarationFormatError::MissingTagName { header })
        }
        if type_name.is_empty() {
            return Err(DeclarationFormatError::MissingTypeName { header })
        }
        if declarations.contains_key(name) {
            return Err(DeclarationFormatError::DuplicateTagName(name.into()))
        }
        let bindings = parse_body(name, &body, &quoted)?;
        declarations.insert(KString::from_ref(name), Declaration {
            name: KString::from_ref(name),
            type_name: KString::from_ref(type_name),
            bindings,
        });
    }
    Ok(declarations)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn t_basic() {
        let d = parse_declarations(r#"
            // the greeting
            Greeting : String { value = greeting; escapeHTML = false; }
            Count : String { value = 3 }
            /* a comment { with braces } */
            Link : Hyperlink {
                href = "http://example.com/?a=b;c"; // not a comment inside the string
                string = "say \"hi\"";
            };
        "#).unwrap();
        assert_eq!(d.len(), 3);
        let g = &d["Greeting"];
        assert_eq!(g.type_name.as_str(), "String");
        assert_eq!(g.bindings.names().collect::<Vec<_>>(), vec!["value", "escapeHTML"]);
        assert_eq!(g.bindings.get("escapeHTML"), Some(&Binding::constant(false)));
        assert_eq!(d["Count"].bindings.get("value"), Some(&Binding::constant(3)));
        let l = &d["Link"].bindings;
        assert_eq!(l.get("href"),
                   Some(&Binding::constant("http://example.com/?a=b;c")));
        assert_eq!(l.get("string"), Some(&Binding::constant("say \"hi\"")));
    }

    #[test]
    fn t_unquoted_placeholder_lookalike() {
        let d = parse_declarations(r#"A : String { v = "x"; w = __qs0__; }"#).unwrap();
        let a = &d["A"].bindings;
        assert_eq!(a.get("v"), Some(&Binding::constant("x")));
        assert!(matches!(a.get("w"), Some(Binding::KeyPath(p)) if p.to_string() == "__qs0__"));
    }

    #[test]
    fn t_empty_bodies() {
        let d = parse_declarations("A : String {}\nB : String { }\nC:String{\n}").unwrap();
        assert!(d.values().all(|decl| decl.bindings.is_empty()));
        assert_eq!(d.len(), 3);
        assert!(parse_declarations("").unwrap().is_empty());
    }

    #[test]
    fn t_duplicate_tag_name() {
        let e = parse_declarations("A : String { value = 1; }\n A : Form { }").unwrap_err();
        assert_eq!(e, DeclarationFormatError::DuplicateTagName("A".into()));
        // identical declarations are still duplicates
        assert!(parse_declarations("A:String{}A:String{}").is_err());
    }

    #[test]
    fn t_format_errors() {
        use DeclarationFormatError::*;
        let err = |s| parse_declarations(s).unwrap_err();
        assert!(matches!(err("A String {}"), MissingColon { .. }));
        assert!(matches!(err(" : String {}"), MissingTagName { .. }));
        assert!(matches!(err("A : {}"), MissingTypeName { .. }));
        assert!(matches!(err("A : String { value }"), MissingEquals { .. }));
        assert!(matches!(err("A : String { = 3 }"), MissingKey { .. }));
        assert!(matches!(err("A : String { value = }"), MissingValue { .. }));
        assert!(matches!(err("A : String { value = 1; value = 2 }"), DuplicateBinding { .. }));
        assert!(matches!(err("A : String { value = 1 "), UnterminatedBlock { .. }));
        assert!(matches!(err("A : String { value = \"1 }"), UnterminatedString));
        assert!(matches!(err("A : String {} B"), TrailingText(_)));
        assert!(matches!(err("/* A : String {}"), UnterminatedComment));
        assert!(matches!(err("A : String { value = ~f(x }"), InvalidBinding { .. }));
    }

    #[test]
    fn t_block_comment_slash_star_slash() {
        // `/*/` doesn't close the comment it opens
        let d = parse_declarations("/*/ A : String {} */ B : String {}").unwrap();
        assert_eq!(d.keys().map(|k| k.as_str()).collect::<Vec<_>>(), vec!["B"]);
        let d = parse_declarations("/**/A : String {}").unwrap();
        assert!(d.contains_key("A"));
    }

    #[test]
    fn t_helper_binding_with_literal() {
        let d = parse_declarations(
            r#"T : String { value = ~concat("a; {b}", name); }"#).unwrap();
        match d["T"].bindings.get("value") {
            Some(Binding::HelperFunctionCall { name, arguments }) => {
                assert_eq!(name.as_str(), "concat");
                assert_eq!(arguments[0], Binding::Constant(Value::from("a; {b}")));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn t_reserialize_stable() {
        let src = r#"
            A : String { value = "x\ty"; n = 3; f = 2.5; b = YES; p = user.name; }
            B : Repetition { list = ~default(items, "none"); item = current; }
            C : Conditional { condition = nil; }
            D : String { big = 100000000000000000000.0; over = 99999999999999999999;
                         small = 0.00001; }
        "#;
        let d1 = parse_declarations(src).unwrap();
        let text: String = d1.values().map(|d| format!("{d}\n")).collect();
        let d2 = parse_declarations(&text).unwrap();
        assert_eq!(d1, d2);
        // and a second round changes nothing either
        let text2: String = d2.values().map(|d| format!("{d}\n")).collect();
        assert_eq!(text, text2);
        assert!(d1["D"].bindings.iter().all(|(_, b)| matches!(b, Binding::Constant(_))));
    }
}
