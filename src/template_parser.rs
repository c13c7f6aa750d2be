//! Compiles an HTML template plus its declarations into an element
//! tree. Only the dynamic tags are looked at:
//!
//! ```text
//! <webobject name="Tag">content</webobject>   (or <webobject name=Tag/>)
//! <wo:Type key="constant" other="$key.path" third="~helper(x)">...</wo:Type>
//! ```
//!
//! Everything else is passed through as text.

use std::sync::Arc;

use kstring::KString;

use crate::binding::{Binding, KeyPath, parse_expression};
use crate::declaration::{Bindings, Declaration, DeclarationFormatError, Declarations,
                         parse_declarations};
use crate::element::{ComponentReference, Element};
use crate::registry::{ElementArgs, ElementType, Registry, ResolveError};
use crate::value::Value;


#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HtmlFormatError {
    #[error("webobject tag without name attribute: {0:?}")]
    MissingName(String),
    #[error("unterminated tag starting with {0:?}")]
    UnterminatedTag(String),
    #[error("closing tag {0:?} without opening tag")]
    UnexpectedClosingTag(String),
    #[error("closing tag {found:?} does not match opening tag {expected:?}")]
    MismatchedClosingTag { expected: String, found: String },
    #[error("tag {0:?} is never closed")]
    UnclosedTag(String),
    #[error("malformed attributes in tag {0:?}")]
    MalformedTag(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("declarations: {0}")]
    Declaration(#[from] DeclarationFormatError),
    #[error("template: {0}")]
    Html(#[from] HtmlFormatError),
    #[error("no declaration for dynamic tag {0:?}")]
    NoDeclaration(String),
    #[error("tag {tag:?}: {source}")]
    UnresolvedType { tag: String, source: ResolveError },
    #[error("tag {tag:?} ({type_name}): {message}")]
    InvalidElement { tag: String, type_name: String, message: String },
    #[error("tag {tag:?}: unknown helper function {name:?}")]
    UnknownHelperFunction { tag: String, name: String },
    #[error("in component {component:?}: {source}")]
    InComponent { component: String, source: Box<CompileError> },
}


#[derive(Debug)]
enum TagKind {
    Root,
    WebObject,
    Inline(Declaration),
}

#[derive(Debug)]
enum Piece {
    Text(String),
    Element(Element),
}

/// An open dynamic tag collecting its children during the scan.
#[derive(Debug)]
struct DynamicTag {
    name: Option<KString>,
    kind: TagKind,
    children: Vec<Piece>,
}

impl DynamicTag {
    fn root() -> Self {
        DynamicTag { name: None, kind: TagKind::Root, children: Vec::new() }
    }

    fn add_text(&mut self, s: &str) {
        if !s.is_empty() {
            self.children.push(Piece::Text(s.into()));
        }
    }

    /// Adjacent text pieces merged.
    fn elements(children: Vec<Piece>) -> Vec<Element> {
        let mut elements = Vec::new();
        let mut text = String::new();
        for piece in children {
            match piece {
                Piece::Text(s) => text.push_str(&s),
                Piece::Element(e) => {
                    if !text.is_empty() {
                        elements.push(Element::BareString(std::mem::take(&mut text)));
                    }
                    elements.push(e);
                }
            }
        }
        if !text.is_empty() {
            elements.push(Element::BareString(text));
        }
        elements
    }

    /// The content as a single element: a lone child used directly
    /// (component references still get wrapped, so that they sit one
    /// element id level deeper), None for no content.
    fn template(self) -> Option<Element> {
        let mut elements = Self::elements(self.children);
        match elements.len() {
            0 => None,
            1 if !elements[0].is_component_reference() => elements.pop(),
            _ => Some(Element::group(self.name, elements)),
        }
    }

    /// The whole template is always a group, so that every element in
    /// it has a non-empty element id.
    fn root_group(self) -> Element {
        Element::group(self.name, Self::elements(self.children))
    }

    fn display_name(&self) -> String {
        match &self.kind {
            TagKind::Root => "(root)".into(),
            TagKind::WebObject => format!("webobject {:?}",
                                          self.name.as_deref().unwrap_or_default()),
            TagKind::Inline(d) => format!("wo:{}", d.type_name),
        }
    }
}


#[derive(Debug, PartialEq)]
enum Token {
    WebObjectOpen { name: KString, self_closing: bool },
    WebObjectClose,
    InlineOpen { type_name: KString, attributes: Vec<(String, String)>, self_closing: bool },
    InlineClose { type_name: KString },
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

fn is_name_end(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => c.is_whitespace() || c == '>' || c == '/',
    }
}

/// Position of the `>` ending the tag that starts at the beginning
/// of `s`, skipping quoted attribute values.
fn tag_end(s: &str) -> Result<usize, HtmlFormatError> {
    let mut quote = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => (),
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Ok(i),
            _ => (),
        }
    }
    let start: String = s.chars().take(40).collect();
    Err(HtmlFormatError::UnterminatedTag(start))
}

/// `key=value key2='v' key3="v" flag`; flags get an empty value.
fn parse_attributes(s: &str, tag: &str) -> Result<Vec<(String, Option<String>)>, HtmlFormatError> {
    let malformed = || HtmlFormatError::MalformedTag(tag.into());
    let mut attributes = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        let key_end = rest.find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        if key.is_empty() {
            return Err(malformed())
        }
        rest = rest[key_end..].trim_start();
        let value = if let Some(after) = rest.strip_prefix('=') {
            let after = after.trim_start();
            match after.chars().next() {
                Some(q) if q == '"' || q == '\'' => {
                    let len = after[1..].find(q).ok_or_else(malformed)?;
                    rest = &after[1 + len + 1..];
                    Some(after[1..1 + len].to_string())
                }
                Some(_) => {
                    let end = after.find(char::is_whitespace).unwrap_or(after.len());
                    rest = &after[end..];
                    Some(after[..end].to_string())
                }
                None => return Err(malformed()),
            }
        } else {
            None
        };
        attributes.push((key.to_string(), value));
        rest = rest.trim_start();
    }
    Ok(attributes)
}

/// Tries to read a dynamic tag at the start of `s` (which starts with
/// `<`). Returns the token and its length, None for other markup.
fn next_token(s: &str) -> Result<Option<(Token, usize)>, HtmlFormatError> {
    let (is_close, after_lt) = match s.strip_prefix("</") {
        Some(r) => (true, r),
        None => (false, &s[1..]),
    };
    let is_webobject = starts_with_ignore_case(after_lt, "webobject")
        && is_name_end(after_lt["webobject".len()..].chars().next());
    let is_inline = starts_with_ignore_case(after_lt, "wo:");
    if !is_webobject && !is_inline {
        return Ok(None)
    }
    let end = tag_end(s)?;
    let raw = &s[..=end];
    let prefix_len = s.len() - after_lt.len();
    let inner = &s[prefix_len..end];
    let (inner, self_closing) = match inner.trim_end().strip_suffix('/') {
        Some(i) => (i, true),
        None => (inner, false),
    };
    let token = if is_webobject {
        if is_close {
            Token::WebObjectClose
        } else {
            let attributes = parse_attributes(&inner["webobject".len()..], raw)?;
            let name = attributes.into_iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("name"))
                .and_then(|(_, v)| v)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| HtmlFormatError::MissingName(raw.into()))?;
            Token::WebObjectOpen { name: KString::from_string(name), self_closing }
        }
    } else {
        let after_prefix = &inner["wo:".len()..];
        let name_end = after_prefix.find(char::is_whitespace).unwrap_or(after_prefix.len());
        let type_name = &after_prefix[..name_end];
        if type_name.is_empty() {
            return Err(HtmlFormatError::MalformedTag(raw.into()))
        }
        let type_name = KString::from_ref(type_name);
        if is_close {
            Token::InlineClose { type_name }
        } else {
            let attributes = parse_attributes(&after_prefix[name_end..], raw)?
                .into_iter()
                .map(|(k, v)| (k, v.unwrap_or_default()))
                .collect();
            Token::InlineOpen { type_name, attributes, self_closing }
        }
    };
    Ok(Some((token, end + 1)))
}

/// The binding for an inline tag attribute: `$` introduces a key
/// path, `~` a helper expression, anything else is a string constant.
fn inline_binding(tag: &str, key: &str, value: &str) -> Result<Binding, DeclarationFormatError> {
    let invalid = |source| DeclarationFormatError::InvalidBinding {
        tag: tag.into(), key: key.into(), source
    };
    if let Some(path) = value.strip_prefix('$') {
        Ok(Binding::KeyPath(KeyPath::parse(path).map_err(invalid)?))
    } else if let Some(expr) = value.strip_prefix('~') {
        parse_expression(expr).map_err(invalid)
    } else {
        Ok(Binding::Constant(Value::from(value)))
    }
}


struct Compiler<'t> {
    declarations: &'t Declarations,
    registry: &'t Registry,
    stack: Vec<DynamicTag>,
    inline_count: usize,
}

impl<'t> Compiler<'t> {
    // The root tag is only taken off at the very end.
    fn top(&mut self) -> &mut DynamicTag {
        let i = self.stack.len() - 1;
        &mut self.stack[i]
    }

    fn current(&self) -> &DynamicTag {
        &self.stack[self.stack.len() - 1]
    }

    fn open(&mut self, tag: DynamicTag, self_closing: bool) -> Result<(), CompileError> {
        self.stack.push(tag);
        if self_closing {
            self.close()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CompileError> {
        let tag = match self.stack.pop() {
            Some(t) => t,
            None => return Err(HtmlFormatError::UnexpectedClosingTag("(root)".into()).into()),
        };
        let element = self.build(tag)?;
        self.top().children.push(Piece::Element(element));
        Ok(())
    }

    fn handle(&mut self, token: Token) -> Result<(), CompileError> {
        match token {
            Token::WebObjectOpen { name, self_closing } => {
                let tag = DynamicTag { name: Some(name), kind: TagKind::WebObject,
                                       children: Vec::new() };
                self.open(tag, self_closing)
            }
            Token::InlineOpen { type_name, attributes, self_closing } => {
                let name = KString::from_string(format!("_inline_{}", self.inline_count));
                self.inline_count += 1;
                let mut bindings = Bindings::new();
                for (key, value) in &attributes {
                    let binding = inline_binding(&name, key, value)?;
                    if !bindings.insert(KString::from_ref(key), binding) {
                        return Err(DeclarationFormatError::DuplicateBinding {
                            tag: format!("wo:{type_name}"), key: key.clone()
                        }.into())
                    }
                }
                let declaration = Declaration { name: name.clone(), type_name, bindings };
                let tag = DynamicTag { name: Some(name), kind: TagKind::Inline(declaration),
                                       children: Vec::new() };
                self.open(tag, self_closing)
            }
            Token::WebObjectClose => {
                match &self.current().kind {
                    TagKind::WebObject => self.close(),
                    TagKind::Root => Err(HtmlFormatError::UnexpectedClosingTag(
                        "</webobject>".into()).into()),
                    TagKind::Inline(_) => {
                        let expected = self.current().display_name();
                        Err(HtmlFormatError::MismatchedClosingTag {
                            expected, found: "</webobject>".into()
                        }.into())
                    }
                }
            }
            Token::InlineClose { type_name } => {
                let found = format!("</wo:{type_name}>");
                match &self.current().kind {
                    TagKind::Inline(d) if d.type_name == type_name => self.close(),
                    TagKind::Root => Err(HtmlFormatError::UnexpectedClosingTag(found).into()),
                    _ => {
                        let expected = self.current().display_name();
                        Err(HtmlFormatError::MismatchedClosingTag { expected, found }.into())
                    }
                }
            }
        }
    }

    /// Turns a closed tag into its element.
    fn build(&self, mut tag: DynamicTag) -> Result<Element, CompileError> {
        let declaration = match std::mem::replace(&mut tag.kind, TagKind::WebObject) {
            TagKind::Inline(d) => d,
            TagKind::Root => return Ok(tag.root_group()),
            TagKind::WebObject => {
                let name = tag.name.as_deref().unwrap_or_default();
                self.declarations.get(name).cloned()
                    .ok_or_else(|| CompileError::NoDeclaration(name.into()))?
            }
        };
        let tag_name = declaration.name.to_string();
        let type_name = declaration.type_name.to_string();

        let mut helper_names = Vec::new();
        for (_, binding) in declaration.bindings.iter() {
            binding.helper_names(&mut helper_names);
        }
        if let Some(unknown) = helper_names.iter()
            .find(|n| !self.registry.helpers().contains(n))
        {
            return Err(CompileError::UnknownHelperFunction {
                tag: tag_name, name: unknown.to_string()
            })
        }

        let element_type = self.registry.resolve(&type_name).map_err(
            |source| CompileError::UnresolvedType { tag: tag_name.clone(), source })?;
        let content = tag.template().map(Arc::new);
        match element_type {
            ElementType::Primitive(constructor) => {
                let args = ElementArgs {
                    name: declaration.name.clone(),
                    bindings: declaration.bindings,
                    content,
                };
                let element = constructor(args).map_err(
                    |e| CompileError::InvalidElement {
                        tag: tag_name, type_name, message: format!("{e:#}")
                    })?;
                Ok(Element::Dynamic(element))
            }
            ElementType::Component(definition) => {
                Ok(Element::ComponentReference(ComponentReference {
                    name: declaration.name.clone(),
                    definition: definition.clone(),
                    bindings: declaration.bindings,
                    content,
                }))
            }
        }
    }
}

pub fn compile_template(template: &str, declarations: &str, registry: &Registry)
                        -> Result<Arc<Element>, CompileError> {
    let declarations = parse_declarations(declarations)?;
    compile_with_declarations(template, &declarations, registry)
}

pub fn compile_with_declarations(
    template: &str,
    declarations: &Declarations,
    registry: &Registry
) -> Result<Arc<Element>, CompileError> {
    let mut compiler = Compiler {
        declarations,
        registry,
        stack: vec![DynamicTag::root()],
        inline_count: 0,
    };
    let mut pos = 0;
    let mut text_start = 0;
    while let Some(offset) = template[pos..].find('<') {
        let at = pos + offset;
        match next_token(&template[at..])? {
            Some((token, len)) => {
                compiler.top().add_text(&template[text_start..at]);
                compiler.handle(token)?;
                pos = at + len;
                text_start = pos;
            }
            None => {
                // Ordinary markup; kept as its own piece, merged again
                // when the tag's content is built.
                compiler.top().add_text(&template[text_start..at]);
                text_start = at;
                pos = at + 1;
            }
        }
    }
    compiler.top().add_text(&template[text_start..]);

    if compiler.stack.len() > 1 {
        let unclosed = compiler.current().display_name();
        return Err(HtmlFormatError::UnclosedTag(unclosed).into())
    }
    let root = compiler.stack.pop().unwrap_or_else(DynamicTag::root);
    Ok(Arc::new(compiler.build(root)?))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn compile(template: &str, declarations: &str) -> Result<Arc<Element>, CompileError> {
        compile_template(template, declarations, &Registry::new())
    }

    fn children(e: &Element) -> &[Element] {
        match e {
            Element::Group(g) => &g.children,
            _ => panic!("not a group: {e:?}"),
        }
    }

    #[test]
    fn t_text_merging() {
        let e = compile("<p>a</p><b>x</b><webobject name=\"S\"></webobject><i>y</i>z",
                        "S : String { value = \"v\"; }").unwrap();
        let c = children(&e);
        assert_eq!(c.len(), 3);
        assert!(matches!(&c[0], Element::BareString(s) if s == "<p>a</p><b>x</b>"));
        assert!(matches!(&c[1], Element::Dynamic(_)));
        assert!(matches!(&c[2], Element::BareString(s) if s == "<i>y</i>z"));
    }

    #[test]
    fn t_single_child_promotion() {
        let e = compile("<WEBOBJECT NAME=S/>", "S : String { value = v; }").unwrap();
        assert!(matches!(children(&e), [Element::Dynamic(_)]));
        let e = compile("plain", "").unwrap();
        assert!(matches!(children(&e), [Element::BareString(s)] if s == "plain"));
        let e = compile("", "").unwrap();
        assert!(children(&e).is_empty());

        let tag = |children| DynamicTag { name: None, kind: TagKind::WebObject, children };
        let lone = tag(vec![Piece::Text("a".into()), Piece::Text("<b>".into())]).template();
        assert!(matches!(lone, Some(Element::BareString(s)) if s == "a<b>"));
        assert!(tag(vec![]).template().is_none());
    }

    #[test]
    fn t_inline_tags() {
        let e = compile("<wo:String value=\"$user.name\"/> and \
                         <wo:Conditional condition='$flag'>yes</wo:Conditional>", "")
            .unwrap();
        let c = children(&e);
        assert_eq!(c.len(), 3);
        assert!(matches!(&c[2], Element::Dynamic(_)));
        assert_eq!(inline_binding("t", "k", "$a.b").unwrap(),
                   Binding::KeyPath(KeyPath::parse("a.b").unwrap()));
        assert_eq!(inline_binding("t", "k", "hello").unwrap(), Binding::constant("hello"));
        assert!(matches!(inline_binding("t", "k", "~uppercase(name)").unwrap(),
                         Binding::HelperFunctionCall { .. }));
        assert!(inline_binding("t", "k", "$").is_err());
    }

    #[test]
    fn t_errors() {
        let decl = "S : String { value = v; }";
        assert_eq!(compile("<webobject>", decl).unwrap_err(),
                   CompileError::Html(HtmlFormatError::MissingName("<webobject>".into())));
        assert!(matches!(compile("<webobject name=S>", decl).unwrap_err(),
                         CompileError::Html(HtmlFormatError::UnclosedTag(_))));
        assert!(matches!(compile("</webobject>", decl).unwrap_err(),
                         CompileError::Html(HtmlFormatError::UnexpectedClosingTag(_))));
        assert!(matches!(compile("<wo:String value=x></webobject>", decl).unwrap_err(),
                         CompileError::Html(HtmlFormatError::MismatchedClosingTag { .. })));
        assert!(matches!(compile("<webobject name=\"S\"", decl).unwrap_err(),
                         CompileError::Html(HtmlFormatError::UnterminatedTag(_))));
        assert_eq!(compile("<webobject name=T/>", decl).unwrap_err(),
                   CompileError::NoDeclaration("T".into()));
        assert!(matches!(compile("<webobject name=S/>", "S : Nope {}").unwrap_err(),
                         CompileError::UnresolvedType { .. }));
        assert!(matches!(compile("<webobject name=S/>", "S : String {}").unwrap_err(),
                         CompileError::InvalidElement { .. }));
        assert!(matches!(compile("<webobject name=S/>",
                                 "S : String { value = ~frobnicate(v); }").unwrap_err(),
                         CompileError::UnknownHelperFunction { .. }));
        assert!(matches!(compile("", "S String {}").unwrap_err(),
                         CompileError::Declaration(_)));
    }

    #[test]
    fn t_non_dynamic_markup() {
        // `<webobjects>` and `<wonder>` are not ours
        let e = compile("<webobjects><wonder>", "").unwrap();
        assert!(matches!(children(&e), [Element::BareString(s)] if s == "<webobjects><wonder>"));
    }
}
