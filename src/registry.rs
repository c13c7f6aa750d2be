//! Name -> element type lookup used by the template compiler.

use std::{collections::HashMap, fmt::{self, Debug}, sync::Arc};

use anyhow::{Result, bail};
use kstring::KString;

use crate::binding::Binding;
use crate::component::ComponentDefinition;
use crate::declaration::Bindings;
use crate::element::{DynamicElement, Element};
use crate::elements;
use crate::helper_functions::HelperFunctions;
use crate::warn;


/// Arguments for building a primitive element from its declaration;
/// constructors `take` what they understand.
#[derive(Debug)]
pub struct ElementArgs {
    /// The tag (declaration) name, for messages.
    pub name: KString,
    pub bindings: Bindings,
    pub content: Option<Arc<Element>>,
}

impl ElementArgs {
    pub fn take(&mut self, key: &str) -> Option<Binding> {
        self.bindings.remove(key)
    }

    pub fn required(&mut self, key: &str) -> Result<Binding> {
        match self.take(key) {
            Some(b) => Ok(b),
            None => bail!("missing required binding {key:?}"),
        }
    }

    /// Hands out the content; bindings nobody took are reported.
    pub fn finish(self, type_name: &str) -> Option<Arc<Element>> {
        for key in self.bindings.names() {
            warn!("{type_name} element {:?}: ignoring unknown binding {key:?}", self.name);
        }
        self.content
    }
}

pub type ElementConstructor = fn(ElementArgs) -> Result<Box<dyn DynamicElement>>;

#[derive(Clone)]
pub enum ElementType {
    Primitive(ElementConstructor),
    Component(Arc<ComponentDefinition>),
}

impl ElementType {
    pub fn kind(&self) -> &'static str {
        match self {
            ElementType::Primitive(_) => "primitive element",
            ElementType::Component(_) => "component",
        }
    }
}

impl Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Primitive(_) => f.write_str("Primitive"),
            ElementType::Component(d) => write!(f, "Component({:?})", d.name()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no element or component named {0:?}")]
    Unresolvable(String),
    #[error("{name:?} is a {found}, not a {expected}")]
    WrongKind { name: String, expected: &'static str, found: &'static str },
}


#[derive(Debug)]
pub struct Registry {
    types: HashMap<KString, ElementType>,
    helpers: HelperFunctions,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// With the built-in elements and helper functions.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for &(name, constructor) in elements::BUILTIN_ELEMENTS {
            let t = ElementType::Primitive(constructor);
            registry.types.insert(KString::from_static(name), t.clone());
            registry.types.insert(KString::from_string(format!("WO{name}")), t);
        }
        registry
    }

    pub fn empty() -> Self {
        Registry {
            types: HashMap::new(),
            helpers: HelperFunctions::with_builtins(),
        }
    }

    fn insert(&mut self, name: &str, t: ElementType) -> Result<&mut Self> {
        let key = KString::from_ref(name);
        if let Some(old) = self.types.get(&key) {
            bail!("{name:?} is already registered as a {}", old.kind())
        }
        self.types.insert(key, t);
        Ok(self)
    }

    pub fn register_element(&mut self, name: &str, constructor: ElementConstructor)
                            -> Result<&mut Self> {
        self.insert(name, ElementType::Primitive(constructor))
    }

    pub fn register_component(&mut self, definition: ComponentDefinition)
                              -> Result<Arc<ComponentDefinition>> {
        let definition = Arc::new(definition);
        self.insert(definition.name(), ElementType::Component(definition.clone()))?;
        Ok(definition)
    }

    pub fn resolve(&self, name: &str) -> Result<&ElementType, ResolveError> {
        self.types.get(name).ok_or_else(|| ResolveError::Unresolvable(name.into()))
    }

    pub fn resolve_component(&self, name: &str)
                             -> Result<Arc<ComponentDefinition>, ResolveError> {
        match self.resolve(name)? {
            ElementType::Component(d) => Ok(d.clone()),
            t @ ElementType::Primitive(_) => Err(ResolveError::WrongKind {
                name: name.into(),
                expected: "component",
                found: t.kind(),
            }),
        }
    }

    pub fn component_definitions(&self) -> impl Iterator<Item = &Arc<ComponentDefinition>> {
        self.types.values().filter_map(|t| match t {
            ElementType::Component(d) => Some(d),
            ElementType::Primitive(_) => None,
        })
    }

    pub fn helpers(&self) -> &HelperFunctions {
        &self.helpers
    }

    pub fn helpers_mut(&mut self) -> &mut HelperFunctions {
        &mut self.helpers
    }
}
