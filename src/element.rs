//! The compiled, immutable element tree and its three traversals
//! (take values, invoke action, append to response).

use std::{fmt::Debug, sync::Arc};

use anyhow::Result;
use kstring::KString;

use crate::component::{ActionResult, ComponentDefinition, ComponentInstance,
                       ComponentStack, Frame};
use crate::context::Context;
use crate::declaration::Bindings;
use crate::helper_functions::HelperFunctions;
use crate::response::Response;
use crate::binding::Binding;


/// Elements that do something in any of the phases. Implementations
/// are immutable and shared between all sessions; the state they work
/// on is reached through `components`.
pub trait DynamicElement: Debug + Send + Sync {
    fn take_values_from_request(
        &self,
        _context: &mut Context<'_>,
        _components: &mut ComponentStack<'_>
    ) -> Result<()> {
        Ok(())
    }

    fn invoke_action(
        &self,
        _context: &mut Context<'_>,
        _components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        Ok(None)
    }

    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()>;
}


#[derive(Debug)]
pub enum Element {
    /// Literal template text.
    BareString(String),
    Group(DynamicGroup),
    ComponentReference(ComponentReference),
    Dynamic(Box<dyn DynamicElement>),
}

/// A sequence of children, each at its own element id one level
/// below the group.
#[derive(Debug, Default)]
pub struct DynamicGroup {
    pub name: Option<KString>,
    pub children: Vec<Element>,
}

/// A use of a sub-component in a template.
#[derive(Debug)]
pub struct ComponentReference {
    pub name: KString,
    pub definition: Arc<ComponentDefinition>,
    pub bindings: Bindings,
    pub content: Option<Arc<Element>>,
}


impl Default for Element {
    fn default() -> Self {
        Element::Group(DynamicGroup::default())
    }
}

impl Element {
    pub fn group(name: Option<KString>, children: Vec<Element>) -> Self {
        Element::Group(DynamicGroup { name, children })
    }

    pub fn is_component_reference(&self) -> bool {
        matches!(self, Element::ComponentReference(_))
    }

    pub fn take_values_from_request(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        match self {
            Element::BareString(_) => Ok(()),
            Element::Group(g) => g.take_values_from_request(context, components),
            Element::ComponentReference(r) => r.enter(
                context, components,
                |template, context, components| {
                    template.take_values_from_request(context, components)
                }),
            Element::Dynamic(e) => e.take_values_from_request(context, components),
        }
    }

    pub fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        match self {
            Element::BareString(_) => Ok(None),
            Element::Group(g) => g.invoke_action(context, components),
            Element::ComponentReference(r) => r.enter(
                context, components,
                |template, context, components| {
                    template.invoke_action(context, components)
                }),
            Element::Dynamic(e) => e.invoke_action(context, components),
        }
    }

    pub fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        match self {
            Element::BareString(s) => {
                response.append_content_string(s);
                Ok(())
            }
            Element::Group(g) => g.append_to_response(response, context, components),
            Element::ComponentReference(r) => r.enter(
                context, components,
                |template, context, components| {
                    template.append_to_response(response, context, components)
                }),
            Element::Dynamic(e) => e.append_to_response(response, context, components),
        }
    }
}


impl DynamicGroup {
    pub fn take_values_from_request(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        context.element_id_mut().push();
        let mut result = Ok(());
        for child in &self.children {
            result = child.take_values_from_request(context, components);
            if result.is_err() {
                break
            }
            context.element_id_mut().increment();
        }
        context.element_id_mut().pop();
        result
    }

    /// Children off the path to the sender are skipped; the first
    /// child returning a result ends the traversal.
    pub fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        context.element_id_mut().push();
        let mut result = Ok(None);
        for child in &self.children {
            if context.is_on_sender_path() {
                result = child.invoke_action(context, components);
                if !matches!(result, Ok(None)) {
                    break
                }
            }
            context.element_id_mut().increment();
        }
        context.element_id_mut().pop();
        result
    }

    pub fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        context.element_id_mut().push();
        let mut result = Ok(());
        for child in &self.children {
            result = child.append_to_response(response, context, components);
            if result.is_err() {
                break
            }
            context.element_id_mut().increment();
        }
        context.element_id_mut().pop();
        result
    }
}


impl ComponentReference {
    /// Runs `f` on the sub-component's template with the sub-component
    /// current: the instance is taken out of the parent (or created),
    /// gets the bound values pushed in, and afterwards changed values
    /// of settable bindings are pulled back into the parent.
    fn enter<R>(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>,
        f: impl FnOnce(&Element, &mut Context<'_>, &mut ComponentStack<'_>) -> Result<R>
    ) -> Result<R> {
        let template = self.definition.template(context.registry())?;
        let helpers = context.helpers();
        let key = KString::from_string(context.element_id().to_string());
        let mut child = components.current_mut().take_child(&key)
            .unwrap_or_else(|| self.definition.instantiate());
        if let Err(e) = self.push_bindings(components, &mut child, helpers) {
            components.current_mut().insert_child(key, child);
            return Err(e)
        }

        components.push(Frame { key, instance: child, content: self.content.clone() });
        let result = f(&*template, context, components);
        let Frame { key, instance: child, .. } = components.pop()?;

        let pulled = self.pull_bindings(&child, components);
        components.current_mut().insert_child(key, child);
        let r = result?;
        pulled?;
        Ok(r)
    }

    fn push_bindings(
        &self,
        components: &ComponentStack<'_>,
        child: &mut ComponentInstance,
        helpers: &HelperFunctions
    ) -> Result<()> {
        let parent = components.component();
        for (key, binding) in self.bindings.iter() {
            let value = binding.value_in(parent, helpers)?;
            child.component_mut().take_value_for_key(key, value)?;
        }
        Ok(())
    }

    fn pull_bindings(
        &self,
        child: &ComponentInstance,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        for (key, binding) in self.bindings.iter() {
            if let (Binding::KeyPath(path), Some(value)) = (binding, child.value_for_key(key)) {
                if path.value_in(components.component()) != value {
                    path.set_value_in(components.component_mut(), value)?;
                }
            }
        }
        Ok(())
    }
}


/// Helpers for elements wrapping optional content.
pub fn take_values_from_content(
    content: &Option<Arc<Element>>,
    context: &mut Context<'_>,
    components: &mut ComponentStack<'_>
) -> Result<()> {
    match content {
        Some(element) => element.take_values_from_request(context, components),
        None => Ok(()),
    }
}

pub fn invoke_action_in_content(
    content: &Option<Arc<Element>>,
    context: &mut Context<'_>,
    components: &mut ComponentStack<'_>
) -> Result<Option<ActionResult>> {
    match content {
        Some(element) => element.invoke_action(context, components),
        None => Ok(None),
    }
}

pub fn append_content(
    content: &Option<Arc<Element>>,
    response: &mut Response,
    context: &mut Context<'_>,
    components: &mut ComponentStack<'_>
) -> Result<()> {
    match content {
        Some(element) => element.append_to_response(response, context, components),
        None => Ok(()),
    }
}
