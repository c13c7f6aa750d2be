//! The built-in primitive elements.

pub mod string;
pub mod text_field;
pub mod hyperlink;
pub mod form;
pub mod submit_button;
pub mod repetition;
pub mod conditional;
pub mod component_content;
pub mod update_container;

use anyhow::{Result, bail};

use crate::binding::{Binding, KeyPath};
use crate::component::{ActionResult, ComponentStack};
use crate::context::Context;
use crate::registry::ElementConstructor;
use crate::value::Value;


/// Registered under these names and with a `WO` prefix.
pub const BUILTIN_ELEMENTS: &[(&str, ElementConstructor)] = &[
    ("String", string::StringElement::construct),
    ("TextField", text_field::TextField::construct),
    ("Hyperlink", hyperlink::Hyperlink::construct),
    ("Form", form::Form::construct),
    ("SubmitButton", submit_button::SubmitButton::construct),
    ("Repetition", repetition::Repetition::construct),
    ("Conditional", conditional::Conditional::construct),
    ("ComponentContent", component_content::ComponentContent::construct),
    ("UpdateContainer", update_container::UpdateContainer::construct),
];


pub(crate) fn evaluate(
    binding: &Binding,
    context: &Context<'_>,
    components: &ComponentStack<'_>
) -> Result<Value> {
    binding.value_in(components.component(), context.helpers())
}

pub(crate) fn evaluate_flag(
    binding: Option<&Binding>,
    default: bool,
    context: &Context<'_>,
    components: &ComponentStack<'_>
) -> Result<bool> {
    match binding {
        Some(b) => Ok(evaluate(b, context, components)?.is_truthy()),
        None => Ok(default),
    }
}

/// `action = save;` names the action `save`; constants and helper
/// calls are evaluated to get the name.
pub(crate) fn perform_action(
    action: &Binding,
    context: &Context<'_>,
    components: &mut ComponentStack<'_>
) -> Result<ActionResult> {
    let name = match action {
        Binding::KeyPath(path) => path.to_string(),
        other => evaluate(other, context, components)?.to_display_string(),
    };
    components.component_mut().perform_action(&name, context.application())
}

pub(crate) fn settable(binding: Option<Binding>, key: &str) -> Result<Option<KeyPath>> {
    match binding {
        None => Ok(None),
        Some(Binding::KeyPath(path)) => Ok(Some(path)),
        Some(other) => bail!("binding {key:?} must be a key path, got {other}"),
    }
}
