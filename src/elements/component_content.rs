use anyhow::Result;

use crate::component::{ActionResult, ComponentStack};
use crate::context::Context;
use crate::element::{DynamicElement, Element};
use crate::registry::ElementArgs;
use crate::response::Response;


/// Inside a component's template: the content the component was
/// wrapped around where it is used, evaluated in the using
/// (parent) component.
#[derive(Debug)]
pub struct ComponentContent;

impl ComponentContent {
    pub fn construct(args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        args.finish("ComponentContent");
        Ok(Box::new(ComponentContent))
    }
}

/// Runs `f` with the parent component current; nothing happens at
/// page level or if the reference had no content.
fn in_parent<R: Default>(
    context: &mut Context<'_>,
    components: &mut ComponentStack<'_>,
    f: impl FnOnce(&Element, &mut Context<'_>, &mut ComponentStack<'_>)
                   -> Result<R>
) -> Result<R> {
    let frame = match components.suspend() {
        Some(frame) => frame,
        None => return Ok(R::default()),
    };
    let result = match frame.content.clone() {
        Some(content) => f(&*content, context, components),
        None => Ok(R::default()),
    };
    components.push(frame);
    result
}

impl DynamicElement for ComponentContent {
    fn take_values_from_request(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        in_parent(context, components, |content, context, components| {
            content.take_values_from_request(context, components)
        })
    }

    fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        in_parent(context, components, |content, context, components| {
            content.invoke_action(context, components)
        })
    }

    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        in_parent(context, components, |content, context, components| {
            content.append_to_response(response, context, components)
        })
    }
}
