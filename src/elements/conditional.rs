use std::sync::Arc;

use anyhow::Result;

use crate::binding::Binding;
use crate::component::{ActionResult, ComponentStack};
use crate::context::Context;
use crate::element::{DynamicElement, Element, append_content, invoke_action_in_content,
                     take_values_from_content};
use crate::elements::evaluate_flag;
use crate::registry::ElementArgs;
use crate::response::Response;


/// Content only if `condition` is truthy (falsy, with `negate`).
#[derive(Debug)]
pub struct Conditional {
    condition: Binding,
    negate: Option<Binding>,
    content: Option<Arc<Element>>,
}

impl Conditional {
    pub fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        let condition = args.required("condition")?;
        let negate = args.take("negate");
        let content = args.finish("Conditional");
        Ok(Box::new(Conditional { condition, negate, content }))
    }

    fn is_shown(&self, context: &Context<'_>, components: &ComponentStack<'_>)
                -> Result<bool> {
        let c = evaluate_flag(Some(&self.condition), false, context, components)?;
        let negate = evaluate_flag(self.negate.as_ref(), false, context, components)?;
        Ok(c != negate)
    }
}

impl DynamicElement for Conditional {
    fn take_values_from_request(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        if self.is_shown(context, components)? {
            take_values_from_content(&self.content, context, components)?;
        }
        Ok(())
    }

    fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        if self.is_shown(context, components)? {
            invoke_action_in_content(&self.content, context, components)
        } else {
            Ok(None)
        }
    }

    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        if self.is_shown(context, components)? {
            append_content(&self.content, response, context, components)?;
        }
        Ok(())
    }
}
