use std::sync::Arc;

use anyhow::Result;

use crate::binding::Binding;
use crate::component::{ActionResult, ComponentStack};
use crate::context::Context;
use crate::element::{DynamicElement, Element, append_content, invoke_action_in_content,
                     take_values_from_content};
use crate::elements::perform_action;
use crate::registry::ElementArgs;
use crate::response::Response;
use crate::webutils::element_with_attributes;


/// `<form>` posting to its own component action URL. On submission
/// the submit button that was used runs its action; if none did,
/// the form's own `action` (if any) runs.
#[derive(Debug)]
pub struct Form {
    action: Option<Binding>,
    content: Option<Arc<Element>>,
}

impl Form {
    pub fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        let action = args.take("action");
        let content = args.finish("Form");
        Ok(Box::new(Form { action, content }))
    }

    fn invoke_inner(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        let is_sender = context.current_element_is_sender();
        if let Some(result) = invoke_action_in_content(&self.content, context, components)? {
            return Ok(Some(result))
        }
        if !is_sender {
            return Ok(None)
        }
        match &self.action {
            Some(action) => Ok(Some(perform_action(action, context, components)?)),
            None => Ok(Some(ActionResult::None)),
        }
    }
}

impl DynamicElement for Form {
    fn take_values_from_request(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        context.set_is_in_form(true);
        let result = take_values_from_content(&self.content, context, components);
        context.set_is_in_form(false);
        result
    }

    fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        context.set_is_in_form(true);
        let result = self.invoke_inner(context, components);
        context.set_is_in_form(false);
        result
    }

    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        let url = context.component_action_url();
        response.append_content_string(&element_with_attributes(
            "form", &[("method", Some("post")), ("action", Some(&url))], false));
        context.set_is_in_form(true);
        let result = append_content(&self.content, response, context, components);
        context.set_is_in_form(false);
        result?;
        response.append_content_string("</form>");
        Ok(())
    }
}
