use anyhow::Result;

use crate::binding::Binding;
use crate::component::{ActionResult, ComponentStack};
use crate::context::Context;
use crate::element::DynamicElement;
use crate::elements::{evaluate, perform_action};
use crate::registry::ElementArgs;
use crate::response::Response;
use crate::webutils::element_with_attributes;


/// `<input type="submit">`. Browsers only send the name of the button
/// that was clicked, which is how the button finds out that it was
/// used.
#[derive(Debug)]
pub struct SubmitButton {
    action: Option<Binding>,
    value: Option<Binding>,
}

impl SubmitButton {
    pub fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        let action = args.take("action");
        let value = args.take("value");
        args.finish("SubmitButton");
        Ok(Box::new(SubmitButton { action, value }))
    }

    fn was_used(&self, context: &Context<'_>) -> bool {
        context.current_element_is_sender()
            || (context.is_in_form()
                && context.request().form_values().contains(&context.element_id().to_string()))
    }
}

impl DynamicElement for SubmitButton {
    fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        match &self.action {
            Some(action) if self.was_used(context) =>
                Ok(Some(perform_action(action, context, components)?)),
            _ => Ok(None),
        }
    }

    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        let name = context.element_id().to_string();
        let value = match &self.value {
            Some(b) => evaluate(b, context, components)?.to_display_string(),
            None => "Submit".into(),
        };
        response.append_content_string(&element_with_attributes(
            "input",
            &[("type", Some("submit")), ("name", Some(&name)), ("value", Some(&value))],
            true));
        Ok(())
    }
}
