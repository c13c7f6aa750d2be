use anyhow::Result;

use crate::binding::Binding;
use crate::component::ComponentStack;
use crate::context::Context;
use crate::element::DynamicElement;
use crate::elements::evaluate;
use crate::registry::ElementArgs;
use crate::response::Response;
use crate::value::Value;
use crate::webutils::element_with_attributes;


/// A text input. The submitted value is written through `value`
/// (when that is a key path). The form field name defaults to the
/// element id.
#[derive(Debug)]
pub struct TextField {
    value: Binding,
    name: Option<Binding>,
}

impl TextField {
    pub fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        let value = args.required("value")?;
        let name = args.take("name");
        args.finish("TextField");
        Ok(Box::new(TextField { value, name }))
    }

    fn field_name(&self, context: &Context<'_>, components: &ComponentStack<'_>)
                  -> Result<String> {
        match &self.name {
            Some(b) => Ok(evaluate(b, context, components)?.to_display_string()),
            None => Ok(context.element_id().to_string()),
        }
    }
}

impl DynamicElement for TextField {
    fn take_values_from_request(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        if !self.value.is_settable() {
            return Ok(())
        }
        let name = self.field_name(context, components)?;
        if let Some(v) = context.request().form_value(&name) {
            self.value.set_value_in(components.component_mut(), Value::from(v))?;
        }
        Ok(())
    }

    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        let name = self.field_name(context, components)?;
        let value = evaluate(&self.value, context, components)?.to_display_string();
        response.append_content_string(&element_with_attributes(
            "input",
            &[("type", Some("text")), ("name", Some(&name)), ("value", Some(&value))],
            true));
        Ok(())
    }
}
