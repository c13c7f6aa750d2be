use anyhow::Result;

use crate::binding::Binding;
use crate::component::ComponentStack;
use crate::context::Context;
use crate::element::DynamicElement;
use crate::elements::{evaluate, evaluate_flag};
use crate::registry::ElementArgs;
use crate::response::Response;


/// Prints `value`, HTML-escaped unless `escapeHTML` is false.
#[derive(Debug)]
pub struct StringElement {
    value: Binding,
    escape_html: Option<Binding>,
    value_when_empty: Option<Binding>,
}

impl StringElement {
    pub fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        let value = args.required("value")?;
        let escape_html = args.take("escapeHTML");
        let value_when_empty = args.take("valueWhenEmpty");
        args.finish("String");
        Ok(Box::new(StringElement { value, escape_html, value_when_empty }))
    }
}

impl DynamicElement for StringElement {
    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        let mut s = evaluate(&self.value, context, components)?.to_display_string();
        if s.is_empty() {
            if let Some(b) = &self.value_when_empty {
                s = evaluate(b, context, components)?.to_display_string();
            }
        }
        if evaluate_flag(self.escape_html.as_ref(), true, context, components)? {
            response.append_html_escaped(&s);
        } else {
            response.append_content_string(&s);
        }
        Ok(())
    }
}
