use std::sync::Arc;

use anyhow::{Result, bail};

use crate::binding::Binding;
use crate::component::{ActionResult, ComponentStack};
use crate::context::Context;
use crate::element::{DynamicElement, Element, append_content};
use crate::elements::{evaluate, perform_action};
use crate::registry::ElementArgs;
use crate::response::Response;
use crate::url_encoding::url_encode;
use crate::webutils::element_with_attributes;


#[derive(Debug)]
enum Target {
    /// Component action on the current component.
    Action(Binding),
    Href(Binding),
    /// `/wa/<name>`
    DirectAction(Binding),
}

/// `<a>`, to one of: a component action (`action`), a fixed URL
/// (`href`) or a direct action (`directActionName`). The link text is
/// `string` or else the content.
#[derive(Debug)]
pub struct Hyperlink {
    target: Target,
    string: Option<Binding>,
    content: Option<Arc<Element>>,
}

impl Hyperlink {
    pub fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        let mut targets = Vec::new();
        if let Some(b) = args.take("action") {
            targets.push(Target::Action(b));
        }
        if let Some(b) = args.take("href") {
            targets.push(Target::Href(b));
        }
        if let Some(b) = args.take("directActionName") {
            targets.push(Target::DirectAction(b));
        }
        if targets.len() != 1 {
            bail!("need exactly one of the bindings \"action\", \"href\", \
                   \"directActionName\", got {}", targets.len())
        }
        let target = targets.remove(0);
        let string = args.take("string");
        let content = args.finish("Hyperlink");
        Ok(Box::new(Hyperlink { target, string, content }))
    }
}

impl DynamicElement for Hyperlink {
    fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        match &self.target {
            Target::Action(action) if context.current_element_is_sender() =>
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
        let href = match &self.target {
            Target::Action(_) => context.component_action_url(),
            Target::Href(b) => evaluate(b, context, components)?.to_display_string(),
            Target::DirectAction(b) => {
                let name = evaluate(b, context, components)?.to_display_string();
                format!("/wa/{}", url_encode(&name))
            }
        };
        response.append_content_string(
            &element_with_attributes("a", &[("href", Some(&href))], false));
        match &self.string {
            Some(b) => {
                let s = evaluate(b, context, components)?.to_display_string();
                response.append_html_escaped(&s);
            }
            None => append_content(&self.content, response, context, components)?,
        }
        response.append_content_string("</a>");
        Ok(())
    }
}
