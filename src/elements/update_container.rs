use std::sync::Arc;

use anyhow::Result;
use kstring::KString;

use crate::binding::Binding;
use crate::component::{ActionResult, ComponentStack};
use crate::context::Context;
use crate::element::{DynamicElement, Element, append_content, invoke_action_in_content,
                     take_values_from_content};
use crate::elements::evaluate;
use crate::registry::ElementArgs;
use crate::response::Response;
use crate::webutils::element_with_attributes;


/// A `<div id=...>` (or `elementName`) that can be rendered on its
/// own: when the request carries the update container header naming
/// `id`, everything outside of it is left out of the response.
#[derive(Debug)]
pub struct UpdateContainer {
    id: Binding,
    element_name: Option<Binding>,
    content: Option<Arc<Element>>,
}

impl UpdateContainer {
    pub fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
        let id = args.required("id")?;
        let element_name = args.take("elementName");
        let content = args.finish("UpdateContainer");
        Ok(Box::new(UpdateContainer { id, element_name, content }))
    }
}

impl DynamicElement for UpdateContainer {
    fn take_values_from_request(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        take_values_from_content(&self.content, context, components)
    }

    fn invoke_action(
        &self,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<Option<ActionResult>> {
        invoke_action_in_content(&self.content, context, components)
    }

    fn append_to_response(
        &self,
        response: &mut Response,
        context: &mut Context<'_>,
        components: &mut ComponentStack<'_>
    ) -> Result<()> {
        let id = evaluate(&self.id, context, components)?.to_display_string();
        let element_name = match &self.element_name {
            Some(b) => evaluate(b, context, components)?.to_display_string(),
            None => "div".into(),
        };
        context.push_update_container(KString::from_ref(&id));
        response.set_muted(!context.should_render());
        response.append_content_string(
            &element_with_attributes(&element_name, &[("id", Some(&id))], false));
        let result = append_content(&self.content, response, context, components);
        response.append_content_string(&format!("</{element_name}>"));
        context.pop_update_container();
        response.set_muted(!context.should_render());
        result
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Application;
    use crate::component::{Component, ComponentDefinition};
    use crate::config::AppConfig;
    use crate::context::UPDATE_CONTAINER_HEADER;
    use crate::http_request_method::HttpRequestMethod;
    use crate::request::Request;
    use crate::session::Session;
    use crate::value::Value;

    #[derive(Debug, Default)]
    struct Ticker {
        n: i64,
    }

    impl Component for Ticker {
        fn value_for_key(&self, key: &str) -> Option<Value> {
            match key {
                "n" => Some(self.n.into()),
                _ => None,
            }
        }
    }

    fn render(request: &Request) -> Result<String> {
        let mut app = Application::new(AppConfig::default());
        app.register_component(ComponentDefinition::new(
            "Ticker",
            "before<webobject name=\"U\">n=<wo:String value=\"$n\"/>\
             <wo:UpdateContainer id=\"inner\" elementName=\"span\">!</wo:UpdateContainer>\
             </webobject>after",
            "U : UpdateContainer { id = \"box\"; }",
            || Box::new(Ticker { n: 7 })))?;
        let session = Session::new("s", 5);
        let mut context = Context::new(&app, request, &session);
        let mut page = app.page_with_name("Ticker")?;
        let response = page.generate_response(&mut context)?;
        Ok(response.content_str().into_owned())
    }

    #[test]
    fn t_full_page() -> Result<()> {
        let request = Request::new(HttpRequestMethod::GET, "/")?;
        assert_eq!(render(&request)?,
                   "before<div id=\"box\">n=7<span id=\"inner\">!</span></div>after");
        Ok(())
    }

    #[test]
    fn t_partial_update() -> Result<()> {
        let request = Request::new(HttpRequestMethod::GET, "/")?
            .with_header(UPDATE_CONTAINER_HEADER, "box");
        assert_eq!(render(&request)?, "<div id=\"box\">n=7<span id=\"inner\">!</span></div>");

        let request = Request::new(HttpRequestMethod::GET, "/")?
            .with_header(UPDATE_CONTAINER_HEADER, "inner");
        assert_eq!(render(&request)?, "<span id=\"inner\">!</span>");

        let request = Request::new(HttpRequestMethod::GET, "/")?
            .with_header(UPDATE_CONTAINER_HEADER, "elsewhere");
        assert_eq!(render(&request)?, "");
        Ok(())
    }
}
