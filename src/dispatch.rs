//! Handling of component action requests (`/wo/<contextID>.<senderID>`):
//! restore the page, let it take the form values, run the action of the
//! sender, render the result.

use std::fmt::{self, Display};

use anyhow::anyhow;

use crate::address::{AddressError, ComponentAddress};
use crate::component::{ActionResult, ComponentInstance};
use crate::context::Context;
use crate::page_cache::PageCacheMiss;
use crate::response::Response;
use crate::router::Handler;
use crate::webutils::{bad_request_page, internal_error_page, page_expired_page,
                      randomidstring};
use crate::{debug, info, warn};


/// Where the default direct action lives, to start over from.
pub const RESTART_URL: &str = "/wa/default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    ValidateAddress,
    RestorePage,
    Awaken,
    TakeValues,
    InvokeAction,
    GenerateResponse,
}

impl Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispatchPhase::ValidateAddress => "validate address",
            DispatchPhase::RestorePage => "restore page",
            DispatchPhase::Awaken => "awaken",
            DispatchPhase::TakeValues => "take values",
            DispatchPhase::InvokeAction => "invoke action",
            DispatchPhase::GenerateResponse => "generate response",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("malformed component action address: {0}")]
    MalformedAddress(#[from] AddressError),
    #[error("page expired: {0}")]
    PageExpired(#[from] PageCacheMiss),
    #[error("{phase}: {source:#}")]
    Internal { phase: DispatchPhase, source: anyhow::Error },
}

impl DispatchError {
    pub fn phase(&self) -> DispatchPhase {
        match self {
            DispatchError::MalformedAddress(_) => DispatchPhase::ValidateAddress,
            DispatchError::PageExpired(_) => DispatchPhase::RestorePage,
            DispatchError::Internal { phase, .. } => *phase,
        }
    }

    pub fn to_response(&self) -> Response {
        match self {
            DispatchError::MalformedAddress(e) => {
                info!("bad request: {e}");
                bad_request_page(&e.to_string())
            }
            DispatchError::PageExpired(e) => {
                info!("{e}");
                page_expired_page(RESTART_URL)
            }
            DispatchError::Internal { .. } => internal_error_response(self),
        }
    }
}

/// Logs `error` tagged with a fresh id, returns the 500 page showing
/// the id.
pub fn internal_error_response(error: &dyn Display) -> Response {
    let id = randomidstring().unwrap_or_else(|e| {
        warn!("randomidstring: {e}");
        "-".into()
    });
    warn!("internal error {id}: {error}");
    internal_error_page(&id)
}

trait InPhase<T> {
    fn in_phase(self, phase: DispatchPhase) -> Result<T, DispatchError>;
}

impl<T> InPhase<T> for anyhow::Result<T> {
    fn in_phase(self, phase: DispatchPhase) -> Result<T, DispatchError> {
        self.map_err(|source| DispatchError::Internal { phase, source })
    }
}


/// Render `page` as the response to the current request; the page
/// is not stored.
fn render(page: &mut ComponentInstance, context: &mut Context<'_>)
          -> Result<Response, DispatchError> {
    page.generate_response(context).in_phase(DispatchPhase::GenerateResponse)
}

pub fn dispatch_component_action(context: &mut Context<'_>) -> Result<Response, DispatchError> {
    let request = context.request();
    let session = context.session();

    let address = ComponentAddress::from_path_segments(request.raw_path_segments().as_slice())?;
    debug!("component action {address}");
    context.begin_component_action(&address);

    debug!("{address}: {}", DispatchPhase::RestorePage);
    let page_ref = session.restore_page(&address.context_id)?;
    let mut page = page_ref.lock()
        .map_err(|_| anyhow!("page {:?} is poisoned", address.context_id))
        .in_phase(DispatchPhase::RestorePage)?;

    debug!("{address}: {}", DispatchPhase::Awaken);
    page.awake();

    if request.has_form_values() {
        debug!("{address}: {}", DispatchPhase::TakeValues);
        page.take_values_from_request(context).in_phase(DispatchPhase::TakeValues)?;
    }

    debug!("{address}: {}", DispatchPhase::InvokeAction);
    let result = page.invoke_action(context).in_phase(DispatchPhase::InvokeAction)?;

    debug!("{address}: {}", DispatchPhase::GenerateResponse);
    match result {
        None => {
            warn!("no element with sender id {:?} took the action on page {:?}",
                  address.sender_id.to_string(), page.name());
            render(&mut page, context)
        }
        Some(ActionResult::None) => render(&mut page, context),
        Some(ActionResult::Page(mut new_page)) => {
            drop(page);
            new_page.awake();
            let response = render(&mut new_page, context)?;
            // Same context id, the old page is replaced.
            session.save_page(address.context_id.clone(), new_page.into_page_ref());
            Ok(response)
        }
        Some(ActionResult::Other(result)) => {
            result.generate_response().in_phase(DispatchPhase::GenerateResponse)
        }
    }
}


/// Serves `/wo/...`.
#[derive(Debug)]
pub struct ComponentRequestHandler;

impl Handler for ComponentRequestHandler {
    fn call(&self, context: &mut Context<'_>) -> anyhow::Result<Option<Response>> {
        Ok(Some(match dispatch_component_action(context) {
            Ok(response) => response,
            Err(e) => e.to_response(),
        }))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{Result, bail};

    use super::*;
    use crate::application::Application;
    use crate::binding::Binding;
    use crate::component::{Component, ComponentDefinition, ComponentStack};
    use crate::config::AppConfig;
    use crate::element::DynamicElement;
    use crate::elements::perform_action;
    use crate::http_request_method::HttpRequestMethod;
    use crate::http_response_status_codes::HttpResponseStatusCode;
    use crate::registry::ElementArgs;
    use crate::request::Request;
    use crate::session::Session;
    use crate::value::Value;

    /// Shows its element id, with a `*` if it is the sender.
    #[derive(Debug)]
    struct Probe {
        action: Option<Binding>,
    }

    impl Probe {
        fn construct(mut args: ElementArgs) -> Result<Box<dyn DynamicElement>> {
            let action = args.take("action");
            args.finish("Probe");
            Ok(Box::new(Probe { action }))
        }
    }

    impl DynamicElement for Probe {
        fn invoke_action(
            &self,
            context: &mut Context<'_>,
            components: &mut ComponentStack<'_>
        ) -> Result<Option<ActionResult>> {
            match &self.action {
                Some(a) if context.current_element_is_sender() =>
                    Ok(Some(perform_action(a, context, components)?)),
                _ => Ok(None),
            }
        }

        fn append_to_response(
            &self,
            response: &mut Response,
            context: &mut Context<'_>,
            _components: &mut ComponentStack<'_>
        ) -> Result<()> {
            let star = if context.current_element_is_sender() { "*" } else { "" };
            response.append_content_string(&format!("[{}{star}]", context.element_id()));
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Main {
        count: i64,
        name: String,
    }

    impl Component for Main {
        fn value_for_key(&self, key: &str) -> Option<Value> {
            match key {
                "count" => Some(self.count.into()),
                "name" => Some(self.name.clone().into()),
                _ => None,
            }
        }

        fn take_value_for_key(&mut self, key: &str, value: Value) -> Result<()> {
            match (key, value) {
                ("count", Value::Int(i)) => self.count = i,
                ("name", v) => self.name = v.to_display_string(),
                (key, value) => bail!("can't set {key:?} to {value:?}"),
            }
            Ok(())
        }

        fn perform_action(&mut self, name: &str, application: &Application)
                          -> Result<ActionResult> {
            match name {
                "nothing" => Ok(ActionResult::None),
                "count" => {
                    self.count += 1;
                    Ok(ActionResult::None)
                }
                "next" => Ok(application.page_with_name("Second")?.into()),
                "text" => Ok(Response::text(HttpResponseStatusCode::OK200, "plain").into()),
                "fail" => bail!("failing on purpose"),
                _ => bail!("unknown action {name:?}"),
            }
        }
    }

    #[derive(Debug, Default)]
    struct Child {
        value: i64,
    }

    impl Component for Child {
        fn value_for_key(&self, key: &str) -> Option<Value> {
            match key {
                "value" => Some(self.value.into()),
                _ => None,
            }
        }

        fn take_value_for_key(&mut self, key: &str, value: Value) -> Result<()> {
            match (key, value) {
                ("value", Value::Int(i)) => self.value = i,
                (key, value) => bail!("can't set {key:?} to {value:?}"),
            }
            Ok(())
        }

        fn perform_action(&mut self, name: &str, _application: &Application)
                          -> Result<ActionResult> {
            match name {
                "bump" => {
                    self.value += 1;
                    Ok(ActionResult::None)
                }
                _ => bail!("unknown action {name:?}"),
            }
        }
    }

    const MAIN_DECLARATIONS: &str = "
        P : Probe { action = nothing; }
        N : Probe { action = next; }
        X : Probe { action = \"text\"; }
        E : Probe { action = fail; }";

    fn application() -> Result<Application> {
        let mut app = Application::new(AppConfig::default());
        app.register_element("Probe", Probe::construct)?
            .register_component(ComponentDefinition::new(
                "Main",
                "T<webobject name=\"P\"/><webobject name=\"P\"/><webobject name=\"P\"/>\
                 <webobject name=\"P\"/><webobject name=\"N\"/><webobject name=\"X\"/>\
                 <webobject name=\"E\"/>",
                MAIN_DECLARATIONS,
                || Box::new(Main::default())))?
            .register_component(ComponentDefinition::new(
                "Second", "second: <wo:String value=\"$count\"/>", "",
                || Box::new(Main { count: 42, name: "second".into() })))?
            .register_component(ComponentDefinition::new(
                "FormPage",
                "<webobject name=\"F\"><webobject name=\"T\"/><webobject name=\"B\"/></webobject>\
                 <webobject name=\"C\"/>",
                "F : Form {}
                 T : TextField { value = name; }
                 B : SubmitButton { action = count; value = \"Go\"; }
                 C : String { value = count; }",
                || Box::new(Main::default())))?
            .register_component(ComponentDefinition::new(
                "Parent",
                "T<webobject name=\"Sub\"><i><webobject name=\"PS\"/></i></webobject>",
                "Sub : Child { value = count; }
                 PS : String { value = count; }",
                || Box::new(Main::default())))?
            .register_component(ComponentDefinition::new(
                "Child",
                "<webobject name=\"V\"/>|<webobject name=\"CC\"/>|<webobject name=\"L\"/>",
                "V : String { value = value; }
                 CC : ComponentContent {}
                 L : Hyperlink { action = bump; string = \"bump\"; }",
                || Box::new(Child::default())))?;
        Ok(app)
    }

    /// A session with a page of type `name` cached under context id 3.
    fn session_with_page(app: &Application, name: &str) -> Result<Arc<Session>> {
        let session = app.sessions().get_or_create("s1");
        session.save_page("3".into(), app.page_with_name(name)?.into_page_ref());
        Ok(session)
    }

    fn get(app: &Application, session: &Session, uri: &str) -> Result<Response> {
        Ok(app.dispatch_request(&Request::new(HttpRequestMethod::GET, uri)?, session))
    }

    #[test]
    fn t_no_result_rerenders_same_page() -> Result<()> {
        let app = application()?;
        let session = session_with_page(&app, "Main")?;
        let before = session.restore_page("3")?;
        let response = get(&app, &session, "/wo/3.4")?;
        assert_eq!(response.status.code(), 200);
        assert_eq!(response.content_str(), "T[1][2][3][4*][5][6][7]");
        let after = session.restore_page("3")?;
        assert!(Arc::ptr_eq(&before, &after));
        Ok(())
    }

    #[test]
    fn t_new_page_replaces_cache_entry() -> Result<()> {
        let app = application()?;
        let session = session_with_page(&app, "Main")?;
        let before = session.restore_page("3")?;
        let response = get(&app, &session, "/wo/3.5")?;
        assert_eq!(response.content_str(), "second: 42");
        let after = session.restore_page("3")?;
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.lock().unwrap().name(), "Second");
        assert_eq!(session.page_count(), 1);
        Ok(())
    }

    #[test]
    fn t_other_result_and_errors() -> Result<()> {
        let app = application()?;
        let session = session_with_page(&app, "Main")?;
        let response = get(&app, &session, "/wo/3.6")?;
        assert_eq!(response.content_str(), "plain");

        let response = get(&app, &session, "/wo/3.7")?;
        assert_eq!(response.status.code(), 500);
        // The failed request leaves the cached page in place
        assert!(session.has_page("3"));

        assert_eq!(get(&app, &session, "/wo/9.1")?.status.code(), 410);
        assert!(get(&app, &session, "/wo/9.1")?.content_str().contains(RESTART_URL));
        assert_eq!(get(&app, &session, "/wo/3.")?.status.code(), 400);
        assert_eq!(get(&app, &session, "/wo/3,4")?.status.code(), 400);
        assert_eq!(get(&app, &session, "/wo/3.4/5")?.status.code(), 400);
        assert_eq!(get(&app, &session, "/wo/3.4/")?.status.code(), 400);
        assert_eq!(get(&app, &session, "/wo//3.4")?.status.code(), 400);
        // unknown sender: page rendered again
        assert_eq!(get(&app, &session, "/wo/3.99")?.content_str(), "T[1][2][3][4][5][6][7]");
        Ok(())
    }

    #[test]
    fn t_form_submission() -> Result<()> {
        let app = application()?;
        let session = session_with_page(&app, "FormPage")?;
        let response = get(&app, &session, "/wo/3.1")?;
        assert_eq!(
            response.content_str(),
            "<form method=\"post\" action=\"/wo/3.0\">\
             <input type=\"text\" name=\"0.0\" value=\"\" />\
             <input type=\"submit\" name=\"0.1\" value=\"Go\" /></form>0");

        let request = Request::new(HttpRequestMethod::POST, "/wo/3.0")?
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_content(b"0.0=Bob+%26+Co&0.1=Go".to_vec())?;
        let response = app.dispatch_request(&request, &session);
        let html = response.content_str();
        assert!(html.contains("value=\"Bob &amp; Co\""), "{html}");
        assert!(html.ends_with("</form>1"), "{html}");
        Ok(())
    }

    #[test]
    fn t_subcomponent_bindings() -> Result<()> {
        let app = application()?;
        let session = session_with_page(&app, "Parent")?;
        let response = get(&app, &session, "/wo/3.99")?;
        assert_eq!(response.content_str(),
                   "T0|<i>0</i>|<a href=\"/wo/3.1.4\">bump</a>");
        let page = session.restore_page("3")?;
        assert!(page.lock().unwrap().child("1").is_some());

        let response = get(&app, &session, "/wo/3.1.4")?;
        assert_eq!(response.content_str(),
                   "T1|<i>1</i>|<a href=\"/wo/3.1.4\">bump</a>");
        assert_eq!(page.lock().unwrap().value_for_key("count"), Some(Value::Int(1)));
        Ok(())
    }

    /// Counts `awake` calls and notes whether a form value was taken.
    #[derive(Debug, Default)]
    struct Tracked {
        awakes: i64,
        took: bool,
        name: String,
    }

    impl Component for Tracked {
        fn value_for_key(&self, key: &str) -> Option<Value> {
            match key {
                "awakes" => Some(self.awakes.into()),
                "took" => Some(self.took.into()),
                "name" => Some(self.name.clone().into()),
                _ => None,
            }
        }

        fn take_value_for_key(&mut self, key: &str, value: Value) -> Result<()> {
            match key {
                "name" => {
                    self.name = value.to_display_string();
                    self.took = true;
                }
                _ => bail!("can't set {key:?}"),
            }
            Ok(())
        }

        fn perform_action(&mut self, name: &str, application: &Application)
                          -> Result<ActionResult> {
            match name {
                "next" => Ok(application.page_with_name("Awoken")?.into()),
                "fail" => bail!("failing on purpose"),
                _ => bail!("unknown action {name:?}"),
            }
        }

        fn awake(&mut self) {
            self.awakes += 1;
        }
    }

    fn tracked_application() -> Result<Application> {
        let mut app = Application::new(AppConfig::default());
        app.register_component(ComponentDefinition::new(
            "Tracked",
            "<webobject name=\"F\"><webobject name=\"T\"/>!</webobject>\
             <webobject name=\"Sub\"/><webobject name=\"N\"/><webobject name=\"E\"/>",
            "F : Form {}
             T : TextField { value = name; }
             Sub : Awoken {}
             N : Hyperlink { action = next; string = \"next\"; }
             E : Hyperlink { action = fail; string = \"fail\"; }",
            || Box::new(Tracked::default())))?
            .register_component(ComponentDefinition::new(
                "Awoken", "<wo:String value=\"$awakes\"/>", "",
                || Box::new(Tracked::default())))?;
        Ok(app)
    }

    fn post(app: &Application, session: &Session, uri: &str, body: &str) -> Result<Response> {
        let request = Request::new(HttpRequestMethod::POST, uri)?
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_content(body.as_bytes().to_vec())?;
        Ok(app.dispatch_request(&request, session))
    }

    #[test]
    fn t_awake_and_take_values() -> Result<()> {
        let app = tracked_application()?;
        let session = session_with_page(&app, "Tracked")?;
        let page = session.restore_page("3")?;
        let value = |key: &str| page.lock().unwrap().value_for_key(key);

        // no form values: awakened, nothing taken
        assert_eq!(get(&app, &session, "/wo/3.99")?.status.code(), 200);
        assert_eq!(value("awakes"), Some(Value::Int(1)));
        assert_eq!(value("took"), Some(Value::Bool(false)));
        let child_awakes = || page.lock().unwrap().child("1")
            .and_then(|c| c.value_for_key("awakes"));
        // created while rendering, after the page was awakened
        assert_eq!(child_awakes(), Some(Value::Int(0)));

        assert_eq!(post(&app, &session, "/wo/3.0", "0.0=Bob")?.status.code(), 200);
        assert_eq!(value("awakes"), Some(Value::Int(2)));
        assert_eq!(value("took"), Some(Value::Bool(true)));
        assert_eq!(value("name"), Some(Value::from("Bob")));
        assert_eq!(child_awakes(), Some(Value::Int(1)));

        // the replacement page is awakened before it is rendered
        let response = get(&app, &session, "/wo/3.2")?;
        assert_eq!(response.content_str(), "1");
        let replaced = session.restore_page("3")?;
        assert_eq!(replaced.lock().unwrap().name(), "Awoken");
        Ok(())
    }

    #[test]
    fn t_failed_action_keeps_taken_values() -> Result<()> {
        let app = tracked_application()?;
        let session = session_with_page(&app, "Tracked")?;
        let response = post(&app, &session, "/wo/3.3", "0.0=Eve")?;
        assert_eq!(response.status.code(), 500);
        let page = session.restore_page("3")?;
        let page = page.lock().unwrap();
        assert_eq!(page.name(), "Tracked");
        assert_eq!(page.value_for_key("name"), Some(Value::from("Eve")));
        Ok(())
    }
}
