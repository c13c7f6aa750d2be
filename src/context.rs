//! Per-request state threaded through the element traversals.

use kstring::KString;

use crate::address::{ComponentAddress, component_action_url};
use crate::application::Application;
use crate::element_id::ElementId;
use crate::helper_functions::HelperFunctions;
use crate::registry::Registry;
use crate::request::Request;
use crate::session::Session;


/// Set on requests that only want one update container re-rendered.
pub const UPDATE_CONTAINER_HEADER: &str = "x-updatecontainerid";

pub struct Context<'a> {
    application: &'a Application,
    request: &'a Request,
    session: &'a Session,
    /// Allocated from the session on first use, unless taken over
    /// from the incoming address.
    context_id: Option<KString>,
    originating_context_id: Option<KString>,
    sender_id: Option<ElementId>,
    element_id: ElementId,
    is_in_form: bool,
    /// Ids of the update containers enclosing the current element.
    update_container_ids: Vec<KString>,
}

impl<'a> Context<'a> {
    pub fn new(application: &'a Application, request: &'a Request, session: &'a Session)
               -> Self {
        Context {
            application,
            request,
            session,
            context_id: None,
            originating_context_id: None,
            sender_id: None,
            element_id: ElementId::new(),
            is_in_form: false,
            update_container_ids: Vec::new(),
        }
    }

    /// For a request to a component action URL: the page answering
    /// it keeps the context id it was rendered with.
    pub fn begin_component_action(&mut self, address: &ComponentAddress) {
        self.originating_context_id = Some(address.context_id.clone());
        self.context_id = Some(address.context_id.clone());
        self.sender_id = Some(address.sender_id.clone());
    }

    pub fn application(&self) -> &'a Application {
        self.application
    }

    pub fn registry(&self) -> &'a Registry {
        self.application.registry()
    }

    pub fn helpers(&self) -> &'a HelperFunctions {
        self.application.registry().helpers()
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn session(&self) -> &'a Session {
        self.session
    }

    /// The context id the response is rendered under.
    pub fn context_id(&mut self) -> KString {
        if let Some(id) = &self.context_id {
            return id.clone()
        }
        let id = self.session.next_context_id();
        self.context_id = Some(id.clone());
        id
    }

    pub fn has_context_id(&self) -> bool {
        self.context_id.is_some()
    }

    pub fn originating_context_id(&self) -> Option<&str> {
        self.originating_context_id.as_deref()
    }

    pub fn sender_id(&self) -> Option<&ElementId> {
        self.sender_id.as_ref()
    }

    pub fn element_id(&self) -> &ElementId {
        &self.element_id
    }

    pub fn element_id_mut(&mut self) -> &mut ElementId {
        &mut self.element_id
    }

    pub fn reset_element_id(&mut self) {
        self.element_id.clear();
    }

    pub fn current_element_is_sender(&self) -> bool {
        self.sender_id.as_ref() == Some(&self.element_id)
    }

    /// Whether the sender is at or below the current element, or the
    /// current element is below the sender (the controls inside a
    /// submitted form).
    pub fn is_on_sender_path(&self) -> bool {
        match &self.sender_id {
            Some(sender) => sender.starts_with(&self.element_id)
                || self.element_id.starts_with(sender),
            None => false,
        }
    }

    pub fn is_in_form(&self) -> bool {
        self.is_in_form
    }

    pub fn set_is_in_form(&mut self, on: bool) {
        self.is_in_form = on;
    }

    /// The container asked for by a partial update request.
    pub fn requested_update_container(&self) -> Option<&'a str> {
        self.request.header(UPDATE_CONTAINER_HEADER)
    }

    pub fn push_update_container(&mut self, id: KString) {
        self.update_container_ids.push(id);
    }

    pub fn pop_update_container(&mut self) -> Option<KString> {
        self.update_container_ids.pop()
    }

    /// Whether output at the current position belongs in the
    /// response: always, unless a partial update was requested and
    /// the requested container isn't being rendered.
    pub fn should_render(&self) -> bool {
        match self.requested_update_container() {
            Some(id) => self.update_container_ids.iter().any(|c| c.as_str() == id),
            None => true,
        }
    }

    /// The URL that addresses the current element of the page being
    /// rendered.
    pub fn component_action_url(&mut self) -> String {
        let context_id = self.context_id();
        component_action_url(&context_id, &self.element_id)
    }
}


#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::config::AppConfig;
    use crate::http_request_method::HttpRequestMethod;

    #[test]
    fn t_context_ids() -> Result<()> {
        let app = Application::new(AppConfig::default());
        let session = Session::new("s", 5);
        let request = Request::new(HttpRequestMethod::GET, "/")?;
        let mut context = Context::new(&app, &request, &session);
        assert!(!context.has_context_id());
        assert_eq!(context.context_id().as_str(), "0");
        assert_eq!(context.context_id().as_str(), "0");

        let mut context = Context::new(&app, &request, &session);
        context.begin_component_action(&ComponentAddress::parse("7.0.1")?);
        assert_eq!(context.context_id().as_str(), "7");
        assert_eq!(context.originating_context_id(), Some("7"));
        assert_eq!(session.next_context_id().as_str(), "1");
        Ok(())
    }

    #[test]
    fn t_sender_path() -> Result<()> {
        let app = Application::new(AppConfig::default());
        let session = Session::new("s", 5);
        let request = Request::new(HttpRequestMethod::GET, "/wo/3.0.2")?;
        let mut context = Context::new(&app, &request, &session);
        assert!(!context.is_on_sender_path());
        context.begin_component_action(&ComponentAddress::parse("3.0.2")?);
        context.element_id_mut().push();
        assert!(context.is_on_sender_path());
        context.element_id_mut().push();
        context.element_id_mut().increment();
        assert!(!context.is_on_sender_path());
        assert_eq!(context.component_action_url(), "/wo/3.0.1");
        context.element_id_mut().increment();
        assert!(context.current_element_is_sender());
        context.element_id_mut().push();
        assert!(context.is_on_sender_path());
        assert!(!context.current_element_is_sender());
        Ok(())
    }

    #[test]
    fn t_update_containers() -> Result<()> {
        let app = Application::new(AppConfig::default());
        let session = Session::new("s", 5);
        let request = Request::new(HttpRequestMethod::GET, "/")?;
        let mut context = Context::new(&app, &request, &session);
        assert!(context.should_render());
        context.push_update_container("a".into());
        assert!(context.should_render());

        let request = Request::new(HttpRequestMethod::GET, "/")?
            .with_header("X-UpdateContainerID", "b");
        let mut context = Context::new(&app, &request, &session);
        assert_eq!(context.requested_update_container(), Some("b"));
        assert!(!context.should_render());
        context.push_update_container("b".into());
        context.push_update_container("c".into());
        assert!(context.should_render());
        context.pop_update_container();
        context.pop_update_container();
        assert!(!context.should_render());
        Ok(())
    }
}
