//! The application: registry, direct actions, routes and sessions,
//! and the entry point answering a request within a session.

use std::sync::{Arc, atomic::{AtomicU64, Ordering}};

use anyhow::{Result, bail};

use crate::address::COMPONENT_REQUEST_HANDLER_KEY;
use crate::component::{ActionResult, ComponentDefinition, ComponentInstance};
use crate::config::AppConfig;
use crate::context::Context;
use crate::direct_action::{DIRECT_ACTION_REQUEST_HANDLER_KEY, DirectAction,
                           DirectActionRequestHandler, DirectActions};
use crate::dispatch::{ComponentRequestHandler, internal_error_response};
use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::registry::{ElementConstructor, Registry};
use crate::request::Request;
use crate::response::Response;
use crate::router::{Handler, Router};
use crate::session::{Session, SessionStore};
use crate::template_parser::CompileError;
use crate::value::Value;
use crate::webutils::errorpage_from_status;
use crate::{debug, info};


/// Idle sessions are looked for every this many requests.
const EXPIRY_CHECK_INTERVAL: u64 = 128;

#[derive(Debug)]
pub struct Application {
    config: AppConfig,
    registry: Registry,
    direct_actions: DirectActions,
    router: Router,
    sessions: SessionStore,
    request_count: AtomicU64,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let sessions = SessionStore::new(config.session_timeout, config.page_cache_size);
        Application {
            config,
            registry: Registry::new(),
            direct_actions: DirectActions::default(),
            router: Router::new(),
            sessions,
            request_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// These methods use chaining.
    pub fn register_component(&mut self, definition: ComponentDefinition) -> Result<&mut Self> {
        self.registry.register_component(definition)?;
        Ok(self)
    }

    pub fn register_element(&mut self, name: &str, constructor: ElementConstructor)
                            -> Result<&mut Self> {
        self.registry.register_element(name, constructor)?;
        Ok(self)
    }

    pub fn register_helper<F>(&mut self, name: &str, function: F) -> Result<&mut Self>
    where F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static
    {
        self.registry.helpers_mut().register(name, function)?;
        Ok(self)
    }

    pub fn register_direct_action<F>(&mut self, name: &str, action: F) -> Result<&mut Self>
    where F: Fn(&mut Context<'_>) -> Result<ActionResult> + Send + Sync + 'static
    {
        self.direct_actions.insert(name, Arc::new(action))?;
        Ok(self)
    }

    /// A handler for exactly `path`, taking precedence over the
    /// built-in request handlers.
    pub fn add_route(&mut self, path: &str, handler: impl Handler + 'static)
                     -> Result<&mut Self> {
        self.router.add(path, handler)?;
        Ok(self)
    }

    /// A handler for all paths starting with `/key/`; `wo` and `wa`
    /// are taken.
    pub fn add_handler_key(&mut self, key: &str, handler: impl Handler + 'static)
                           -> Result<&mut Self> {
        if key == COMPONENT_REQUEST_HANDLER_KEY || key == DIRECT_ACTION_REQUEST_HANDLER_KEY {
            bail!("request handler key {key:?} is reserved")
        }
        self.router.add_handler_key(key, handler)?;
        Ok(self)
    }

    pub fn direct_action(&self, name: &str) -> Option<&DirectAction> {
        self.direct_actions.get(name)
    }

    /// A fresh instance of the named component, to be returned from
    /// an action.
    pub fn page_with_name(&self, name: &str) -> Result<ComponentInstance> {
        Ok(self.registry.resolve_component(name)?.instantiate())
    }

    /// Compiles the templates of all registered components, so that
    /// errors show up at startup instead of on first use. Returns how
    /// many were compiled.
    pub fn warm_up(&self) -> Result<usize, CompileError> {
        let mut n = 0;
        for definition in self.registry.component_definitions() {
            definition.template(&self.registry)?;
            n += 1;
        }
        info!("compiled {n} component templates");
        Ok(n)
    }

    fn route(&self, context: &mut Context<'_>) -> Result<Option<Response>> {
        if let Some(response) = self.router.handle(context)? {
            return Ok(Some(response))
        }
        match context.request().path_segments().first().map(|s| s.as_str()) {
            Some(COMPONENT_REQUEST_HANDLER_KEY) => ComponentRequestHandler.call(context),
            None | Some(DIRECT_ACTION_REQUEST_HANDLER_KEY) =>
                DirectActionRequestHandler.call(context),
            Some(_) => Ok(None),
        }
    }

    /// Answers `request` in `session`: 404 if nobody handles it, 500
    /// (logged with an error id) if a handler fails.
    pub fn dispatch_request(&self, request: &Request, session: &Session) -> Response {
        let mut context = Context::new(self, request, session);
        match self.route(&mut context) {
            Ok(Some(response)) => response,
            Ok(None) => {
                debug!("no handler for {:?}", request.path());
                errorpage_from_status(HttpResponseStatusCode::NotFound404)
            }
            Err(e) => internal_error_response(&format!("{}: {e:#}", request.request_line())),
        }
    }

    /// Like `dispatch_request`, with the session looked up (or created)
    /// by id; now and then drops idle sessions.
    pub fn handle_request(&self, request: &Request, session_id: &str) -> Response {
        let n = self.request_count.fetch_add(1, Ordering::Relaxed);
        if n % EXPIRY_CHECK_INTERVAL == EXPIRY_CHECK_INTERVAL - 1 {
            let expired = self.sessions.expire_idle();
            if expired > 0 {
                debug!("expired {expired} idle sessions");
            }
        }
        let session = self.sessions.get_or_create(session_id);
        self.dispatch_request(request, &session)
    }
}
