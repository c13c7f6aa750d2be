//! Serving an `Application` over HTTP with rouille: request and
//! response conversion, the session cookie, logging, and running the
//! handlers on a worker thread pool.

use std::io::Read;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use rouille::session::session;
use rouille::Server;
use scoped_thread_pool::Pool;

use crate::apachelog::{AccessInfo, Logs, log_combined};
use crate::application::Application;
use crate::config::AppConfig;
use crate::http_request_method::HttpRequestMethod;
use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::in_threadpool::{in_threadpool, new_threadpool};
use crate::request::Request;
use crate::response::Response;
use crate::url_encoding::UrlDecodingError;
use crate::webutils::{bad_request_page, errorpage_from_status};
use crate::{info, warn};


pub const SESSION_COOKIE_NAME: &str = "ngsid";

/// Larger request bodies are refused.
pub const MAX_BODY_SIZE: u64 = 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum RequestConversionError {
    #[error("method {0:?} not implemented")]
    UnsupportedMethod(String),
    #[error("invalid percent encoding: {0}")]
    BadUrl(#[from] UrlDecodingError),
    #[error("request body larger than {MAX_BODY_SIZE} bytes")]
    BodyTooLarge,
    #[error("reading request body: {0}")]
    Body(#[from] std::io::Error),
}

pub fn convert_request(request: &rouille::Request) -> Result<Request, RequestConversionError> {
    let unsupported = || RequestConversionError::UnsupportedMethod(request.method().into());
    let method = HttpRequestMethod::from_str(request.method()).map_err(|_| unsupported())?;
    if method.to_simple().is_none() {
        return Err(unsupported())
    }
    let mut r = Request::new(method, request.raw_url())?
        .with_remote_addr(*request.remote_addr());
    for (name, value) in request.headers() {
        r = r.with_header(name, value);
    }
    for (name, value) in rouille::input::cookies(request) {
        r = r.with_cookie(name, value);
    }
    let mut content = Vec::new();
    if let Some(body) = request.data() {
        body.take(MAX_BODY_SIZE + 1).read_to_end(&mut content)?;
        if content.len() as u64 > MAX_BODY_SIZE {
            return Err(RequestConversionError::BodyTooLarge)
        }
    }
    Ok(r.with_content(content)?)
}

pub fn to_rouille_response(response: Response) -> rouille::Response {
    let status = response.status.code();
    let content_type = response.header("content-type")
        .unwrap_or("text/html; charset=utf-8")
        .to_string();
    let mut headers: Vec<(String, String)> = response.headers().iter()
        .filter(|(name, _)| *name != "content-type")
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    for cookie in response.cookies() {
        headers.push(("Set-Cookie".into(), cookie.to_header_value()));
    }
    let mut r = rouille::Response::from_data(content_type, response.into_content())
        .with_status_code(status);
    for (name, value) in headers {
        r = r.with_additional_header(name, value);
    }
    r
}

fn access_info(request: &rouille::Request) -> AccessInfo {
    AccessInfo {
        client_ip: request.remote_addr().ip().to_string(),
        request_line: format!("{} {} HTTP/1.1", request.method(), request.raw_url()),
        referer: request.header("Referer").map(String::from),
        user_agent: request.header("User-Agent").map(String::from),
    }
}

fn handle(
    application: &Application,
    logs: &Mutex<Logs>,
    request: &rouille::Request,
    session_id: &str,
) -> Response {
    log_combined(&access_info(request), logs, || {
        match convert_request(request) {
            Ok(request) => Ok(application.handle_request(&request, session_id)),
            Err(e @ RequestConversionError::UnsupportedMethod(_)) => {
                warn!("{e}");
                Ok(errorpage_from_status(HttpResponseStatusCode::NotImplemented501))
            }
            Err(e @ (RequestConversionError::BadUrl(_)
                     | RequestConversionError::BodyTooLarge)) =>
                Ok(bad_request_page(&e.to_string())),
            Err(e) => Err(e.into()),
        }
    })
}

/// Make a handler for rouille's `Server`.
pub fn server_handler(
    application: Arc<Application>,
    logs: Arc<Mutex<Logs>>,
    threadpool: Arc<Pool>,
) -> impl for<'r> Fn(&'r rouille::Request) -> rouille::Response
{
    move |request: &rouille::Request| -> rouille::Response {
        let timeout = application.config().session_timeout.as_secs();
        session(request, SESSION_COOKIE_NAME, timeout, |session| {
            let session_id = session.id();
            let response = in_threadpool(threadpool.clone(), || {
                handle(&application, &logs, request, session_id)
            }).unwrap_or_else(|e| {
                warn!("worker thread failed: {e:#}");
                errorpage_from_status(HttpResponseStatusCode::InternalServerError500)
            });
            to_rouille_response(response)
        })
    }
}


pub struct RouilleRunner {
    workerthreadpool: Arc<Pool>,
    logs: Arc<Mutex<Logs>>,
}

impl RouilleRunner {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let logs = match &config.log_dir {
            Some(dir) => Logs::open_in_dir(dir)?,
            None => Logs::stderr(),
        };
        Ok(RouilleRunner {
            workerthreadpool: new_threadpool(config.worker_threads, "ngobjects_worker"),
            logs,
        })
    }

    /// Run a rouille server on the application's listen address in a
    /// new thread, using the shared worker thread pool.
    pub fn run_server(
        &self,
        thread_name: &str,
        application: Arc<Application>,
    ) -> Result<JoinHandle<()>, std::io::Error>
    {
        thread::Builder::new().name(thread_name.into()).spawn({
            let workerthreadpool = self.workerthreadpool.clone();
            let logs = self.logs.clone();
            move || {
                let addr = application.config().listen_addr.clone();
                let handler = server_handler(application, logs, workerthreadpool);
                match Server::new(addr.as_str(), handler) {
                    Ok(server) => {
                        info!("listening on {addr}");
                        server.run()
                    }
                    Err(e) => warn!("error starting server on {addr:?}: {e}"),
                }
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ActionResult, Component, ComponentDefinition};
    use crate::context::Context;
    use crate::response::Cookie;
    use crate::value::Value;

    fn fake(method: &str, url: &str, headers: &[(&str, &str)], body: &[u8]) -> rouille::Request {
        rouille::Request::fake_http_from(
            "192.168.1.2:5000".parse().unwrap(),
            method, url,
            headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            body.to_vec())
    }

    #[test]
    fn t_convert_request() -> Result<()> {
        let r = convert_request(&fake(
            "POST", "/wo/1.0?a=1",
            &[("Content-Type", "application/x-www-form-urlencoded"),
              ("Cookie", "ngsid=abc; other=x")],
            b"b=2"))?;
        assert_eq!(r.method(), HttpRequestMethod::POST);
        assert_eq!(r.path(), "/wo/1.0");
        assert_eq!(r.form_value("a"), Some("1"));
        assert_eq!(r.form_value("b"), Some("2"));
        assert_eq!(r.cookie("other"), Some("x"));
        assert_eq!(r.remote_addr().map(|a| a.port()), Some(5000));

        assert!(matches!(convert_request(&fake("PUT", "/", &[], b"")),
                         Err(RequestConversionError::UnsupportedMethod(m)) if m == "PUT"));
        assert!(matches!(convert_request(&fake("GET", "/a%zz", &[], b"")),
                         Err(RequestConversionError::BadUrl(_))));
        Ok(())
    }

    #[test]
    fn t_to_rouille_response() {
        let mut r = Response::text(HttpResponseStatusCode::NotFound404, "nope");
        r.set_header("X-Test", "1");
        r.add_cookie(Cookie::new("a", "b"));
        let r = to_rouille_response(r);
        assert_eq!(r.status_code, 404);
        let header = |name: &str| r.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.to_string());
        assert_eq!(header("content-type").as_deref(), Some("text/plain; charset=utf-8"));
        assert_eq!(header("x-test").as_deref(), Some("1"));
        assert_eq!(header("set-cookie").as_deref(), Some("a=b; Path=/; HttpOnly"));
    }

    #[derive(Debug)]
    struct Page;

    impl Component for Page {
        fn value_for_key(&self, _key: &str) -> Option<Value> {
            None
        }
    }

    #[test]
    fn t_server_handler() -> Result<()> {
        let mut app = Application::new(AppConfig::default());
        app.register_component(ComponentDefinition::new(
            "Page", "<p>hi</p>", "", || Box::new(Page)))?
            .register_direct_action("default", |context: &mut Context<'_>| {
                Ok(ActionResult::Page(context.application().page_with_name("Page")?))
            })?;
        let app = Arc::new(app);
        let handler = server_handler(app.clone(), Logs::stderr(), new_threadpool(1, "t"));

        let r = handler(&fake("GET", "/", &[], b""));
        assert_eq!(r.status_code, 200);
        assert!(r.headers.iter().any(|(k, v)| k.eq_ignore_ascii_case("set-cookie")
                                     && v.starts_with(SESSION_COOKIE_NAME)));
        assert_eq!(app.sessions().len(), 1);

        assert_eq!(handler(&fake("DELETE", "/", &[], b"")).status_code, 501);
        assert_eq!(handler(&fake("GET", "/nothing/here", &[], b"")).status_code, 404);
        Ok(())
    }
}
