//! Responses built up by rendering, direct actions and handlers.

use std::{borrow::Cow, fmt::Debug};

use anyhow::Result;
use kstring::KString;

use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::request::Headers;
use crate::webutils::html_escape;


/// Anything an action can return that knows how to turn itself into
/// a response, bypassing page rendering.
pub trait ActionResults: Debug + Send {
    fn generate_response(self: Box<Self>) -> Result<Response>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: KString,
    pub value: KString,
    pub path: Option<KString>,
    pub max_age: Option<u64>,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: &str, value: &str) -> Self {
        Cookie {
            name: KString::from_ref(name),
            value: KString::from_ref(value),
            path: Some(KString::from_static("/")),
            max_age: None,
            http_only: true,
        }
    }

    /// The value of a `Set-Cookie` header.
    pub fn to_header_value(&self) -> String {
        let mut s = format!("{}={}", self.name, self.value);
        if let Some(path) = &self.path {
            s.push_str("; Path=");
            s.push_str(path);
        }
        if let Some(max_age) = self.max_age {
            s.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.http_only {
            s.push_str("; HttpOnly");
        }
        s
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: HttpResponseStatusCode,
    headers: Headers,
    content: Vec<u8>,
    cookies: Vec<Cookie>,
    /// While set, appended content is dropped (partial page updates).
    muted: bool,
}

impl Default for Response {
    fn default() -> Self {
        Response::new(HttpResponseStatusCode::OK200)
    }
}

impl Response {
    pub fn new(status: HttpResponseStatusCode) -> Self {
        Response {
            status,
            headers: Headers::new(),
            content: Vec::new(),
            cookies: Vec::new(),
            muted: false,
        }
    }

    pub fn html(status: HttpResponseStatusCode, body: impl Into<String>) -> Self {
        let mut r = Response::new(status);
        r.set_header("Content-Type", "text/html; charset=utf-8");
        r.content = body.into().into_bytes();
        r
    }

    pub fn text(status: HttpResponseStatusCode, body: impl Into<String>) -> Self {
        let mut r = Response::new(status);
        r.set_header("Content-Type", "text/plain; charset=utf-8");
        r.content = body.into().into_bytes();
        r
    }

    pub fn redirect(status: HttpResponseStatusCode, location: &str) -> Self {
        let mut r = Response::new(status);
        r.set_header("Location", location);
        r
    }

    pub fn append_content_string(&mut self, s: &str) {
        if self.muted {
            return
        }
        self.content.extend_from_slice(s.as_bytes());
    }

    pub fn append_html_escaped(&mut self, s: &str) {
        self.append_content_string(&html_escape(s));
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = content;
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn content_str(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.content)
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.set(name, value);
    }

    pub fn append_header(&mut self, name: &str, value: &str) {
        self.headers.append(name, value);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }
}

impl ActionResults for Response {
    fn generate_response(self: Box<Self>) -> Result<Response> {
        Ok(*self)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_content() {
        let mut r = Response::default();
        r.append_content_string("<p>");
        r.append_html_escaped("a < b & \"c\"");
        r.append_content_string("</p>");
        assert_eq!(r.content_str(), "<p>a &lt; b &amp; &quot;c&quot;</p>");
        assert_eq!(r.status.code(), 200);
    }

    #[test]
    fn t_muted() {
        let mut r = Response::default();
        r.append_content_string("a");
        r.set_muted(true);
        r.append_html_escaped("<b>");
        r.set_muted(false);
        r.append_content_string("c");
        assert_eq!(r.content_str(), "ac");
    }

    #[test]
    fn t_cookie() {
        let mut c = Cookie::new("sid", "abc");
        c.max_age = Some(60);
        assert_eq!(c.to_header_value(), "sid=abc; Path=/; Max-Age=60; HttpOnly");
    }

    #[test]
    fn t_action_results() -> Result<()> {
        let boxed: Box<dyn ActionResults> =
            Box::new(Response::text(HttpResponseStatusCode::OK200, "hi"));
        let r = boxed.generate_response()?;
        assert_eq!(r.content(), b"hi");
        assert_eq!(r.header("content-type"), Some("text/plain; charset=utf-8"));
        Ok(())
    }
}
