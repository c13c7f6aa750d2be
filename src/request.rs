//! The request as seen by dispatch: method, path, headers and parsed
//! form values. Byte-level HTTP is the transport's business.

use std::{collections::BTreeMap, net::SocketAddr};

use kstring::KString;

use crate::http_request_method::HttpRequestMethod;
use crate::url_encoding::{UrlDecodingError, parse_urlencoded, url_decode};


/// Multiple values per name, each list in arrival order. `get` gives
/// the first value, `get_all` all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiMap(BTreeMap<KString, Vec<KString>>);

impl MultiMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: KString, value: KString) {
        self.0.entry(name).or_default().push(value);
    }

    /// Replace all values for `name` with `value`.
    pub fn set(&mut self, name: KString, value: KString) {
        self.0.insert(name, vec![value]);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<KString>> {
        self.0.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.first()).map(|s| s.as_str())
    }

    pub fn get_all(&self, name: &str) -> &[KString] {
        self.0.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All (name, value) pairs, grouped by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().flat_map(
            |(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }
}


/// Header names are case insensitive; stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(MultiMap);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str) -> KString {
        KString::from_string(name.to_ascii_lowercase())
    }

    pub fn append(&mut self, name: &str, value: &str) {
        self.0.append(Self::key(name), KString::from_ref(value));
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.0.set(Self::key(name), KString::from_ref(value));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase())
    }

    pub fn get_all(&self, name: &str) -> &[KString] {
        self.0.get_all(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter()
    }
}


#[derive(Debug, Clone)]
pub struct Request {
    method: HttpRequestMethod,
    /// Path and query as received
    uri: String,
    path: String,
    segments: Vec<KString>,
    headers: Headers,
    form_values: MultiMap,
    cookies: MultiMap,
    content: Vec<u8>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Query parameters of `uri` become form values.
    pub fn new(method: HttpRequestMethod, uri: &str) -> Result<Self, UrlDecodingError> {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        let segments = path.split('/')
            .filter(|s| !s.is_empty())
            .map(|s| url_decode(s).map(KString::from_string))
            .collect::<Result<Vec<_>, _>>()?;
        let mut form_values = MultiMap::new();
        for (k, v) in parse_urlencoded(query)? {
            form_values.append(KString::from_string(k), KString::from_string(v));
        }
        Ok(Request {
            method,
            uri: uri.into(),
            path: path.into(),
            segments,
            headers: Headers::new(),
            form_values,
            cookies: MultiMap::new(),
            content: Vec::new(),
            remote_addr: None,
        })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_form_value(mut self, name: &str, value: &str) -> Self {
        self.form_values.append(KString::from_ref(name), KString::from_ref(value));
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.append(KString::from_ref(name), KString::from_ref(value));
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Sets the body; urlencoded form bodies are added to the form
    /// values (after the query parameters).
    pub fn with_content(mut self, content: Vec<u8>) -> Result<Self, UrlDecodingError> {
        let is_form = self.headers.get("content-type")
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if is_form {
            let body = String::from_utf8_lossy(&content);
            for (k, v) in parse_urlencoded(&body)? {
                self.form_values.append(KString::from_string(k), KString::from_string(v));
            }
        }
        self.content = content;
        Ok(self)
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-empty, percent-decoded path segments.
    pub fn path_segments(&self) -> &[KString] {
        &self.segments
    }

    /// The path split at every `/`, empty segments kept and nothing
    /// decoded: `/wo//3.4` gives `["wo", "", "3.4"]`.
    pub fn raw_path_segments(&self) -> Vec<&str> {
        let path = self.path.strip_prefix('/').unwrap_or(&self.path);
        path.split('/').collect()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn form_values(&self) -> &MultiMap {
        &self.form_values
    }

    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form_values.get(name)
    }

    pub fn has_form_values(&self) -> bool {
        !self.form_values.is_empty()
    }

    pub fn cookies(&self) -> &MultiMap {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name)
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// e.g. `GET /wo/3.4 HTTP/1.1`, as used in logs.
    pub fn request_line(&self) -> String {
        format!("{} {} HTTP/1.1", self.method.as_str(), self.uri)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_new() {
        let r = Request::new(HttpRequestMethod::GET, "/wo/3.4?x=1&x=2&y=a+b").unwrap();
        assert_eq!(r.path(), "/wo/3.4");
        assert_eq!(r.path_segments(), &[KString::from_static("wo"),
                                        KString::from_static("3.4")]);
        assert_eq!(r.form_value("x"), Some("1"));
        assert_eq!(r.form_values().get_all("x").len(), 2);
        assert_eq!(r.form_value("y"), Some("a b"));
        assert!(Request::new(HttpRequestMethod::GET, "/").unwrap().path_segments().is_empty());
        let r = Request::new(HttpRequestMethod::GET, "/wo//3.4/").unwrap();
        assert_eq!(r.path_segments().len(), 2);
        assert_eq!(r.raw_path_segments(), vec!["wo", "", "3.4", ""]);
    }

    #[test]
    fn t_form_body() -> Result<(), UrlDecodingError> {
        let r = Request::new(HttpRequestMethod::POST, "/wo/1.0?a=q")?
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_content(b"a=b&c=%20d".to_vec())?;
        assert_eq!(r.form_values().get_all("a"),
                   &[KString::from_static("q"), KString::from_static("b")]);
        assert_eq!(r.form_value("c"), Some(" d"));
        assert_eq!(r.header("content-TYPE"), Some("application/x-www-form-urlencoded"));
        Ok(())
    }

    #[test]
    fn t_headers_multi() {
        let mut h = Headers::new();
        h.append("Accept", "a");
        h.append("ACCEPT", "b");
        assert_eq!(h.get("accept"), Some("a"));
        assert_eq!(h.get_all("Accept").len(), 2);
        h.set("accept", "c");
        assert_eq!(h.get_all("accept"), &[KString::from_static("c")]);
    }
}
