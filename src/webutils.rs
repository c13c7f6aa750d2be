use std::fmt::Write;

use crate::http_response_status_codes::HttpResponseStatusCode;
use crate::response::Response;


pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// `<name a="1" b="2">`, or with `self_closing`, `<name a="1" />`.
/// Attribute values are escaped, attributes with None values are
/// left out.
pub fn element_with_attributes(
    name: &str,
    attributes: &[(&str, Option<&str>)],
    self_closing: bool
) -> String {
    let mut s = format!("<{name}");
    for (key, value) in attributes {
        if let Some(value) = value {
            let _ = write!(&mut s, " {key}=\"{}\"", html_escape(value));
        }
    }
    s.push_str(if self_closing { " />" } else { ">" });
    s
}

/// A 12 character (6 entropy bytes) long hex string useful to tag
/// e.g. error messages for identification.
pub fn randomidstring() -> Result<String, getrandom::Error> {
    let mut buf = [0u8; 6];
    getrandom::getrandom(&mut buf)?;
    let mut s = String::new();
    for byte in buf {
        let _ = write!(&mut s, "{:02X}", byte);
    }
    Ok(s)
}

fn page(title: &str, body_html: &str) -> String {
    let title = html_escape(title);
    format!("<html><head><title>{title}</title></head><body><h1>{title}</h1>\
             {body_html}</body></html>\n")
}

pub fn errorpage_from_status(status: HttpResponseStatusCode) -> Response {
    let body = format!("<p>{}</p>", html_escape(status.desc()));
    Response::html(status, page(status.title(), &body))
}

/// For a link pointing to a page that has dropped out of the page
/// cache (or a session that expired).
pub fn page_expired_page(restart_url: &str) -> Response {
    let body = format!(
        "<p>The page you were working with is no longer available, most \
         likely because you have been inactive for a while or have used \
         many other pages since.</p><p><a href=\"{}\">Start over</a></p>",
        html_escape(restart_url));
    Response::html(HttpResponseStatusCode::Gone410, page("Page Expired", &body))
}

/// The error itself is only logged (tagged with `error_id`), not shown.
pub fn internal_error_page(error_id: &str) -> Response {
    let status = HttpResponseStatusCode::InternalServerError500;
    let body = format!("<p>{} (error id {})</p>",
                       html_escape(status.desc()), html_escape(error_id));
    Response::html(status, page(status.title(), &body))
}

pub fn bad_request_page(message: &str) -> Response {
    let status = HttpResponseStatusCode::BadRequest400;
    let body = format!("<p>{}</p><p>{}</p>",
                       html_escape(status.desc()), html_escape(message));
    Response::html(status, page(status.title(), &body))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_element_with_attributes() {
        assert_eq!(element_with_attributes(
            "input", &[("type", Some("text")), ("name", Some("a\"b")), ("value", None)],
            true),
                   "<input type=\"text\" name=\"a&quot;b\" />");
        assert_eq!(element_with_attributes("a", &[("href", Some("/x?a=1&b=2"))], false),
                   "<a href=\"/x?a=1&amp;b=2\">");
    }

    #[test]
    fn t_randomidstring() {
        let id = randomidstring().unwrap();
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn t_pages() {
        let r = page_expired_page("/wa/default");
        assert_eq!(r.status.code(), 410);
        assert!(r.content_str().contains("href=\"/wa/default\""));
        assert_eq!(errorpage_from_status(HttpResponseStatusCode::NotFound404).status.code(),
                   404);
        assert!(internal_error_page("ABC").content_str().contains("error id ABC"));
    }
}
