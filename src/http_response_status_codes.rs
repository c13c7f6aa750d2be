//! The HTTP status codes this server answers with.

// https://developer.mozilla.org/en-US/docs/Web/HTTP/Status

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpResponseStatusCode {
    OK200,
    Found302,
    SeeOther303,
    BadRequest400,
    NotFound404,
    Gone410,
    InternalServerError500,
    NotImplemented501,
}

impl HttpResponseStatusCode {
    pub fn code(self) -> u16 {
        match self {
            Self::OK200 => 200,
            Self::Found302 => 302,
            Self::SeeOther303 => 303,
            Self::BadRequest400 => 400,
            Self::NotFound404 => 404,
            Self::Gone410 => 410,
            Self::InternalServerError500 => 500,
            Self::NotImplemented501 => 501,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::OK200 => "OK",
            Self::Found302 => "Found",
            Self::SeeOther303 => "See Other",
            Self::BadRequest400 => "Bad Request",
            Self::NotFound404 => "Not Found",
            Self::Gone410 => "Gone",
            Self::InternalServerError500 => "Internal Server Error",
            Self::NotImplemented501 => "Not Implemented",
        }
    }

    pub fn desc(self) -> &'static str {
        match self {
            Self::OK200 => "The request succeeded.",
            Self::Found302 =>
                "The URI of the requested resource has been changed temporarily.",
            Self::SeeOther303 =>
                "The response to the request can be found under another URI \
                 using a GET request.",
            Self::BadRequest400 =>
                "The server cannot or will not process the request due to \
                 something that is perceived to be a client error.",
            Self::NotFound404 =>
                "The server cannot find the requested resource.",
            Self::Gone410 =>
                "The requested content is no longer available.",
            Self::InternalServerError500 =>
                "The server has encountered a situation it does not know how to handle.",
            Self::NotImplemented501 =>
                "The request method is not supported by the server and cannot be handled.",
        }
    }

    pub fn is_redirect(self) -> bool {
        matches!(self, Self::Found302 | Self::SeeOther303)
    }
}
