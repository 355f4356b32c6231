//! HTTP message types.
//!
//! This module provides the message primitives:
//! [`Method`], [`StatusCode`], [`HeaderBag`], the shared [`Message`] behavior,
//! [`Request`], [`ServerRequest`] and [`Response`].

use std::fmt;

use crate::error::{Error, Result};

pub mod cookie;
pub mod headers;
pub mod message;
pub mod parse;
pub mod request;
pub mod response;
pub mod server_request;

pub use cookie::{Cookie, SameSite};
pub use headers::{HeaderBag, IntoHeaderValues};
pub use message::{HttpMessage, Message};
pub use request::{HttpRequest, Request};
pub use response::Response;
pub use server_request::{ParsedBody, ServerRequest, UploadedFiles};

/// An HTTP response status code in the range `100..=599`.
///
/// # Examples
///
/// ```
/// use rttp_message::http::StatusCode;
///
/// let status = StatusCode::new(200).unwrap();
/// assert_eq!(status.as_u16(), 200);
/// assert_eq!(status.canonical_reason(), Some("OK"));
/// assert!(status.is_success());
///
/// assert!(StatusCode::new(99).is_err());
/// assert_eq!(StatusCode::new(299).unwrap().canonical_reason(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const CONTINUE: StatusCode = StatusCode(100);
    pub const OK: StatusCode = StatusCode(200);
    pub const CREATED: StatusCode = StatusCode(201);
    pub const NO_CONTENT: StatusCode = StatusCode(204);
    pub const MOVED_PERMANENTLY: StatusCode = StatusCode(301);
    pub const FOUND: StatusCode = StatusCode(302);
    pub const NOT_MODIFIED: StatusCode = StatusCode(304);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const FORBIDDEN: StatusCode = StatusCode(403);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const METHOD_NOT_ALLOWED: StatusCode = StatusCode(405);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode(503);

    /// Validates and wraps a numeric status code.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `code` is outside `100..=599`.
    pub fn new(code: u16) -> Result<Self> {
        if (100..=599).contains(&code) {
            Ok(Self(code))
        } else {
            Err(Error::invalid(format!(
                "status code {code} is outside the range 100-599"
            )))
        }
    }

    /// Returns the numeric status code as a `u16`.
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the canonical reason phrase, or `None` for unlisted codes.
    pub fn canonical_reason(self) -> Option<&'static str> {
        reason_phrase(self.0)
    }

    pub fn is_informational(self) -> bool {
        (100..200).contains(&self.0)
    }

    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    pub fn is_redirection(self) -> bool {
        (300..400).contains(&self.0)
    }

    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.0)
    }

    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        Self::OK
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.canonical_reason() {
            Some(reason) => write!(f, "{} {reason}", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self> {
        StatusCode::new(code)
    }
}

/// Returns the canonical reason phrase registered for `code`.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    Some(match code {
        // 1xx Informational
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",

        // 2xx Success
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",

        // 3xx Redirection
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        306 => "Switch Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",

        // 4xx Client Error
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",

        // 5xx Server Error
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",

        _ => return None,
    })
}

/// An HTTP request method.
///
/// Only the methods in the allow-list below are accepted; extension methods
/// are rejected at parse time.
///
/// # Examples
///
/// ```
/// use rttp_message::http::Method;
///
/// let method: Method = "GET".parse().unwrap();
/// assert_eq!(method, Method::Get);
/// assert_eq!(method.as_str(), "GET");
/// assert!(method.is_safe());
/// assert!("BREW".parse::<Method>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// OPTIONS: describe the communication options for the target resource.
    Options,
    /// HEAD: identical to GET but without a response body.
    Head,
    /// GET: retrieve a representation of the target resource.
    Get,
    /// POST: perform resource-specific processing on the request payload.
    Post,
    /// PUT: replace the target resource's current representation.
    Put,
    /// PATCH: apply partial modifications to a resource.
    Patch,
    /// DELETE: remove the association between the target resource and its functionality.
    Delete,
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Head => "HEAD",
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Returns `true` if this method is considered "safe" (no side effects per RFC 9110 §9.2.1).
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }

    /// Returns `true` if this method is idempotent (RFC 9110 §9.2.2).
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Self::Get | Self::Head | Self::Put | Self::Delete | Self::Options
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "OPTIONS" => Self::Options,
            "HEAD" => Self::Head,
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "PATCH" => Self::Patch,
            "DELETE" => Self::Delete,
            "" => return Err(Error::invalid("HTTP method must not be empty")),
            other => {
                return Err(Error::invalid(format!(
                    "unsupported HTTP method {other:?}"
                )));
            }
        })
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("OPTIONS", Method::Options)]
    #[case("HEAD", Method::Head)]
    #[case("GET", Method::Get)]
    #[case("POST", Method::Post)]
    #[case("PUT", Method::Put)]
    #[case("PATCH", Method::Patch)]
    #[case("DELETE", Method::Delete)]
    fn allowed_methods(#[case] input: &str, #[case] expected: Method) {
        let method: Method = input.parse().unwrap();
        assert_eq!(method, expected);
        assert_eq!(method.to_string(), input);
    }

    #[rstest]
    #[case("")]
    #[case("get")]
    #[case("TRACE")]
    #[case("CONNECT")]
    #[case("PURGE")]
    fn rejected_methods(#[case] input: &str) {
        assert!(matches!(input.parse::<Method>(), Err(Error::InvalidArgument(_))));
    }

    #[rstest]
    #[case(100, Some("Continue"))]
    #[case(200, Some("OK"))]
    #[case(301, Some("Moved Permanently"))]
    #[case(404, Some("Not Found"))]
    #[case(418, Some("I'm a teapot"))]
    #[case(511, Some("Network Authentication Required"))]
    #[case(299, None)]
    #[case(599, None)]
    fn reason_phrases(#[case] code: u16, #[case] expected: Option<&str>) {
        assert_eq!(StatusCode::new(code).unwrap().canonical_reason(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(99)]
    #[case(600)]
    #[case(1000)]
    fn out_of_range_status(#[case] code: u16) {
        assert!(matches!(StatusCode::new(code), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn status_classes() {
        assert!(StatusCode::CONTINUE.is_informational());
        assert!(StatusCode::NO_CONTENT.is_success());
        assert!(StatusCode::FOUND.is_redirection());
        assert!(StatusCode::NOT_FOUND.is_client_error());
        assert!(StatusCode::SERVICE_UNAVAILABLE.is_server_error());
        assert_eq!(StatusCode::NOT_FOUND.to_string(), "404 Not Found");
    }
}
