//! HTTP responses and their wire serialization.

use std::fmt;
use std::time::SystemTime;

use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::error::{Error, Result};
use crate::http::StatusCode;
use crate::http::cookie::Cookie;
use crate::http::headers::HeaderBag;
use crate::http::message::{DEFAULT_PROTOCOL_VERSION, HttpMessage, Message};
use crate::stream::ByteStream;

/// An HTTP response.
///
/// Cookies are kept apart from the header bag, keyed by encoded name in
/// insertion order, and emitted as `Set-Cookie` lines right after the status
/// line.
///
/// # Examples
///
/// ```
/// use rttp_message::http::Cookie;
/// use rttp_message::{ByteStream, Message, Response};
///
/// let response = Response::new(404)
///     .unwrap()
///     .with_header("Content-Type", "text/plain")
///     .unwrap()
///     .with_cookie(&Cookie::new("seen", "1"))
///     .unwrap()
///     .with_body(ByteStream::from_bytes("missing"));
///
/// assert_eq!(response.reason_phrase(), "Not Found");
///
/// let wire = response.to_string();
/// assert!(wire.starts_with("HTTP/1.1 404 Not Found\r\nSet-Cookie: seen=1; Path=/; HttpOnly\r\n"));
/// assert!(wire.contains("Content-Length: 7\r\n"));
/// assert!(wire.ends_with("\r\n\r\nmissing"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    message: HttpMessage,
    status: StatusCode,
    /// Explicit phrase; empty means "use the table".
    reason_phrase: String,
    /// `(encoded name, Set-Cookie value)` in insertion order.
    cookies: Vec<(String, String)>,
}

impl Response {
    /// Creates a response with the canonical reason phrase.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `status` is outside `100..=599`.
    pub fn new(status: u16) -> Result<Self> {
        Self::from_parts(status, HeaderBag::new(), None, DEFAULT_PROTOCOL_VERSION, "")
    }

    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an out-of-range status, a malformed
    /// protocol version, or a reason phrase containing a line break.
    pub fn from_parts(
        status: u16,
        headers: HeaderBag,
        body: Option<ByteStream>,
        protocol_version: &str,
        reason_phrase: &str,
    ) -> Result<Self> {
        let status = StatusCode::new(status)?;
        validate_reason(reason_phrase)?;

        Ok(Self {
            message: HttpMessage::new(headers, body, protocol_version)?,
            status,
            reason_phrase: reason_phrase.to_owned(),
            cookies: Vec::new(),
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns the explicit reason phrase, else the canonical one, else `""`.
    pub fn reason_phrase(&self) -> &str {
        if self.reason_phrase.is_empty() {
            self.status.canonical_reason().unwrap_or("")
        } else {
            &self.reason_phrase
        }
    }

    /// Returns a response with a new status. An empty `reason_phrase` selects
    /// the canonical phrase.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an out-of-range code or a phrase
    /// containing a line break.
    pub fn with_status(&self, code: u16, reason_phrase: &str) -> Result<Self> {
        let status = StatusCode::new(code)?;
        validate_reason(reason_phrase)?;

        let effective = if reason_phrase.is_empty() {
            status.canonical_reason().unwrap_or("")
        } else {
            reason_phrase
        };
        if status == self.status && effective == self.reason_phrase() {
            return Ok(self.clone());
        }

        Ok(Self {
            status,
            reason_phrase: reason_phrase.to_owned(),
            ..self.clone()
        })
    }

    /// Returns the `Set-Cookie` values in insertion order.
    pub fn cookies(&self) -> impl Iterator<Item = &str> {
        self.cookies.iter().map(|(_, line)| line.as_str())
    }

    /// Returns the `Set-Cookie` value stored under an encoded cookie name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, line)| line.as_str())
    }

    /// Adds a cookie, replacing one with the same encoded name in place.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the cookie name or a raw value is invalid.
    pub fn with_cookie(&self, cookie: &Cookie) -> Result<Self> {
        let name = cookie.encoded_name()?;
        let line = cookie.to_header_value(SystemTime::now())?;

        if self.cookie(&name) == Some(line.as_str()) {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        match next.cookies.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = line,
            None => next.cookies.push((name, line)),
        }
        Ok(next)
    }

    /// Drops a previously added cookie by encoded name.
    ///
    /// This does not instruct the client to delete it; add a cookie with an
    /// empty value for that.
    #[must_use]
    pub fn without_cookie(&self, name: &str) -> Self {
        if self.cookie(name).is_none() {
            return self.clone();
        }

        let mut next = self.clone();
        next.cookies.retain(|(key, _)| key != name);
        next
    }

    /// Serializes the response into HTTP/1.x wire format.
    ///
    /// `Date` and `Content-Length` are computed at call time and layered over
    /// the stored headers; the response itself is unchanged. The body is read
    /// from its start when seekable.
    pub fn to_bytes(&self) -> BytesMut {
        let stream = self.body();
        let content_length = stream.size().unwrap_or(0);
        let body = stream.to_bytes();

        let mut headers = self.headers().clone();
        headers.set_computed("Date", httpdate::fmt_http_date(SystemTime::now()));
        headers.set_computed("Content-Length", content_length.to_string());

        let estimated_size = 128 + (headers.len() + self.cookies.len()) * 64 + body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(
            format!(
                "HTTP/{} {} {}\r\n",
                self.protocol_version(),
                self.status.as_u16(),
                self.reason_phrase()
            )
            .as_bytes(),
        );

        for line in self.cookies() {
            buf.put(format!("Set-Cookie: {line}\r\n").as_bytes());
        }

        for (name, values) in headers.iter() {
            buf.put(format!("{name}: {}\r\n", values.join(", ")).as_bytes());
        }

        // Header/body separator
        buf.put(&b"\r\n"[..]);
        buf.put(body);

        trace!(
            status = self.status.as_u16(),
            cookies = self.cookies.len(),
            bytes = buf.len(),
            "serialized response"
        );
        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self {
            message: HttpMessage::default(),
            status: StatusCode::OK,
            reason_phrase: String::new(),
            cookies: Vec::new(),
        }
    }
}

impl Message for Response {
    fn message(&self) -> &HttpMessage {
        &self.message
    }

    fn with_message(&self, message: HttpMessage) -> Self {
        Self {
            message,
            ..self.clone()
        }
    }
}

/// Writes the wire format, decoding the body lossily as UTF-8.
impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

fn validate_reason(reason: &str) -> Result<()> {
    if reason.contains(['\r', '\n']) {
        return Err(Error::invalid("reason phrase must not contain line breaks"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_to_200_ok() {
        let r = Response::default();
        assert_eq!(r.status_code(), 200);
        assert_eq!(r.reason_phrase(), "OK");
        assert_eq!(r, Response::new(200).unwrap());
    }

    #[rstest]
    #[case(99)]
    #[case(600)]
    fn rejects_out_of_range_status(#[case] code: u16) {
        assert!(matches!(Response::new(code), Err(Error::InvalidArgument(_))));
        assert!(Response::default().with_status(code, "").is_err());
    }

    #[test]
    fn unlisted_code_has_empty_phrase() {
        let r = Response::new(299).unwrap();
        assert_eq!(r.reason_phrase(), "");
        assert!(r.to_string().starts_with("HTTP/1.1 299 \r\n"));
    }

    #[test]
    fn with_status_noops_on_same_effective_state() {
        let r = Response::default();
        assert_eq!(r.with_status(200, "").unwrap(), r);
        assert_eq!(r.with_status(200, "OK").unwrap(), r);

        let custom = r.with_status(200, "Fine").unwrap();
        assert_eq!(custom.reason_phrase(), "Fine");
        assert_ne!(custom, r);
        assert_eq!(r.reason_phrase(), "OK");
    }

    #[test]
    fn with_status_switches_phrase() {
        let r = Response::default().with_status(201, "Fine").unwrap();
        let next = r.with_status(404, "").unwrap();
        assert_eq!(next.reason_phrase(), "Not Found");
    }

    #[test]
    fn reason_with_line_break_is_rejected() {
        assert!(Response::default().with_status(200, "OK\r\nX: y").is_err());
    }

    #[test]
    fn deletion_cookie_line() {
        let r = Response::new(200)
            .unwrap()
            .with_cookie(&Cookie::new("a", "").max_age(0).http_only(true))
            .unwrap();
        let line = r.cookie("a").unwrap();
        assert!(line.contains("a=deleted"));
        assert!(line.contains("Max-Age=-31536001"));
        assert!(line.contains("Path=/"));
    }

    #[test]
    fn cookie_overwrite_keeps_slot() {
        let r = Response::default()
            .with_cookie(&Cookie::new("a", "1"))
            .unwrap()
            .with_cookie(&Cookie::new("b", "2"))
            .unwrap()
            .with_cookie(&Cookie::new("a", "3"))
            .unwrap();

        let lines: Vec<_> = r.cookies().collect();
        assert_eq!(lines, ["a=3; Path=/; HttpOnly", "b=2; Path=/; HttpOnly"]);
    }

    #[test]
    fn same_cookie_is_noop_and_removal_works() {
        let r = Response::default().with_cookie(&Cookie::new("a", "1")).unwrap();
        assert_eq!(r.with_cookie(&Cookie::new("a", "1")).unwrap(), r);

        let removed = r.without_cookie("a");
        assert_eq!(removed.cookies().count(), 0);
        assert_eq!(r.cookies().count(), 1);
        assert_eq!(removed.without_cookie("a"), removed);
    }

    #[test]
    fn invalid_cookie_name_is_rejected() {
        let result = Response::default().with_cookie(&Cookie::new("a b", "1"));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn cookie_attributes_cannot_inject_lines() {
        let cookie = Cookie::new("a", "1")
            .path("/\r\nX-Injected: yes")
            .domain("d\r\nX-Two: 2");
        let result = Response::default().with_cookie(&cookie);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn wire_layout() {
        let r = Response::new(201)
            .unwrap()
            .with_header("X-Request-Id", "abc-123")
            .unwrap()
            .with_added_header("Vary", ["Accept", "Origin"])
            .unwrap()
            .with_cookie(&Cookie::new("k", "v"))
            .unwrap()
            .with_body(ByteStream::from_bytes("Hello"));

        let wire = r.to_string();
        let (head, body) = wire.split_once("\r\n\r\n").unwrap();
        let lines: Vec<_> = head.split("\r\n").collect();

        assert_eq!(lines[0], "HTTP/1.1 201 Created");
        assert_eq!(lines[1], "Set-Cookie: k=v; Path=/; HttpOnly");
        assert_eq!(lines[2], "X-Request-Id: abc-123");
        assert_eq!(lines[3], "Vary: Accept, Origin");
        assert!(lines[4].starts_with("Date: "));
        assert!(lines[4].ends_with(" GMT"));
        assert_eq!(lines[5], "Content-Length: 5");
        assert_eq!(body, "Hello");
    }

    #[test]
    fn serialization_does_not_alter_response() {
        let r = Response::default().with_body(ByteStream::from_bytes("abc"));
        let first = r.to_bytes();
        assert!(!r.has_header("Date"));
        assert!(!r.has_header("Content-Length"));

        // The body is rewound, so serializing twice yields the same body.
        let second = r.to_bytes();
        assert!(first.ends_with(b"\r\n\r\nabc"));
        assert!(second.ends_with(b"\r\n\r\nabc"));
    }

    #[test]
    fn empty_body_has_zero_length() {
        let wire = Response::new(204).unwrap().to_string();
        assert!(wire.contains("Content-Length: 0\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn protocol_version_in_status_line() {
        let r = Response::default().with_protocol_version("1.0").unwrap();
        assert!(r.to_string().starts_with("HTTP/1.0 200 OK\r\n"));
    }
}
