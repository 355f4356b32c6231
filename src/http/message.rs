//! State and behavior shared by requests and responses.
//!
//! [`HttpMessage`] holds the protocol version, the [`HeaderBag`] and the body
//! stream. Requests and responses embed it by value and expose it through the
//! [`Message`] trait, whose provided methods implement every `with_*`
//! operation once for all message kinds.

use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::http::headers::{HeaderBag, IntoHeaderValues};
use crate::stream::ByteStream;

/// Protocol version used when none is given.
pub const DEFAULT_PROTOCOL_VERSION: &str = "1.1";

/// Protocol version, headers and body of an HTTP message.
///
/// The body defaults lazily to an empty in-memory stream. Cloning copies the
/// headers and shares the body stream.
#[derive(Debug, Clone)]
pub struct HttpMessage {
    protocol_version: String,
    headers: HeaderBag,
    body: OnceLock<ByteStream>,
}

impl HttpMessage {
    /// Creates message state from its parts.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `protocol_version` is not of the form
    /// `<digits>[.<digits>]`.
    pub fn new(headers: HeaderBag, body: Option<ByteStream>, protocol_version: &str) -> Result<Self> {
        validate_protocol_version(protocol_version)?;

        Ok(Self {
            protocol_version: protocol_version.to_owned(),
            headers,
            body: body.map(OnceLock::from).unwrap_or_default(),
        })
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn headers(&self) -> &HeaderBag {
        &self.headers
    }

    /// Returns the body, creating an empty in-memory stream on first access.
    pub fn body(&self) -> ByteStream {
        self.body.get_or_init(ByteStream::memory).clone()
    }

    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_protocol_version(&self, protocol_version: &str) -> Result<Self> {
        validate_protocol_version(protocol_version)?;
        Ok(Self {
            protocol_version: protocol_version.to_owned(),
            ..self.clone()
        })
    }

    pub fn with_headers(&self, headers: HeaderBag) -> Self {
        Self {
            headers,
            ..self.clone()
        }
    }

    pub fn with_body(&self, body: ByteStream) -> Self {
        Self {
            body: OnceLock::from(body),
            ..self.clone()
        }
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderBag {
        &mut self.headers
    }
}

impl Default for HttpMessage {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_owned(),
            headers: HeaderBag::new(),
            body: OnceLock::new(),
        }
    }
}

impl PartialEq for HttpMessage {
    fn eq(&self, other: &Self) -> bool {
        self.protocol_version == other.protocol_version
            && self.headers == other.headers
            && self.body.get() == other.body.get()
    }
}

// version = 1*DIGIT [ "." 1*DIGIT ]
fn validate_protocol_version(version: &str) -> Result<()> {
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let valid = match version.split_once('.') {
        Some((major, minor)) => is_digits(major) && is_digits(minor),
        None => is_digits(version),
    };

    if valid {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "{version:?} is not a valid HTTP protocol version"
        )))
    }
}

/// Immutable access to an HTTP message.
///
/// Implementors only expose their embedded [`HttpMessage`]; every accessor and
/// `with_*` operation is provided. `with_*` methods never modify the
/// receiver. They return a new message, or an equal copy when the requested
/// value is already in place.
pub trait Message: Clone {
    /// Returns the embedded message state.
    fn message(&self) -> &HttpMessage;

    /// Returns a copy of `self` carrying `message`.
    #[must_use]
    fn with_message(&self, message: HttpMessage) -> Self;

    fn protocol_version(&self) -> &str {
        self.message().protocol_version()
    }

    fn headers(&self) -> &HeaderBag {
        self.message().headers()
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers().has(name)
    }

    /// Returns all values of a header, or an empty slice.
    fn header(&self, name: &str) -> &[String] {
        self.headers().get(name)
    }

    /// Returns the values of a header joined with `", "`, or an empty string.
    fn header_line(&self, name: &str) -> String {
        self.headers().get_line(name)
    }

    fn body(&self) -> ByteStream {
        self.message().body()
    }

    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for a malformed version.
    fn with_protocol_version(&self, version: &str) -> Result<Self> {
        if version == self.protocol_version() {
            return Ok(self.clone());
        }
        Ok(self.with_message(self.message().with_protocol_version(version)?))
    }

    /// Replaces the values of a header (case-insensitive).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an invalid name or value, or no values.
    fn with_header(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self> {
        let headers = self.headers().set(name, values)?;
        Ok(self.with_headers_replaced(headers))
    }

    /// Appends values to a header (case-insensitive).
    ///
    /// # Errors
    ///
    /// Same as [`with_header`](Self::with_header).
    fn with_added_header(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self> {
        let headers = self.headers().add(name, values)?;
        Ok(self.with_headers_replaced(headers))
    }

    /// Removes a header (case-insensitive).
    fn without_header(&self, name: &str) -> Self {
        if !self.has_header(name) {
            return self.clone();
        }
        self.with_headers_replaced(self.headers().remove(name))
    }

    /// Replaces the body stream.
    fn with_body(&self, body: ByteStream) -> Self {
        if self.message().body.get() == Some(&body) {
            return self.clone();
        }
        self.with_message(self.message().with_body(body))
    }

    #[doc(hidden)]
    fn with_headers_replaced(&self, headers: HeaderBag) -> Self {
        if &headers == self.headers() {
            return self.clone();
        }
        self.with_message(self.message().with_headers(headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal message to exercise the provided methods in isolation.
    #[derive(Debug, Clone, PartialEq, Default)]
    struct Bare(HttpMessage);

    impl Message for Bare {
        fn message(&self) -> &HttpMessage {
            &self.0
        }

        fn with_message(&self, message: HttpMessage) -> Self {
            Bare(message)
        }
    }

    #[test]
    fn defaults() {
        let m = Bare::default();
        assert_eq!(m.protocol_version(), "1.1");
        assert!(m.headers().is_empty());
        assert_eq!(m.body().size(), Some(0));
    }

    #[test]
    fn lazy_body_is_stable_once_created() {
        let m = Bare::default();
        let first = m.body();
        assert_eq!(m.body(), first);
    }

    #[test]
    fn constructor_keeps_given_body() {
        let body = ByteStream::from_bytes("given");
        let m = Bare(HttpMessage::new(HeaderBag::new(), Some(body.clone()), "1.0").unwrap());
        assert!(m.body().ptr_eq(&body));

        let empty = Bare(HttpMessage::new(HeaderBag::new(), None, "1.0").unwrap());
        assert_eq!(empty.body().size(), Some(0));
    }

    #[test]
    fn protocol_version_validation() {
        let m = Bare::default();
        assert_eq!(m.with_protocol_version("2").unwrap().protocol_version(), "2");
        assert_eq!(m.with_protocol_version("1.0").unwrap().protocol_version(), "1.0");
        for bad in ["", "1.", ".1", "HTTP/1.1", "1.1.1", "a"] {
            assert!(m.with_protocol_version(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn header_mutators_do_not_touch_receiver() {
        let m = Bare::default().with_header("X-Foo", "bar").unwrap();
        let added = m.with_added_header("x-foo", "baz").unwrap();
        let removed = m.without_header("X-FOO");

        assert_eq!(m.header("x-foo"), ["bar"]);
        assert_eq!(added.header_line("X-Foo"), "bar, baz");
        assert!(!removed.has_header("x-foo"));
    }

    #[test]
    fn unchanged_values_yield_equal_message() {
        let body = ByteStream::from_bytes("x");
        let m = Bare::default()
            .with_header("X-Foo", "bar")
            .unwrap()
            .with_body(body.clone());

        assert_eq!(m.with_header("X-Foo", "bar").unwrap(), m);
        assert_eq!(m.without_header("x-missing"), m);
        assert_eq!(m.with_protocol_version("1.1").unwrap(), m);
        assert_eq!(m.with_body(body), m);
    }

    #[test]
    fn body_is_shared_across_header_changes() {
        let m = Bare::default().with_body(ByteStream::from_bytes("shared"));
        let other = m.with_header("X-Foo", "bar").unwrap();
        assert!(m.body().ptr_eq(&other.body()));

        let replaced = m.with_body(ByteStream::from_bytes("new"));
        assert!(!m.body().ptr_eq(&replaced.body()));
        assert_eq!(m.body().to_string(), "shared");
    }
}
