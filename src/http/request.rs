//! Outgoing HTTP requests.
//!
//! A [`Request`] composes an [`HttpMessage`] with a [`Method`], a [`Uri`] and
//! the request-target string sent on the request line. Request behavior is
//! exposed through the [`HttpRequest`] trait so that
//! [`ServerRequest`](super::ServerRequest) shares it by delegation.

use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::http::Method;
use crate::http::headers::HeaderBag;
use crate::http::message::{DEFAULT_PROTOCOL_VERSION, HttpMessage, Message};
use crate::stream::ByteStream;
use crate::uri::Uri;

/// An HTTP request.
///
/// # Examples
///
/// ```
/// use rttp_message::{HttpRequest, Message, Request, Uri};
///
/// let uri = Uri::parse("http://example.com/search?q=rust").unwrap();
/// let request = Request::new("GET", uri).unwrap();
///
/// assert_eq!(request.header_line("Host"), "example.com");
/// assert_eq!(request.request_target(), "/search?q=rust");
///
/// let post = request.with_method("POST").unwrap();
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(post.method().as_str(), "POST");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    message: HttpMessage,
    method: Method,
    uri: Uri,
    /// Explicit request-target; overrides the computed one until cleared.
    request_target: Option<String>,
    computed_target: OnceLock<String>,
}

impl Request {
    /// Creates a request with no headers, an empty body and protocol 1.1.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `method` is not in the allow-list.
    pub fn new(method: &str, uri: Uri) -> Result<Self> {
        Self::from_parts(method, uri, HeaderBag::new(), None, DEFAULT_PROTOCOL_VERSION)
    }

    /// Creates a request from all of its parts.
    ///
    /// Unless `headers` already carries a `Host` header, one is derived from
    /// the URI's `host[:port]` and placed first.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unsupported method or a malformed
    /// protocol version.
    pub fn from_parts(
        method: &str,
        uri: Uri,
        headers: HeaderBag,
        body: Option<ByteStream>,
        protocol_version: &str,
    ) -> Result<Self> {
        let method = method.parse()?;
        let mut message = HttpMessage::new(headers, body, protocol_version)?;

        if !message.headers().has("Host") {
            apply_host(&mut message, &uri)?;
        }

        Ok(Self {
            message,
            method,
            uri,
            request_target: None,
            computed_target: OnceLock::new(),
        })
    }
}

impl Default for Request {
    fn default() -> Self {
        Self {
            message: HttpMessage::default(),
            method: Method::Get,
            uri: Uri::default(),
            request_target: None,
            computed_target: OnceLock::new(),
        }
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.uri == other.uri
            && self.request_target == other.request_target
            && self.message == other.message
    }
}

impl Message for Request {
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

/// Request behavior shared by [`Request`] and
/// [`ServerRequest`](super::ServerRequest).
pub trait HttpRequest: Message {
    /// Returns the embedded request.
    fn request(&self) -> &Request;

    /// Returns a copy of `self` carrying `request`.
    #[must_use]
    fn with_request(&self, request: Request) -> Self;

    fn method(&self) -> Method {
        self.request().method
    }

    fn uri(&self) -> &Uri {
        &self.request().uri
    }

    /// Returns the request-target: the explicit override if one is set,
    /// otherwise `path[?query[#fragment]]` with the path defaulting to `/`.
    fn request_target(&self) -> &str {
        let request = self.request();
        match &request.request_target {
            Some(target) => target,
            None => request
                .computed_target
                .get_or_init(|| compute_target(&request.uri)),
        }
    }

    /// Returns a request with a different method. Method names are
    /// case-sensitive.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `method` is not in the allow-list.
    fn with_method(&self, method: &str) -> Result<Self> {
        let method: Method = method.parse()?;
        if method == self.method() {
            return Ok(self.clone());
        }

        let mut request = self.request().clone();
        request.method = method;
        Ok(self.with_request(request))
    }

    /// Returns a request with a different URI.
    ///
    /// Unless `preserve_host` is set, the `Host` header is recomputed from the
    /// new URI when that URI has a host.
    ///
    /// # Errors
    ///
    /// Only if the URI's host cannot form a valid header value, which a
    /// parsed [`Uri`] never produces.
    fn with_uri(&self, uri: Uri, preserve_host: bool) -> Result<Self> {
        if &uri == self.uri() {
            return Ok(self.clone());
        }

        let mut request = self.request().clone();
        if !preserve_host {
            apply_host(&mut request.message, &uri)?;
        }
        request.uri = uri;
        request.computed_target = OnceLock::new();
        Ok(self.with_request(request))
    }

    /// Overrides the request-target, e.g. with `*` or an absolute-form URI.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `target` contains whitespace.
    fn with_request_target(&self, target: &str) -> Result<Self> {
        if target.contains(char::is_whitespace) {
            return Err(Error::invalid(format!(
                "request target {target:?} must not contain whitespace"
            )));
        }
        if self.request().request_target.as_deref() == Some(target) {
            return Ok(self.clone());
        }

        let mut request = self.request().clone();
        request.request_target = Some(target.to_owned());
        Ok(self.with_request(request))
    }

    /// Clears an explicit request-target so it is computed from the URI again.
    fn without_request_target(&self) -> Self {
        if self.request().request_target.is_none() {
            return self.clone();
        }

        let mut request = self.request().clone();
        request.request_target = None;
        self.with_request(request)
    }
}

impl HttpRequest for Request {
    fn request(&self) -> &Request {
        self
    }

    fn with_request(&self, request: Request) -> Self {
        request
    }
}

// Sets Host from the URI, first in order. Nothing happens without a host.
fn apply_host(message: &mut HttpMessage, uri: &Uri) -> Result<()> {
    if uri.host().is_empty() {
        return Ok(());
    }

    let host = match uri.port() {
        Some(port) => format!("{}:{port}", uri.host()),
        None => uri.host().to_owned(),
    };
    message.headers_mut().set_first_in_place("Host", host)
}

fn compute_target(uri: &Uri) -> String {
    let mut target = match uri.path() {
        "" => "/".to_owned(),
        path => path.to_owned(),
    };

    if !uri.query().is_empty() {
        target.push('?');
        target.push_str(uri.query());
        if !uri.fragment().is_empty() {
            target.push('#');
            target.push_str(uri.fragment());
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn uri(s: &str) -> Uri {
        Uri::parse(s).unwrap()
    }

    #[test]
    fn host_header_from_uri() {
        let request = Request::new("GET", uri("http://example.com/x")).unwrap();
        assert_eq!(request.header_line("Host"), "example.com");

        let with_port = Request::new("GET", uri("http://example.com:8080/")).unwrap();
        assert_eq!(with_port.header_line("host"), "example.com:8080");
    }

    #[test]
    fn host_header_is_first() {
        let headers = HeaderBag::try_from_iter([("Accept", "*/*")]).unwrap();
        let request = Request::from_parts("GET", uri("http://a.test/"), headers, None, "1.1").unwrap();
        assert_eq!(request.headers().names().collect::<Vec<_>>(), ["Host", "Accept"]);
    }

    #[test]
    fn explicit_host_header_is_kept() {
        let headers = HeaderBag::try_from_iter([("host", "proxy.test")]).unwrap();
        let request = Request::from_parts("GET", uri("http://a.test/"), headers, None, "1.1").unwrap();
        assert_eq!(request.header("Host"), ["proxy.test"]);
    }

    #[test]
    fn no_host_without_uri_host() {
        let request = Request::new("GET", uri("/relative")).unwrap();
        assert!(!request.has_header("Host"));
    }

    #[rstest]
    #[case("get")]
    #[case("TRACE")]
    #[case("")]
    fn rejects_methods_outside_allow_list(#[case] method: &str) {
        assert!(matches!(
            Request::new(method, Uri::default()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(Request::default().with_method(method).is_err());
    }

    #[rstest]
    #[case("", "/")]
    #[case("http://a.test", "/")]
    #[case("http://a.test/p", "/p")]
    #[case("http://a.test/p?q=1", "/p?q=1")]
    #[case("http://a.test/p?q=1#frag", "/p?q=1#frag")]
    #[case("http://a.test/p#frag", "/p")]
    fn computed_request_target(#[case] input: &str, #[case] expected: &str) {
        let request = Request::new("GET", uri(input)).unwrap();
        assert_eq!(request.request_target(), expected);
    }

    #[test]
    fn explicit_request_target_overrides_until_cleared() {
        let request = Request::new("OPTIONS", uri("http://a.test/p")).unwrap();
        let star = request.with_request_target("*").unwrap();
        assert_eq!(star.request_target(), "*");

        let moved = star.with_uri(uri("http://a.test/other"), false).unwrap();
        assert_eq!(moved.request_target(), "*");

        let cleared = moved.without_request_target();
        assert_eq!(cleared.request_target(), "/other");
        assert_eq!(request.request_target(), "/p");
    }

    #[test]
    fn request_target_rejects_whitespace() {
        let request = Request::default();
        assert!(request.with_request_target("/a b").is_err());
        assert!(request.with_request_target("/a\tb").is_err());
    }

    #[test]
    fn with_uri_recomputes_host_and_target() {
        let request = Request::new("GET", uri("http://a.test/one")).unwrap();
        assert_eq!(request.request_target(), "/one");

        let next = request.with_uri(uri("http://b.test:81/two?x"), false).unwrap();
        assert_eq!(next.header_line("Host"), "b.test:81");
        assert_eq!(next.request_target(), "/two?x");

        assert_eq!(request.header_line("Host"), "a.test");
        assert_eq!(request.request_target(), "/one");
    }

    #[test]
    fn with_uri_preserving_host() {
        let request = Request::new("GET", uri("http://a.test/")).unwrap();
        let next = request.with_uri(uri("http://b.test/"), true).unwrap();
        assert_eq!(next.header_line("Host"), "a.test");
        assert_eq!(next.uri().host(), "b.test");
    }

    #[test]
    fn with_uri_without_host_keeps_header() {
        let request = Request::new("GET", uri("http://a.test/")).unwrap();
        let next = request.with_uri(uri("/local"), false).unwrap();
        assert_eq!(next.header_line("Host"), "a.test");
    }

    #[test]
    fn unchanged_values_yield_equal_request() {
        let request = Request::new("GET", uri("http://a.test/")).unwrap();
        assert_eq!(request.with_method("GET").unwrap(), request);
        assert_eq!(request.with_uri(request.uri().clone(), false).unwrap(), request);
        assert_eq!(request.without_request_target(), request);
    }

    #[test]
    fn message_operations_keep_request_parts() {
        let request = Request::new("PUT", uri("http://a.test/doc")).unwrap();
        let next = request
            .with_header("Content-Type", "text/plain")
            .unwrap()
            .with_body(ByteStream::from_bytes("hello"));

        assert_eq!(next.method(), Method::Put);
        assert_eq!(next.uri(), request.uri());
        assert_eq!(next.body().to_string(), "hello");
        assert!(!request.has_header("Content-Type"));
    }
}
