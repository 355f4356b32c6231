//! Building a [`ServerRequest`] from a raw HTTP/1.x request using the
//! [`httparse`] crate.

use std::collections::HashMap;
use std::str;

use tracing::debug;

use crate::error::{Error, Result};
use crate::http::headers::HeaderBag;
use crate::http::message::Message;
use crate::http::request::HttpRequest;
use crate::http::server_request::{ServerParams, ServerRequest};
use crate::stream::ByteStream;
use crate::uri::Uri;

/// Maximum number of headers we support per request.
pub const MAX_HEADERS: usize = 64;

impl ServerRequest {
    /// Parses a raw HTTP/1.x request from a byte slice.
    ///
    /// Returns the request and the byte offset at which the body begins in
    /// `buf`. The body is the rest of `buf`, cut at `Content-Length` when
    /// present. The URI scheme is `https` when the `HTTPS` server parameter
    /// is `on` or `1`. Query and cookie parameters are decoded from the
    /// request target and the `Cookie` header.
    ///
    /// # Errors
    ///
    /// - [`Error::Incomplete`]: more data is needed to complete the head.
    /// - [`Error::Parse`]: the head is malformed.
    /// - [`Error::InvalidArgument`]: unsupported method, or a header the
    ///   message model rejects.
    /// - [`Error::UriParse`]: the target and `Host` do not form a URI.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_message::{HttpRequest, Message, ServerRequest};
    ///
    /// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\nCookie: sid=abc\r\n\r\n";
    /// let (request, _offset) = ServerRequest::parse(raw, Default::default()).unwrap();
    ///
    /// assert_eq!(request.method().as_str(), "GET");
    /// assert_eq!(request.uri().to_string(), "http://localhost/hello?name=world");
    /// assert_eq!(request.query_params()["name"], "world");
    /// assert_eq!(request.cookie_params()["sid"], "abc");
    /// assert_eq!(request.header_line("host"), "localhost");
    /// ```
    pub fn parse(buf: &[u8], server_params: ServerParams) -> Result<(Self, usize)> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(Error::Incomplete),
        };

        // A complete parse always fills these.
        let (Some(method), Some(target), Some(version)) =
            (raw_req.method, raw_req.path, raw_req.version)
        else {
            return Err(Error::Incomplete);
        };

        let mut header_bag = HeaderBag::new();
        for header in raw_req.headers.iter() {
            match str::from_utf8(header.value) {
                Ok(value) => header_bag.add_in_place(header.name, value)?,
                Err(e) => debug!(
                    name = header.name,
                    error = %e,
                    "skipping header with a non-UTF-8 value"
                ),
            }
        }

        let scheme = if is_https(&server_params) { "https" } else { "http" };
        let uri = request_uri(scheme, target, &header_bag.get_line("host"))?;

        let body_end = header_bag
            .get_line("content-length")
            .trim()
            .parse::<usize>()
            .map_or(buf.len(), |len| body_offset.saturating_add(len).min(buf.len()));
        let body = ByteStream::from_bytes(&buf[body_offset..body_end]);

        let request = ServerRequest::from_parts(
            method,
            uri,
            header_bag,
            Some(body),
            &format!("1.{version}"),
            server_params,
        )?;

        let query = parse_query_string(request.uri().query());
        let cookies = parse_cookie_header(&request.header_line("cookie"));
        debug!(
            method,
            target,
            headers = request.headers().len(),
            body = body_end - body_offset,
            "parsed request head"
        );

        Ok((
            request.with_query_params(query).with_cookie_params(cookies),
            body_offset,
        ))
    }
}

fn is_https(server_params: &ServerParams) -> bool {
    server_params
        .get("HTTPS")
        .is_some_and(|v| v.eq_ignore_ascii_case("on") || v == "1")
}

// Origin-form targets are resolved against Host; absolute-form and `*` are
// taken as they are.
fn request_uri(scheme: &str, target: &str, host: &str) -> Result<Uri> {
    if target.starts_with('/') && !host.is_empty() {
        Uri::parse(&format!("{scheme}://{host}{target}"))
    } else if target.starts_with('/') {
        Uri::parse(target)?.with_scheme(scheme)
    } else {
        Uri::parse(target)
    }
}

/// Parses a URL query string (`key=value&key2=value2`) into a `HashMap`.
///
/// `+` is decoded as a space and percent-escapes are decoded; pairs that do
/// not decode to UTF-8 are kept as written. Later keys win.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = decode_component(&parts.next()?.replace('+', " "));
            let value = decode_component(&parts.next().unwrap_or("").replace('+', " "));
            (!key.is_empty()).then_some((key, value))
        })
        .collect()
}

/// Parses a `Cookie` header (`a=1; b=2`) into a `HashMap`. Values are
/// percent-decoded; the first occurrence of a name wins.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().trim_matches('"');
        cookies
            .entry(name.to_owned())
            .or_insert_with(|| decode_component(value));
    }
    cookies
}

fn decode_component(input: &str) -> String {
    urlencoding::decode(input)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| input.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    fn parse(raw: &[u8]) -> Result<(ServerRequest, usize)> {
        ServerRequest::parse(raw, ServerParams::new())
    }

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = parse(raw).unwrap();
        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.uri().path(), "/");
        assert_eq!(req.protocol_version(), "1.1");
        assert_eq!(req.header_line("host"), "localhost");
        assert_eq!(req.request_target(), "/");
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn parse_query_params() {
        let raw = b"GET /search?q=rust+lang&tag=%C3%A9t%C3%A9&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = parse(raw).unwrap();
        assert_eq!(req.uri().path(), "/search");
        assert_eq!(req.query_params()["q"], "rust lang");
        assert_eq!(req.query_params()["tag"], "été");
        assert_eq!(req.query_params()["page"], "2");
    }

    #[test]
    fn parse_cookies() {
        let raw = b"GET / HTTP/1.1\r\nHost: a.test\r\nCookie: sid=a%20b; theme=\"dark\"; sid=ignored\r\n\r\n";
        let (req, _) = parse(raw).unwrap();
        assert_eq!(req.cookie_params()["sid"], "a b");
        assert_eq!(req.cookie_params()["theme"], "dark");
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(parse(raw), Err(Error::Incomplete)));
    }

    #[test]
    fn malformed_request() {
        let raw = b"GET / HTTP/1.1\r\nBad Header\r\n\r\n";
        assert!(matches!(parse(raw), Err(Error::Parse(_))));
    }

    #[test]
    fn unsupported_method() {
        let raw = b"BREW /pot HTTP/1.1\r\nHost: a.test\r\n\r\n";
        assert!(matches!(parse(raw), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn body_is_cut_at_content_length() {
        let raw = b"POST /f HTTP/1.0\r\nHost: a.test\r\nContent-Length: 5\r\n\r\nhelloEXTRA";
        let (req, body_offset) = parse(raw).unwrap();
        assert_eq!(req.protocol_version(), "1.0");
        assert_eq!(&raw[body_offset..body_offset + 5], b"hello");
        assert_eq!(req.body().to_string(), "hello");
    }

    #[test]
    fn https_server_param_sets_scheme() {
        let raw = b"GET /secure HTTP/1.1\r\nHost: a.test\r\n\r\n";
        let params = ServerParams::from([("HTTPS".to_owned(), "on".to_owned())]);
        let (req, _) = ServerRequest::parse(raw, params).unwrap();
        assert_eq!(req.uri().to_string(), "https://a.test/secure");
        assert_eq!(req.server_param("HTTPS"), Some("on"));
    }

    #[test]
    fn non_utf8_header_value_is_skipped() {
        let raw = b"GET / HTTP/1.1\r\nHost: a.test\r\nX-Latin: caf\xe9\r\nAccept: */*\r\n\r\n";
        let (req, _) = parse(raw).unwrap();
        assert!(!req.has_header("X-Latin"));
        assert_eq!(req.header_line("accept"), "*/*");
    }

    #[test]
    fn host_with_port() {
        let raw = b"GET / HTTP/1.1\r\nHost: a.test:8080\r\n\r\n";
        let (req, _) = parse(raw).unwrap();
        assert_eq!(req.uri().port(), Some(8080));
        assert_eq!(req.header("Host"), ["a.test:8080"]);
    }

    #[test]
    fn missing_host_defaults_to_localhost() {
        let raw = b"GET /x HTTP/1.0\r\n\r\n";
        let (req, _) = parse(raw).unwrap();
        assert_eq!(req.uri().to_string(), "http://localhost/x");
        assert_eq!(req.header_line("host"), "localhost");
    }

    #[test]
    fn query_string_edge_cases() {
        let params = parse_query_string("a=1&&b&=x&a=2");
        assert_eq!(params["a"], "2");
        assert_eq!(params["b"], "");
        assert_eq!(params.len(), 2);
        assert!(parse_query_string("").is_empty());
    }
}
