//! Parsed, normalized URI value.
//!
//! A [`Uri`] holds the RFC 3986 components (scheme, user-info, host, port,
//! path, query, fragment) in normalized form:
//!
//! - scheme and host are lower-cased;
//! - `http`/`https` URIs without a host get `localhost`;
//! - a port equal to the scheme's well-known default is not stored;
//! - user-info, path, query and fragment are percent-encoded without
//!   double-encoding existing `%XX` triplets.
//!
//! The same normalization runs at parse time and in every `with_*` method, so
//! a `Uri` is always in canonical form.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

mod encoding;

use encoding::{Component, encode};

/// Well-known default ports, keyed by scheme.
const DEFAULT_PORTS: &[(&str, u16)] = &[("http", 80), ("https", 443)];

/// Host supplied to `http`/`https` URIs that have none.
const DEFAULT_HOST: &str = "localhost";

/// Returns the well-known default port for `scheme`, if any.
pub fn default_port(scheme: &str) -> Option<u16> {
    DEFAULT_PORTS
        .iter()
        .find(|(s, _)| *s == scheme)
        .map(|(_, port)| *port)
}

/// An immutable URI.
///
/// # Examples
///
/// ```
/// use rttp_message::Uri;
///
/// let uri: Uri = "HTTP://Example.com:80/x".parse().unwrap();
/// assert_eq!(uri.host(), "example.com");
/// assert_eq!(uri.port(), None);
/// assert_eq!(uri.to_string(), "http://example.com/x");
///
/// let uri = uri.with_port(Some(8080)).unwrap().with_query("a=b c").unwrap();
/// assert_eq!(uri.to_string(), "http://example.com:8080/x?a=b%20c");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Uri {
    scheme: String,
    user_info: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    fragment: String,
}

impl Uri {
    /// Parses and normalizes a URI reference.
    ///
    /// # Errors
    ///
    /// [`Error::UriParse`] if the scheme contains invalid characters, the port
    /// is not a number in `1..=65535`, IPv6 brackets are unbalanced, the host
    /// contains whitespace or control characters, or a port is given without
    /// a host.
    pub fn parse(input: &str) -> Result<Self> {
        let fail = |reason| Error::UriParse {
            uri: input.to_owned(),
            reason,
        };

        let (scheme, rest) = split_scheme(input);
        if let Some(scheme) = scheme {
            if !is_valid_scheme(scheme) {
                return Err(fail("invalid scheme"));
            }
        }

        let (authority, rest) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find(['/', '?', '#']).unwrap_or(after.len());
                (Some(&after[..end]), &after[end..])
            }
            None => (None, rest),
        };

        let (rest, fragment) = match rest.split_once('#') {
            Some((before, fragment)) => (before, fragment),
            None => (rest, ""),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };

        let mut uri = Uri {
            scheme: scheme.map(str::to_ascii_lowercase).unwrap_or_default(),
            path: encode(path, Component::Path),
            query: encode(query, Component::QueryOrFragment),
            fragment: encode(fragment, Component::QueryOrFragment),
            ..Uri::default()
        };

        if let Some(authority) = authority {
            let parts = parse_authority(authority).map_err(fail)?;
            uri.user_info = parts.user_info;
            uri.host = parts.host;
            uri.port = parts.port;
        }

        Ok(uri.normalized())
    }

    /// Returns the scheme, lower-cased, or an empty string.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the percent-encoded `user[:password]`, or an empty string.
    pub fn user_info(&self) -> &str {
        &self.user_info
    }

    /// Returns the host, lower-cased, or an empty string.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port, or `None` if absent or equal to the scheme default.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Returns the percent-encoded path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the percent-encoded query, without the leading `?`.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the percent-encoded fragment, without the leading `#`.
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// Returns `[user-info@]host[:port]`, or an empty string without a host.
    pub fn authority(&self) -> String {
        if self.host.is_empty() {
            return String::new();
        }

        let mut authority = String::new();
        if !self.user_info.is_empty() {
            authority.push_str(&self.user_info);
            authority.push('@');
        }
        authority.push_str(&self.host);
        if let Some(port) = self.port {
            authority.push(':');
            authority.push_str(&port.to_string());
        }
        authority
    }

    /// Returns a URI with the given scheme. The default-port and default-host
    /// rules are re-evaluated against the new scheme.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `scheme` is neither empty nor a valid
    /// RFC 3986 scheme.
    pub fn with_scheme(&self, scheme: &str) -> Result<Self> {
        let scheme = scheme.strip_suffix("://").unwrap_or(scheme);
        if !scheme.is_empty() && !is_valid_scheme(scheme) {
            return Err(Error::invalid(format!("{scheme:?} is not a valid URI scheme")));
        }

        Ok(self.rebuilt(|uri| uri.scheme = scheme.to_ascii_lowercase()))
    }

    /// Returns a URI with the given user and optional password.
    pub fn with_user_info(&self, user: &str, password: Option<&str>) -> Self {
        let mut user_info = encode(user, Component::UserInfo);
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            user_info.push(':');
            user_info.push_str(&encode(password, Component::UserInfo));
        }

        self.rebuilt(|uri| uri.user_info = user_info)
    }

    /// Returns a URI with the given host.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the host contains whitespace or control
    /// characters, or a `:` or bracket outside an `[IPv6]` literal.
    pub fn with_host(&self, host: &str) -> Result<Self> {
        if !is_valid_host(host) {
            return Err(Error::invalid(format!("{host:?} is not a valid host")));
        }

        Ok(self.rebuilt(|uri| uri.host = host.to_ascii_lowercase()))
    }

    /// Returns a URI with the given port, or without one for `None`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the port is outside `1..=65535`.
    pub fn with_port(&self, port: Option<u32>) -> Result<Self> {
        let port = match port {
            None => None,
            Some(port @ 1..=65535) => Some(port as u16),
            Some(port) => {
                return Err(Error::invalid(format!(
                    "port {port} is outside the range 1-65535"
                )));
            }
        };

        Ok(self.rebuilt(|uri| uri.port = port))
    }

    /// Returns a URI with the given path.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the path contains `?` or `#`.
    pub fn with_path(&self, path: &str) -> Result<Self> {
        if path.contains(['?', '#']) {
            return Err(Error::invalid(
                "path must not contain a query string or fragment",
            ));
        }

        Ok(self.rebuilt(|uri| uri.path = encode(path, Component::Path)))
    }

    /// Returns a URI with the given query. A leading `?` is ignored.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the query contains `#`.
    pub fn with_query(&self, query: &str) -> Result<Self> {
        if query.contains('#') {
            return Err(Error::invalid("query must not contain a fragment"));
        }
        let query = query.strip_prefix('?').unwrap_or(query);

        Ok(self.rebuilt(|uri| uri.query = encode(query, Component::QueryOrFragment)))
    }

    /// Returns a URI with the given fragment. A leading `#` is ignored.
    pub fn with_fragment(&self, fragment: &str) -> Self {
        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        self.rebuilt(|uri| uri.fragment = encode(fragment, Component::QueryOrFragment))
    }

    /// Assembles a URI reference from already-normalized components.
    ///
    /// The `//` authority marker is written whenever the authority is
    /// non-empty, and always for the `file` scheme. Without an authority, a
    /// path starting with `//` is written with a single leading slash so it
    /// cannot be read back as one.
    pub fn compose(scheme: &str, authority: &str, path: &str, query: &str, fragment: &str) -> String {
        let mut uri = String::new();

        if !scheme.is_empty() {
            uri.push_str(scheme);
            uri.push(':');
        }

        if !authority.is_empty() || scheme == "file" {
            uri.push_str("//");
            uri.push_str(authority);
        }

        if !path.is_empty() {
            if authority.is_empty() && path.starts_with("//") {
                uri.push('/');
                uri.push_str(path.trim_start_matches('/'));
            } else {
                if !authority.is_empty() && !path.starts_with('/') {
                    uri.push('/');
                }
                uri.push_str(path);
            }
        }

        if !query.is_empty() {
            uri.push('?');
            uri.push_str(query);
        }

        if !fragment.is_empty() {
            uri.push('#');
            uri.push_str(fragment);
        }

        uri
    }

    // Applies `change` to a copy and re-runs normalization.
    fn rebuilt(&self, change: impl FnOnce(&mut Uri)) -> Self {
        let mut uri = self.clone();
        change(&mut uri);
        uri.normalized()
    }

    fn normalized(mut self) -> Self {
        if self.host.is_empty() && matches!(self.scheme.as_str(), "http" | "https") {
            self.host = DEFAULT_HOST.to_owned();
        }
        if self.port.is_some() && self.port == default_port(&self.scheme) {
            self.port = None;
        }
        self
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Uri::compose(
            &self.scheme,
            &self.authority(),
            &self.path,
            &self.query,
            &self.fragment,
        ))
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

impl TryFrom<&str> for Uri {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

struct AuthorityParts {
    user_info: String,
    host: String,
    port: Option<u16>,
}

// Splits `scheme:` off the front. A colon only introduces a scheme when it
// comes before any of `/`, `?` and `#`.
fn split_scheme(input: &str) -> (Option<&str>, &str) {
    match input.find([':', '/', '?', '#']) {
        Some(idx) if idx > 0 && input.as_bytes()[idx] == b':' => {
            (Some(&input[..idx]), &input[idx + 1..])
        }
        _ => (None, input),
    }
}

// scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_valid_scheme(scheme: &str) -> bool {
    let mut bytes = scheme.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

// A `:` is only allowed inside an IPv6 literal, which must be the whole host.
fn is_valid_host(host: &str) -> bool {
    if host
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '/' | '?' | '#' | '@'))
    {
        return false;
    }

    match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(literal) => !literal.contains(['[', ']']),
        None => !host.contains([':', '[', ']']),
    }
}

fn parse_authority(authority: &str) -> std::result::Result<AuthorityParts, &'static str> {
    let (user_info, host_port) = match authority.rsplit_once('@') {
        Some((user_info, host_port)) => (Some(user_info), host_port),
        None => (None, authority),
    };

    let (host, port) = if let Some(after_bracket) = host_port.strip_prefix('[') {
        let close = after_bracket
            .find(']')
            .ok_or("unbalanced IPv6 brackets")?;
        let host = &host_port[..close + 2];
        match &after_bracket[close + 1..] {
            "" => (host, None),
            tail => match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err("unexpected characters after IPv6 host"),
            },
        }
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };

    if !is_valid_host(host) {
        return Err("invalid host");
    }

    let port = match port {
        None | Some("") => None,
        Some(port) => {
            if !port.bytes().all(|b| b.is_ascii_digit()) {
                return Err("invalid port");
            }
            match port.parse::<u32>() {
                Ok(port @ 1..=65535) => Some(port as u16),
                _ => return Err("port out of range"),
            }
        }
    };

    if host.is_empty() && port.is_some() {
        return Err("port given without a host");
    }

    let user_info = match user_info.map(|ui| ui.split_once(':').unwrap_or((ui, ""))) {
        Some((user, pass)) if !pass.is_empty() => format!(
            "{}:{}",
            encode(user, Component::UserInfo),
            encode(pass, Component::UserInfo)
        ),
        Some((user, _)) => encode(user, Component::UserInfo),
        None => String::new(),
    };

    Ok(AuthorityParts {
        user_info,
        host: host.to_ascii_lowercase(),
        port,
    })
}
