//! `Set-Cookie` line construction.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Seconds in the past used for `Expires`/`Max-Age` of a deletion cookie.
pub const DELETION_HORIZON_SECS: u64 = 31_536_001;

/// Value written for a cookie that is being deleted.
const DELETED: &str = "deleted";

// Forbidden in names, and in raw values.
const FORBIDDEN: &[char] = &['=', ',', ';', ' ', '\t', '\r', '\n', '\x0b', '\x0c'];

// `Path` and `Domain` are written verbatim, so they must not end the attribute
// or the header line.
fn check_attribute(attribute: &str, value: &str) -> Result<()> {
    if value.chars().any(|c| c == ';' || c.is_ascii_control()) {
        return Err(Error::invalid(format!(
            "cookie {attribute} {value:?} contains a forbidden character"
        )));
    }
    Ok(())
}

/// The `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SameSite {
    Lax,
    Strict,
}

impl SameSite {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive. Use `Option<SameSite>` to leave the attribute unset.
impl FromStr for SameSite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("lax") {
            Ok(Self::Lax)
        } else if s.eq_ignore_ascii_case("strict") {
            Ok(Self::Strict)
        } else {
            Err(Error::invalid(format!(
                "SameSite must be \"lax\" or \"strict\", got {s:?}"
            )))
        }
    }
}

/// A cookie to be sent with a response.
///
/// Built with chained setters and rendered by
/// [`Response::with_cookie`](super::Response::with_cookie). Defaults: no
/// expiry, path `/`, no domain, not secure, HTTP-only, encoded, no `SameSite`.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
///
/// use rttp_message::http::{Cookie, SameSite};
///
/// let cookie = Cookie::new("session", "a b")
///     .max_age(3600)
///     .secure(true)
///     .same_site(Some(SameSite::Lax));
///
/// let line = cookie.to_header_value(UNIX_EPOCH + Duration::from_secs(0)).unwrap();
/// assert_eq!(
///     line,
///     "session=a%20b; Expires=Thu, 01 Jan 1970 01:00:00 GMT; Max-Age=3600; \
///      Path=/; Secure; HttpOnly; SameSite=Lax"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    max_age: i64,
    path: String,
    domain: String,
    secure: bool,
    http_only: bool,
    raw: bool,
    same_site: Option<SameSite>,
}

impl Cookie {
    /// An empty `value` turns the cookie into a deletion cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: 0,
            path: "/".to_owned(),
            domain: String::new(),
            secure: false,
            http_only: true,
            raw: false,
            same_site: None,
        }
    }

    /// Lifetime in seconds. Only positive values emit `Expires` and `Max-Age`.
    #[must_use]
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Writes name and value as given instead of encoding them.
    #[must_use]
    pub fn raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    #[must_use]
    pub fn same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the name as it appears on the wire.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an empty name or one containing any of
    /// `=,; \t\r\n\x0b\x0c`.
    pub fn encoded_name(&self) -> Result<String> {
        if self.name.is_empty() {
            return Err(Error::invalid("cookie name must not be empty"));
        }
        if self.name.contains(FORBIDDEN) {
            return Err(Error::invalid(format!(
                "cookie name {:?} contains a forbidden character",
                self.name
            )));
        }

        Ok(if self.raw {
            self.name.clone()
        } else {
            url_encode(&self.name)
        })
    }

    /// Renders the `Set-Cookie` value, computing expiry relative to `now`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an invalid name, a raw value containing
    /// a forbidden character, or a path or domain containing `;` or a control
    /// character.
    pub fn to_header_value(&self, now: SystemTime) -> Result<String> {
        check_attribute("path", &self.path)?;
        check_attribute("domain", &self.domain)?;

        let mut line = self.encoded_name()?;
        line.push('=');

        if self.value.is_empty() {
            let expires = now
                .checked_sub(Duration::from_secs(DELETION_HORIZON_SECS))
                .unwrap_or(UNIX_EPOCH);
            line.push_str(DELETED);
            line.push_str("; Expires=");
            line.push_str(&httpdate::fmt_http_date(expires));
            line.push_str(&format!("; Max-Age=-{DELETION_HORIZON_SECS}"));
        } else {
            if self.raw {
                if self.value.contains(FORBIDDEN) {
                    return Err(Error::invalid(format!(
                        "raw cookie value for {:?} contains a forbidden character",
                        self.name
                    )));
                }
                line.push_str(&self.value);
            } else {
                line.push_str(&urlencoding::encode(&self.value));
            }

            if self.max_age > 0 {
                let seconds = self.max_age.unsigned_abs();
                let expires = now
                    .checked_add(Duration::from_secs(seconds))
                    .unwrap_or(now);
                line.push_str("; Expires=");
                line.push_str(&httpdate::fmt_http_date(expires));
                line.push_str(&format!("; Max-Age={seconds}"));
            }
        }

        line.push_str("; Path=");
        line.push_str(if self.path.is_empty() { "/" } else { self.path.as_str() });

        if !self.domain.is_empty() {
            line.push_str("; Domain=");
            line.push_str(&self.domain);
        }
        if self.secure {
            line.push_str("; Secure");
        }
        if self.http_only {
            line.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            line.push_str("; SameSite=");
            line.push_str(same_site.as_str());
        }

        Ok(line)
    }
}

// Form-style URL encoding: like `urlencoding::encode`, but `~` is escaped too.
fn url_encode(input: &str) -> String {
    urlencoding::encode(input).replace('~', "%7E")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn epoch(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn deletion_cookie() {
        let line = Cookie::new("a", "").to_header_value(epoch(40_000_000)).unwrap();
        assert_eq!(
            line,
            "a=deleted; Expires=Wed, 08 Apr 1970 23:06:39 GMT; Max-Age=-31536001; Path=/; HttpOnly"
        );
    }

    #[test]
    fn deletion_before_epoch_clamps() {
        let line = Cookie::new("a", "").to_header_value(epoch(0)).unwrap();
        assert!(line.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }

    #[test]
    fn session_cookie_has_no_expiry() {
        let line = Cookie::new("sid", "abc").to_header_value(epoch(0)).unwrap();
        assert_eq!(line, "sid=abc; Path=/; HttpOnly");

        let negative = Cookie::new("sid", "abc").max_age(-5).to_header_value(epoch(0)).unwrap();
        assert_eq!(negative, line);
    }

    #[test]
    fn all_attributes_in_order() {
        let line = Cookie::new("sid", "abc")
            .max_age(60)
            .path("/app")
            .domain("example.com")
            .secure(true)
            .same_site(Some(SameSite::Strict))
            .to_header_value(epoch(0))
            .unwrap();
        assert_eq!(
            line,
            "sid=abc; Expires=Thu, 01 Jan 1970 00:01:00 GMT; Max-Age=60; Path=/app; \
             Domain=example.com; Secure; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn encoding_differs_for_name_and_value() {
        let line = Cookie::new("a~b", "c~d e")
            .http_only(false)
            .to_header_value(epoch(0))
            .unwrap();
        assert_eq!(line, "a%7Eb=c~d%20e; Path=/");
    }

    #[test]
    fn raw_cookie_is_written_verbatim() {
        let line = Cookie::new("a~b", "x%20y")
            .raw(true)
            .to_header_value(epoch(0))
            .unwrap();
        assert!(line.starts_with("a~b=x%20y;"));

        let bad = Cookie::new("a", "x;y").raw(true).to_header_value(epoch(0));
        assert!(matches!(bad, Err(Error::InvalidArgument(_))));
    }

    #[rstest]
    #[case("")]
    #[case("a=b")]
    #[case("a b")]
    #[case("a;b")]
    #[case("a,b")]
    #[case("a\tb")]
    #[case("a\nb")]
    #[case("a\x0bb")]
    fn invalid_names(#[case] name: &str) {
        let result = Cookie::new(name, "v").to_header_value(epoch(0));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[rstest]
    #[case::path_cr(Cookie::new("a", "1").path("/\rx"))]
    #[case::path_lf(Cookie::new("a", "1").path("/\r\nX-Injected: yes"))]
    #[case::path_nul(Cookie::new("a", "1").path("/\0"))]
    #[case::path_semicolon(Cookie::new("a", "1").path("/; Secure"))]
    #[case::path_del(Cookie::new("a", "1").path("/\x7f"))]
    #[case::domain_lf(Cookie::new("a", "1").domain("d\nX-Two: 2"))]
    #[case::domain_cr(Cookie::new("a", "1").domain("d\r"))]
    #[case::domain_semicolon(Cookie::new("a", "1").domain("d;x"))]
    #[case::domain_tab(Cookie::new("a", "1").domain("d\tx"))]
    #[case::deletion_path(Cookie::new("a", "").path("/\n"))]
    fn rejects_unsafe_path_and_domain(#[case] cookie: Cookie) {
        let result = cookie.to_header_value(epoch(0));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[rstest]
    #[case("lax", SameSite::Lax)]
    #[case("Strict", SameSite::Strict)]
    #[case("LAX", SameSite::Lax)]
    fn same_site_parsing(#[case] input: &str, #[case] expected: SameSite) {
        assert_eq!(input.parse::<SameSite>().unwrap(), expected);
    }

    #[test]
    fn same_site_rejects_unknown() {
        assert!("none".parse::<SameSite>().is_err());
        assert!("".parse::<SameSite>().is_err());
    }
}
