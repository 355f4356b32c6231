//! Component-aware percent-encoding.
//!
//! Encoding here is "encode unless already encoded": a `%` followed by two hex
//! digits is carried through untouched, so filtering an already-filtered
//! component is idempotent.

use std::fmt::Write;

/// URI component whose allowed character set governs encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Component {
    /// `user` or `password` of the user-info. Only unreserved and sub-delims.
    UserInfo,
    /// Path: additionally `:`, `@` and `/`.
    Path,
    /// Query and fragment: additionally `:`, `@`, `/` and `?`.
    QueryOrFragment,
}

// unreserved  = ALPHA / DIGIT / "-" / "." / "_" / "~"
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

// sub-delims  = "!" / "$" / "&" / "'" / "(" / ")" / "*" / "+" / "," / ";" / "="
fn is_sub_delim(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
    )
}

fn is_allowed(component: Component, b: u8) -> bool {
    if is_unreserved(b) || is_sub_delim(b) {
        return true;
    }
    match component {
        Component::UserInfo => false,
        Component::Path => matches!(b, b':' | b'@' | b'/'),
        Component::QueryOrFragment => matches!(b, b':' | b'@' | b'/' | b'?'),
    }
}

/// Percent-encodes every byte of `input` outside the component's allowed set,
/// leaving valid `%XX` triplets intact. A stray `%` becomes `%25`.
pub(crate) fn encode(input: &str, component: Component) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' && is_pct_triplet(&bytes[i..]) {
            out.push_str(&input[i..i + 3]);
            i += 3;
            continue;
        }

        if is_allowed(component, b) {
            out.push(b as char);
        } else {
            // Writing to a String cannot fail.
            let _ = write!(out, "%{b:02X}");
        }
        i += 1;
    }

    out
}

fn is_pct_triplet(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[1].is_ascii_hexdigit() && bytes[2].is_ascii_hexdigit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_disallowed_characters() {
        assert_eq!(encode("/a b", Component::Path), "/a%20b");
        assert_eq!(encode("/ünï", Component::Path), "/%C3%BCn%C3%AF");
        assert_eq!(encode("a b=c d", Component::QueryOrFragment), "a%20b=c%20d");
        assert_eq!(encode("us:er@x", Component::UserInfo), "us%3Aer%40x");
    }

    #[test]
    fn keeps_component_punctuation() {
        assert_eq!(encode("/a:b@c/d", Component::Path), "/a:b@c/d");
        assert_eq!(encode("/a?b", Component::Path), "/a%3Fb");
        assert_eq!(encode("q=1?x/y", Component::QueryOrFragment), "q=1?x/y");
        assert_eq!(encode("!$&'()*+,;=", Component::UserInfo), "!$&'()*+,;=");
    }

    #[test]
    fn does_not_double_encode() {
        assert_eq!(encode("/a%20b", Component::Path), "/a%20b");
        assert_eq!(encode("%2f%2F", Component::QueryOrFragment), "%2f%2F");
        let once = encode("/a b/ü", Component::Path);
        assert_eq!(encode(&once, Component::Path), once);
    }

    #[test]
    fn stray_percent_is_encoded() {
        assert_eq!(encode("/100%", Component::Path), "/100%25");
        assert_eq!(encode("/%zz", Component::Path), "/%25zz");
        assert_eq!(encode("%4", Component::QueryOrFragment), "%254");
    }
}
