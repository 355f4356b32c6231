//! Case-insensitive, order-preserving header storage.
//!
//! HTTP header names are case-insensitive per [RFC 9110 §5.1]. The bag keeps
//! one entry per case-insensitive name, displayed with the exact case of the
//! most recent `set`/`add`, holding a non-empty ordered list of values.
//!
//! [RFC 9110 §5.1]: https://www.rfc-editor.org/rfc/rfc9110.html#section-5.1

use std::fmt;

use crate::error::{Error, Result};

/// Conversion into the ordered value list of a header field.
///
/// Implemented for single values (`&str`, `String`) and for sequences of them.
pub trait IntoHeaderValues {
    fn into_header_values(self) -> Vec<String>;
}

impl IntoHeaderValues for &str {
    fn into_header_values(self) -> Vec<String> {
        vec![self.to_owned()]
    }
}

impl IntoHeaderValues for String {
    fn into_header_values(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoHeaderValues for &String {
    fn into_header_values(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoHeaderValues for Vec<String> {
    fn into_header_values(self) -> Vec<String> {
        self
    }
}

impl IntoHeaderValues for Vec<&str> {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().map(str::to_owned).collect()
    }
}

impl IntoHeaderValues for &[&str] {
    fn into_header_values(self) -> Vec<String> {
        self.iter().map(|v| (*v).to_owned()).collect()
    }
}

impl<const N: usize> IntoHeaderValues for [&str; N] {
    fn into_header_values(self) -> Vec<String> {
        self.into_iter().map(str::to_owned).collect()
    }
}

/// A case-insensitive, multi-value HTTP header store with copy-on-write
/// mutation.
///
/// Mutators never touch the receiver: [`set`](Self::set),
/// [`add`](Self::add) and [`remove`](Self::remove) return a new bag.
///
/// # Examples
///
/// ```
/// use rttp_message::http::HeaderBag;
///
/// let headers = HeaderBag::new()
///     .set("Content-Type", "text/html; charset=utf-8").unwrap()
///     .add("X-Custom", "first").unwrap()
///     .add("x-custom", ["second", "third"]).unwrap();
///
/// assert_eq!(headers.get_line("content-type"), "text/html; charset=utf-8");
/// assert_eq!(headers.get("X-CUSTOM"), ["first", "second", "third"]);
/// assert_eq!(headers.get_line("x-missing"), "");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    // Exact-case name and its values; at most one entry per lower-cased name.
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderBag {
    /// Creates an empty header bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bag from `(name, values)` pairs. Repeated names (in any case)
    /// are merged in order, as with [`add`](Self::add).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] on an invalid name, an invalid value, or an
    /// empty value list.
    pub fn try_from_iter<I, N, V>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: IntoHeaderValues,
    {
        let mut bag = Self::new();
        for (name, values) in iter {
            bag.add_in_place(name.as_ref(), values)?;
        }
        Ok(bag)
    }

    /// Returns a bag where `name` holds exactly `values`.
    ///
    /// An existing entry for the same case-insensitive name is replaced. If
    /// its exact case differs, the old entry is removed and the new one is
    /// appended; otherwise the entry keeps its position.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `name` is not a token, a value contains
    /// forbidden bytes, or `values` is empty.
    pub fn set(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self> {
        let mut bag = self.clone();
        bag.set_in_place(name, values)?;
        Ok(bag)
    }

    /// Returns a bag with `values` appended to those already stored under
    /// `name`, or behaves like [`set`](Self::set) when `name` is absent.
    ///
    /// # Errors
    ///
    /// Same as [`set`](Self::set).
    pub fn add(&self, name: &str, values: impl IntoHeaderValues) -> Result<Self> {
        let mut bag = self.clone();
        bag.add_in_place(name, values)?;
        Ok(bag)
    }

    /// Returns a bag without `name` (case-insensitive). Absent names leave the
    /// bag unchanged.
    pub fn remove(&self, name: &str) -> Self {
        let mut bag = self.clone();
        bag.remove_in_place(name);
        bag
    }

    /// Returns all values for `name` (case-insensitive), or an empty slice.
    pub fn get(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|idx| self.entries[idx].1.as_slice())
            .unwrap_or(&[])
    }

    /// Returns the values for `name` joined with `", "`, or an empty string.
    pub fn get_line(&self, name: &str) -> String {
        self.get(name).join(", ")
    }

    /// Returns `true` if the bag holds `name` (case-insensitive).
    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns the exact-case header names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Returns an iterator over `(name, values)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Returns the number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn set_in_place(&mut self, name: &str, values: impl IntoHeaderValues) -> Result<()> {
        let values = normalize(name, values)?;
        match self.position(name) {
            Some(idx) if self.entries[idx].0 == name => self.entries[idx].1 = values,
            Some(idx) => {
                self.entries.remove(idx);
                self.entries.push((name.to_owned(), values));
            }
            None => self.entries.push((name.to_owned(), values)),
        }
        Ok(())
    }

    /// Sets `name` and moves it to the front of the bag.
    pub(crate) fn set_first_in_place(&mut self, name: &str, values: impl IntoHeaderValues) -> Result<()> {
        let values = normalize(name, values)?;
        self.remove_in_place(name);
        self.entries.insert(0, (name.to_owned(), values));
        Ok(())
    }

    pub(crate) fn add_in_place(&mut self, name: &str, values: impl IntoHeaderValues) -> Result<()> {
        let values = normalize(name, values)?;
        match self.position(name) {
            Some(idx) => {
                let entry = &mut self.entries[idx];
                if entry.0 != name {
                    entry.0 = name.to_owned();
                }
                entry.1.extend(values);
            }
            None => self.entries.push((name.to_owned(), values)),
        }
        Ok(())
    }

    /// Sets a single computed value, keeping the entry's position. Skips
    /// validation, so callers only pass names and values they generated.
    pub(crate) fn set_computed(&mut self, name: &str, value: String) {
        match self.position(name) {
            Some(idx) => self.entries[idx] = (name.to_owned(), vec![value]),
            None => self.entries.push((name.to_owned(), vec![value])),
        }
    }

    pub(crate) fn remove_in_place(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.entries.len() < before
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for HeaderBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, values) in &self.entries {
            write!(f, "{name}: {}\r\n", values.join(", "))?;
        }
        Ok(())
    }
}

// Validates the name and turns `values` into a non-empty list of trimmed values.
fn normalize(name: &str, values: impl IntoHeaderValues) -> Result<Vec<String>> {
    validate_name(name)?;

    let values = values.into_header_values();
    if values.is_empty() {
        return Err(Error::invalid(format!(
            "header {name:?} must have at least one value"
        )));
    }

    values
        .into_iter()
        .map(|value| {
            let trimmed = value.trim_matches(|c| c == ' ' || c == '\t');
            validate_value(name, trimmed)?;
            Ok(trimmed.to_owned())
        })
        .collect()
}

/// Validates a header field name.
///
/// ```text
/// field-name     = token
/// tchar          = "!" / "#" / "$" / "%" / "&" / "'" / "*"
///                / "+" / "-" / "." / "^" / "_" / "`" / "|" / "~"
///                / DIGIT / ALPHA
/// ```
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("header name must not be empty"));
    }

    let valid = name.bytes().all(|b| {
        matches!(b,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
            b'^' | b'_' | b'`' | b'|' | b'~' |
            b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z')
    });

    if valid {
        Ok(())
    } else {
        Err(Error::invalid(format!("{name:?} is not a valid header name")))
    }
}

/// Validates field content: visible characters, obs-text, SP and HTAB.
/// Rejects CR, LF, NUL and the remaining control bytes.
fn validate_value(name: &str, value: &str) -> Result<()> {
    let valid = value
        .bytes()
        .all(|b| b == b' ' || b == b'\t' || (0x21..=0x7E).contains(&b) || b >= 0x80);

    if valid {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "header {name:?} has a value with forbidden characters"
        )))
    }
}
