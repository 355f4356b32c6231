//! fopen-style open-mode strings.

use std::fs::OpenOptions;

use crate::error::{Error, Result};

/// A parsed open mode such as `"r"`, `"w+b"` or `"a+"`.
///
/// The mode decides two independent capabilities: whether the stream may be
/// read and whether it may be written. `r` is read-only; `w`, `a`, `x` and
/// `c` are write-only; a `+` makes any of them read-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMode {
    raw: String,
    base: Base,
    plus: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    /// Open existing for reading.
    Read,
    /// Create or truncate.
    Write,
    /// Create or append.
    Append,
    /// Create, failing if it exists.
    Exclusive,
    /// Create without truncating.
    Create,
}

impl OpenMode {
    /// Parses a mode string. Besides the base letter and an optional `+`,
    /// the flags `b`, `t` and `e` are accepted and ignored.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an unknown base letter or flag.
    pub fn parse(mode: &str) -> Result<Self> {
        let invalid = || Error::invalid(format!("{mode:?} is not a valid open mode"));

        let mut chars = mode.chars();
        let base = match chars.next() {
            Some('r') => Base::Read,
            Some('w') => Base::Write,
            Some('a') => Base::Append,
            Some('x') => Base::Exclusive,
            Some('c') => Base::Create,
            _ => return Err(invalid()),
        };

        let mut plus = false;
        for flag in chars {
            match flag {
                '+' if !plus => plus = true,
                'b' | 't' | 'e' => {}
                _ => return Err(invalid()),
            }
        }

        Ok(Self {
            raw: mode.to_owned(),
            base,
            plus,
        })
    }

    pub(crate) fn read_only() -> Self {
        Self::fixed("r", Base::Read, false)
    }

    pub(crate) fn write_only() -> Self {
        Self::fixed("w", Base::Write, false)
    }

    /// Mode of in-memory streams.
    pub(crate) fn read_write() -> Self {
        Self::fixed("w+b", Base::Write, true)
    }

    fn fixed(raw: &str, base: Base, plus: bool) -> Self {
        Self {
            raw: raw.to_owned(),
            base,
            plus,
        }
    }

    /// Returns the mode string as given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` for modes that allow reading.
    pub fn is_readable(&self) -> bool {
        self.plus || self.base == Base::Read
    }

    /// Returns `true` for modes that allow writing.
    pub fn is_writable(&self) -> bool {
        self.plus || self.base != Base::Read
    }

    pub(crate) fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(self.is_readable())
            .write(self.is_writable());

        match self.base {
            Base::Read => {}
            Base::Write => {
                options.create(true).truncate(true);
            }
            Base::Append => {
                options.create(true).append(true);
            }
            Base::Exclusive => {
                options.create_new(true);
            }
            Base::Create => {
                options.create(true);
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("r", true, false)]
    #[case("rb", true, false)]
    #[case("r+", true, true)]
    #[case("w", false, true)]
    #[case("w+b", true, true)]
    #[case("a", false, true)]
    #[case("a+", true, true)]
    #[case("x", false, true)]
    #[case("x+", true, true)]
    #[case("c", false, true)]
    #[case("c+t", true, true)]
    fn classifies_modes(#[case] mode: &str, #[case] readable: bool, #[case] writable: bool) {
        let mode = OpenMode::parse(mode).unwrap();
        assert_eq!(mode.is_readable(), readable);
        assert_eq!(mode.is_writable(), writable);
    }

    #[rstest]
    #[case("")]
    #[case("q")]
    #[case("r++")]
    #[case("rw")]
    fn rejects_unknown_modes(#[case] mode: &str) {
        assert!(matches!(OpenMode::parse(mode), Err(Error::InvalidArgument(_))));
    }
}
