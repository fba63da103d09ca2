//! Regex predicates with optional inversion
//!
//! A pattern is written the way users put it in the config file: a regular
//! expression, optionally prefixed with `!` to invert the match. Matching is
//! an unanchored search; anchor with `^...$` for a full-string match.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::WatcherError;

/// Prefix that turns a pattern into an inverse match.
pub const INVERSE_PREFIX: char = '!';

/// A compiled regular expression plus an inversion flag.
///
/// `matches(v) == inverse XOR regex.is_match(v)`.
#[derive(Clone, Debug)]
pub struct Pattern {
    regex: Regex,
    inverse: bool,
}

impl Pattern {
    /// Compile a pattern from its textual form.
    ///
    /// A leading `!` is stripped and sets the inverse flag; the rest is
    /// compiled as a regular expression.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::InvalidRegex` if the remainder is not a valid
    /// regular expression.
    ///
    /// # Examples
    ///
    /// ```
    /// use k8s_event_watcher::filter::Pattern;
    ///
    /// let pattern = Pattern::compile("!^Normal$").unwrap();
    /// assert!(pattern.is_inverse());
    /// assert!(pattern.matches("Warning"));
    /// assert!(!pattern.matches("Normal"));
    /// ```
    pub fn compile(text: &str) -> Result<Self, WatcherError> {
        let (inverse, expression) = match text.strip_prefix(INVERSE_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let regex = Regex::new(expression).map_err(|source| WatcherError::InvalidRegex {
            pattern: text.to_string(),
            source,
        })?;

        Ok(Self { regex, inverse })
    }

    /// Test a value against the pattern.
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value) != self.inverse
    }

    /// Whether the pattern was written with the `!` prefix.
    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    /// The regular expression without the inversion prefix.
    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.inverse {
            write!(f, "{}{}", INVERSE_PREFIX, self.regex.as_str())
        } else {
            f.write_str(self.regex.as_str())
        }
    }
}

impl FromStr for Pattern {
    type Err = WatcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

// Two patterns are equal when they serialize to the same text.
impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.inverse == other.inverse && self.regex.as_str() == other.regex.as_str()
    }
}

impl Eq for Pattern {}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Pattern::compile(&text).map_err(serde::de::Error::custom)
    }
}
