//! Path to pattern rule sets evaluated with AND semantics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::path::{resolve_string, LookupError, Record};
use super::pattern::Pattern;

/// Evidence collected for a rule set: each path mapped to its resolved text.
pub type MatchedFields = BTreeMap<String, String>;

/// A mapping from dotted path to pattern.
///
/// Paths are kept sorted, which makes serialization and display
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: BTreeMap<String, Pattern>,
}

impl RuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the pattern for `path`.
    pub fn insert(&mut self, path: impl Into<String>, pattern: Pattern) -> Option<Pattern> {
        self.rules.insert(path.into(), pattern)
    }

    /// Builder-style [`RuleSet::insert`].
    pub fn with_rule(mut self, path: impl Into<String>, pattern: Pattern) -> Self {
        self.insert(path, pattern);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Pattern> {
        self.rules.get(path)
    }

    /// Iterate over `(path, pattern)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pattern)> {
        self.rules.iter().map(|(path, pattern)| (path.as_str(), pattern))
    }

    /// Evaluate every rule against `record`.
    ///
    /// Returns `Ok(Some(fields))` when every path resolves and every value
    /// satisfies its pattern, with `fields` holding exactly the rule paths.
    /// Returns `Ok(None)` on the first value that fails its pattern.
    ///
    /// # Errors
    ///
    /// A path that cannot be resolved is a `LookupError`, not a non-match.
    pub fn evaluate(&self, record: &Record) -> Result<Option<MatchedFields>, LookupError> {
        let mut fields = MatchedFields::new();

        for (path, pattern) in &self.rules {
            let value = resolve_string(record, path)?;
            if !pattern.matches(&value) {
                return Ok(None);
            }
            fields.insert(path.clone(), value);
        }

        Ok(Some(fields))
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (path, pattern)) in self.rules.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", path, pattern)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, Pattern)> for RuleSet {
    fn from_iter<I: IntoIterator<Item = (String, Pattern)>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}
