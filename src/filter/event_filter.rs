//! Event filters: primary rules plus optional error rules

use serde::{Deserialize, Serialize};
use std::fmt;

use super::path::{LookupError, Record};
use super::rules::{MatchedFields, RuleSet};

/// A primary rule set that decides whether an event is of interest, and a
/// secondary rule set that classifies a match as an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Rules used to match the event
    #[serde(default)]
    pub rules: RuleSet,

    /// If all these rules match, the matched event is considered an error
    #[serde(default, skip_serializing_if = "RuleSet::is_empty")]
    pub error_rules: RuleSet,
}

/// Evidence produced when an [`EventFilter`] matches a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Resolved values of every primary rule path
    pub matched_fields: MatchedFields,

    /// Resolved values of every error rule path.
    ///
    /// `Some` (possibly empty) when all error rules matched or none are
    /// configured; `None` when at least one configured error rule did not.
    pub matched_error_fields: Option<MatchedFields>,
}

impl MatchResult {
    /// Whether the match was classified as an error.
    ///
    /// Only true when error rules are configured and all of them matched.
    pub fn is_error(&self) -> bool {
        matches!(&self.matched_error_fields, Some(fields) if !fields.is_empty())
    }
}

impl EventFilter {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            error_rules: RuleSet::new(),
        }
    }

    pub fn with_error_rules(mut self, error_rules: RuleSet) -> Self {
        self.error_rules = error_rules;
        self
    }

    /// A filter needs at least one primary rule.
    pub fn is_valid(&self) -> bool {
        !self.rules.is_empty()
    }

    /// Match the filter against a record.
    ///
    /// Returns `Ok(None)` when a primary rule does not match. Error rules
    /// never veto a primary match; they only decide whether
    /// `matched_error_fields` is present.
    ///
    /// # Errors
    ///
    /// Any path in either rule set that cannot be resolved in `record`.
    ///
    /// # Examples
    ///
    /// ```
    /// use k8s_event_watcher::filter::{EventFilter, Pattern, RuleSet};
    /// use serde_json::json;
    ///
    /// let filter = EventFilter::new(
    ///     RuleSet::new().with_rule("type", Pattern::compile("Warning").unwrap()),
    /// );
    ///
    /// let result = filter.matches(&json!({"type": "Warning"})).unwrap().unwrap();
    /// assert_eq!(result.matched_fields["type"], "Warning");
    /// assert_eq!(result.matched_error_fields, Some(Default::default()));
    /// ```
    pub fn matches(&self, record: &Record) -> Result<Option<MatchResult>, LookupError> {
        let matched_fields = match self.rules.evaluate(record)? {
            Some(fields) => fields,
            None => return Ok(None),
        };

        let matched_error_fields = self.error_rules.evaluate(record)?;

        Ok(Some(MatchResult {
            matched_fields,
            matched_error_fields,
        }))
    }
}

impl fmt::Display for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.rules, f)
    }
}
