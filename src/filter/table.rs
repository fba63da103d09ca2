//! Ordered filter tables with first-match-wins selection

use serde::{Deserialize, Serialize};

use super::event_filter::{EventFilter, MatchResult};
use super::path::{LookupError, Record};
use crate::error::WatcherError;

/// The ordered list of filters plus the temporal admission flag.
///
/// Order is significant: [`FilterTable::matching_event_filter`] returns the
/// first filter that matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterTable {
    /// Filters in evaluation order
    #[serde(default)]
    pub filters: Vec<EventFilter>,

    /// If true, accepts only events created after the watcher was launched
    #[serde(default)]
    pub since_now: bool,
}

impl FilterTable {
    pub fn new(filters: Vec<EventFilter>) -> Self {
        Self {
            filters,
            since_now: false,
        }
    }

    pub fn with_since_now(mut self, since_now: bool) -> Self {
        self.since_now = since_now;
        self
    }

    /// Check every filter has at least one primary rule.
    ///
    /// An empty table is valid and simply never matches.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::EmptyRuleSet` naming the first offending filter.
    pub fn validate(&self) -> Result<(), WatcherError> {
        match self.filters.iter().position(|filter| !filter.is_valid()) {
            Some(index) => Err(WatcherError::EmptyRuleSet { index }),
            None => Ok(()),
        }
    }

    /// Select the first filter matching `record`.
    ///
    /// Later filters are never evaluated once one matches. A lookup failure
    /// aborts the scan immediately.
    ///
    /// # Examples
    ///
    /// ```
    /// use k8s_event_watcher::filter::FilterTable;
    /// use serde_json::json;
    ///
    /// let table: FilterTable = serde_yaml::from_str(
    ///     "filters:\n  - rules:\n      type: Warning\n",
    /// ).unwrap();
    ///
    /// let (filter, result) = table
    ///     .matching_event_filter(&json!({"type": "Warning"}))
    ///     .unwrap()
    ///     .unwrap();
    /// assert_eq!(filter.to_string(), "type=Warning");
    /// assert_eq!(result.matched_fields["type"], "Warning");
    /// ```
    pub fn matching_event_filter(
        &self,
        record: &Record,
    ) -> Result<Option<(&EventFilter, MatchResult)>, LookupError> {
        for filter in &self.filters {
            if let Some(result) = filter.matches(record)? {
                return Ok(Some((filter, result)));
            }
        }

        Ok(None)
    }

    /// Serialize the table back to its YAML configuration shape.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which cannot happen for well-formed
    /// tables but is propagated rather than hidden.
    pub fn dump(&self) -> Result<String, WatcherError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
