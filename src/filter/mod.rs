//! Event classification engine
//!
//! Classifies normalized event records against user-defined rules:
//!
//! - [`pattern`]: regex predicates with `!` inversion
//! - [`path`]: dotted path resolution over [`Record`] trees
//! - [`rules`]: path to pattern rule sets with AND semantics
//! - [`event_filter`]: primary rules plus error classification rules
//! - [`table`]: ordered filters with first-match-wins selection
//!
//! Everything here is immutable after construction and safe to share
//! across threads; nothing blocks or logs.

pub mod event_filter;
pub mod path;
pub mod pattern;
pub mod rules;
pub mod table;

pub use event_filter::{EventFilter, MatchResult};
pub use path::{LookupError, Record};
pub use pattern::Pattern;
pub use rules::{MatchedFields, RuleSet};
pub use table::FilterTable;
