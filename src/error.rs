//! Error types for k8s-event-watcher
//!
//! This module defines the error taxonomy shared by the classification
//! engine, the watcher lifecycle and the delivery layer, using `thiserror`.

use thiserror::Error;

use crate::filter::LookupError;

/// Main error type for watcher operations
///
/// Configuration-time variants (`InvalidRegex`, `EmptyRuleSet`, `Config`)
/// abort startup. `Lookup` is reported per event. Lifecycle misuse is
/// returned to the caller and never fatal.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// A rule pattern is not a valid regular expression
    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        /// Pattern text as written, including any `!` prefix
        pattern: String,
        /// Underlying regex compilation error
        #[source]
        source: regex::Error,
    },

    /// A filter was declared without primary rules
    #[error("Filter #{index} has no rules")]
    EmptyRuleSet {
        /// Position of the filter in the table
        index: usize,
    },

    /// A rule path could not be resolved in an event
    #[error("Lookup failure: {0}")]
    Lookup(#[from] LookupError),

    /// The watcher was started without an event handler
    #[error("Event handler is required to start the watcher")]
    CallbackRequired,

    /// The watcher is already running
    #[error("Watcher already started")]
    AlreadyStarted,

    /// The watcher is not running
    #[error("Watcher not started")]
    NotStarted,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Event source errors
    #[error("Event source error: {0}")]
    Source(String),

    /// Delivery errors
    #[error("Sink error: {0}")]
    Sink(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application-level operations
///
/// Uses `anyhow::Error` so that commands can attach context while
/// propagating typed errors from the engine.
pub type Result<T> = anyhow::Result<T>;
