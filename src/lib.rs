//! k8s-event-watcher - Kubernetes event classification library
//!
//! This library classifies Kubernetes events against declarative
//! regular-expression filters and hands every match to a handler,
//! typically a webhook sink.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `filter`: Patterns, path resolution, rule sets, event filters and the filter table
//! - `event`: The Kubernetes `Event` model and its projection into a record
//! - `source`: Event sources feeding the watcher
//! - `watcher`: Lifecycle controller that classifies incoming events
//! - `sink`: Webhook delivery of matched events
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use k8s_event_watcher::{Config, KubeEvent};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let event: KubeEvent = serde_json::from_str(r#"{"reason": "BackOff"}"#)?;
//!
//!     if let Some((filter, result)) = config.table.matching_event_filter(&event.to_record()?)? {
//!         println!("{} matched {:?}", filter, result.matched_fields);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod sink;
pub mod source;
pub mod watcher;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, WatcherError};
pub use event::KubeEvent;
pub use filter::{EventFilter, FilterTable, LookupError, MatchResult, Pattern, Record, RuleSet};
pub use source::{EventSource, JsonStreamSource};
pub use watcher::{EventHandler, Outcome, Watcher};
