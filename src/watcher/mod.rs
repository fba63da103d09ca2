//! Watcher module for consuming events and dispatching matches
//!
//! # Overview
//!
//! The watcher is the lifecycle controller around the classification engine:
//! 1. Subscribes to an [`EventSource`](crate::source::EventSource)
//! 2. Applies the `sinceNow` admission gate
//! 3. Normalizes each event and selects the first matching filter
//! 4. Invokes the registered [`EventHandler`] with the match evidence
//!
//! # Modules
//!
//! - [`watcher`]: Start/stop lifecycle and per-event dispatch
//! - [`logging`]: Structured logging configuration

pub mod logging;
#[allow(clippy::module_inception)]
pub mod watcher;

pub use watcher::{EventHandler, Outcome, Watcher};
