//! Delivery of matched events
//!
//! - [`webhook`]: HTTP webhooks with retries, plus a dry-run sink

pub mod webhook;

pub use webhook::{DryRunSink, WebhookPayload, WebhookSink};
