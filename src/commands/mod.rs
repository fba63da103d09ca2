/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `watch`: Run the watcher over an event stream
- `check`: Validate and dump the configuration
- `classify`: The `match` subcommand, classify a single event file

These handlers are intentionally small and use the library components:
the filter engine, the watcher and the sinks.
*/

use crate::config::Config;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

// Watch command handler
pub mod watch {
    //! Watcher mode handler.
    //!
    //! Builds the event source and the sink, starts the watcher and waits
    //! for a shutdown signal or the end of the event stream.

    use super::*;
    use crate::sink::{DryRunSink, WebhookSink};
    use crate::source::JsonStreamSource;
    use crate::watcher::{EventHandler, Watcher};

    /// Options of the `watch` subcommand
    #[derive(Debug, Clone, Default)]
    pub struct WatchOptions {
        /// Event stream (`-` for stdin)
        pub events: String,
        /// Override for `delivery.maxRetries`
        pub max_retries: Option<u32>,
        /// Override for `delivery.timeoutSecs`
        pub webhook_timeout: Option<u64>,
        /// Log matches instead of posting them
        pub dry_run: bool,
    }

    /// Run the watcher until interrupted or the event stream ends
    ///
    /// # Errors
    ///
    /// Returns error if the watcher or the webhook client cannot be created,
    /// or if the event stream cannot be opened or is malformed.
    pub async fn run_watch(mut config: Config, options: WatchOptions) -> Result<()> {
        if let Some(max_retries) = options.max_retries {
            config.delivery.max_retries = max_retries;
        }
        if let Some(timeout) = options.webhook_timeout {
            config.delivery.timeout_secs = timeout;
        }
        config.validate()?;

        let source = Arc::new(JsonStreamSource::from_arg(&options.events));
        let watcher = Watcher::new(config.table.clone(), source)?;

        let handler: Arc<dyn EventHandler> = if options.dry_run {
            tracing::info!("Dry-run mode enabled: matches are only logged");
            Arc::new(DryRunSink)
        } else if config.webhooks.is_empty() {
            tracing::warn!("No webhooks configured: matches are only logged");
            Arc::new(DryRunSink)
        } else {
            Arc::new(WebhookSink::new(config.webhooks.clone(), &config.delivery)?)
        };

        watcher.start(Some(handler))?;

        tracing::info!(
            launch_time = %watcher.launch_time(),
            config = %config.redacted().dump()?,
            "started"
        );

        tokio::select! {
            _ = shutdown_signal() => tracing::debug!("Shutdown signal received"),
            _ = watcher.closed() => tracing::debug!("Event stream finished"),
        }

        tracing::info!("exiting");
        watcher.shutdown().await?;

        Ok(())
    }

    #[cfg(unix)]
    async fn shutdown_signal() {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    async fn shutdown_signal() {
        let _ = tokio::signal::ctrl_c().await;
    }
}

// Check command handler
pub mod check {
    //! Configuration check handler.

    use super::*;

    /// Render the validated configuration as YAML
    ///
    /// `Config::load` has already validated it; validation runs again so
    /// the command is safe to call on a hand-built `Config`.
    pub fn run_check(config: &Config) -> Result<String> {
        config.validate()?;
        config.dump()
    }
}

// Single event classification handler
pub mod classify {
    //! Offline classification of one event file.

    use super::*;
    use crate::event::KubeEvent;
    use crate::filter::{EventFilter, MatchResult};
    use serde::Serialize;

    /// JSON report printed by the `match` subcommand
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MatchReport {
        /// Whether any filter matched
        pub matched: bool,
        /// Position of the matching filter in the table
        #[serde(skip_serializing_if = "Option::is_none")]
        pub filter_index: Option<usize>,
        /// `path=pattern` description of the matching filter
        #[serde(skip_serializing_if = "Option::is_none")]
        pub filter_description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub event_filter: Option<EventFilter>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub match_result: Option<MatchResult>,
    }

    /// Classify the event stored at `path`
    ///
    /// The `sinceNow` gate does not apply: the event is classified as if it
    /// had just been received.
    ///
    /// # Errors
    ///
    /// Returns error if the file is not an event or a rule path cannot be
    /// resolved in it.
    pub fn run_classify(config: &Config, path: &Path) -> Result<MatchReport> {
        let contents = std::fs::read_to_string(path)?;
        let event: KubeEvent = serde_json::from_str(&contents)?;
        let record = event.to_record()?;

        let report = match config.table.matching_event_filter(&record)? {
            Some((filter, result)) => MatchReport {
                matched: true,
                filter_index: config
                    .table
                    .filters
                    .iter()
                    .position(|candidate| std::ptr::eq(candidate, filter)),
                filter_description: Some(filter.to_string()),
                event_filter: Some(filter.clone()),
                match_result: Some(result),
            },
            None => MatchReport {
                matched: false,
                filter_index: None,
                filter_description: None,
                event_filter: None,
                match_result: None,
            },
        };

        Ok(report)
    }
}
