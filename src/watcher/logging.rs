//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file output.
//! Log lines go to STDERR so that command output on STDOUT stays parseable.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
///
/// Returns an error if the level is not a valid filter directive, the log
/// file cannot be opened, or a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use k8s_event_watcher::config::LoggingConfig;
/// use k8s_event_watcher::watcher::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     json_format: true,
///     file_path: None,
/// };
///
/// let result = init_logging(&config);
/// assert!(result.is_ok());
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    if config.json_format {
        let stderr_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr);

        match file {
            Some(file) => {
                let file_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(file);
                registry.with(stderr_layer).with(file_layer).try_init()?;
            }
            None => registry.with(stderr_layer).try_init()?,
        }
    } else {
        let stderr_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);

        match file {
            Some(file) => {
                let file_layer = fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(false)
                    .with_writer(file);
                registry.with(stderr_layer).with(file_layer).try_init()?;
            }
            None => registry.with(stderr_layer).try_init()?,
        }
    }

    Ok(())
}

/// Subscriber used while the configuration itself is being loaded.
///
/// Writes plain text to STDERR at `warn` (`debug` when `verbose`), unless
/// `RUST_LOG` says otherwise. Install it with
/// [`tracing::subscriber::with_default`] around `Config::load`.
pub fn bootstrap_subscriber(verbose: bool) -> Result<impl Subscriber + Send + Sync> {
    let level = if verbose { "debug" } else { "warn" };
    Ok(tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level)?)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish())
}

/// `RUST_LOG` if set, the configured level otherwise.
fn build_env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}
