//! Configuration management for k8s-event-watcher
//!
//! This module handles loading, parsing, validating, and dumping the
//! configuration from a YAML file with `K8SEW_*` environment overrides.
//!
//! ```yaml
//! filters:
//!   - rules:
//!       type: "Warning"
//!       reason: "BackoffLimitExceeded"
//!     errorRules:
//!       type: "^W.*"
//! sinceNow: true
//! webhooks:
//!   - url: "https://hooks.example.com/k8s"
//!     headers:
//!       Authorization: "Bearer abc"
//! ```

use crate::error::{Result, WatcherError};
use crate::filter::FilterTable;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "K8SEW_";

/// Placeholder for secrets in logged configuration.
const REDACTED: &str = "<redacted>";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Event filters and the `sinceNow` gate
    #[serde(flatten)]
    pub table: FilterTable,

    /// Webhooks every matched event is posted to
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,

    /// Webhook delivery policy
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A webhook endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint URL (http or https)
    pub url: String,

    /// Extra request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Webhook delivery policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// First retry delay in milliseconds; doubles on every retry
    #[serde(default = "default_retry_backoff_millis")]
    pub retry_backoff_millis: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDERR only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_backoff_millis() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            retry_backoff_millis: default_retry_backoff_millis(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl DeliveryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_millis)
    }
}

impl Config {
    /// Load configuration from file with environment overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed (including invalid
    /// rule patterns), or if validation fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path.as_ref())?;
        config.apply_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text without overrides or validation.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| WatcherError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WatcherError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&contents)
    }

    fn apply_env_vars(&mut self) {
        if let Some(since_now) = env_parse::<bool>("SINCE_NOW") {
            self.table.since_now = since_now;
        }

        if let Ok(level) = std::env::var("K8SEW_LOG_LEVEL") {
            tracing::debug!(level = %level, "Env override: K8SEW_LOG_LEVEL");
            self.logging.level = level;
        }

        if let Some(json_format) = env_parse::<bool>("JSON_LOGS") {
            self.logging.json_format = json_format;
        }

        if let Ok(log_file) = std::env::var("K8SEW_LOG_FILE") {
            tracing::debug!(log_file = %log_file, "Env override: K8SEW_LOG_FILE");
            self.logging.file_path = Some(PathBuf::from(log_file));
        }

        if let Some(max_retries) = env_parse::<u32>("MAX_RETRIES") {
            self.delivery.max_retries = max_retries;
        }

        if let Some(timeout) = env_parse::<u64>("WEBHOOK_TIMEOUT") {
            self.delivery.timeout_secs = timeout;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::EmptyRuleSet` for a filter without rules and
    /// `WatcherError::Config` for unusable webhook or delivery settings.
    pub fn validate(&self) -> Result<()> {
        self.table.validate()?;

        for (index, webhook) in self.webhooks.iter().enumerate() {
            validate_webhook(index, webhook)?;
        }

        if self.delivery.timeout_secs == 0 {
            return Err(WatcherError::Config(
                "delivery.timeoutSecs must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Copy of the configuration with every webhook header value masked,
    /// suitable for logging.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for webhook in &mut config.webhooks {
            for value in webhook.headers.values_mut() {
                *value = REDACTED.to_string();
            }
        }
        config
    }

    /// Serialize the validated configuration back to YAML for audit logs.
    pub fn dump(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn validate_webhook(index: usize, webhook: &WebhookConfig) -> Result<()> {
    let url = url::Url::parse(&webhook.url).map_err(|e| {
        WatcherError::Config(format!(
            "webhooks[{}]: invalid url '{}': {}",
            index, webhook.url, e
        ))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(WatcherError::Config(format!(
            "webhooks[{}]: unsupported url scheme '{}'",
            index,
            url.scheme()
        ))
        .into());
    }

    for (name, value) in &webhook.headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            WatcherError::Config(format!("webhooks[{}]: invalid header name '{}'", index, name))
        })?;
        HeaderValue::from_str(value).map_err(|_| {
            WatcherError::Config(format!(
                "webhooks[{}]: invalid value for header '{}'",
                index, name
            ))
        })?;
    }

    Ok(())
}

/// Read and parse `K8SEW_<suffix>`, warning about unparsable values.
fn env_parse<T: std::str::FromStr>(suffix: &str) -> Option<T> {
    let name = format!("{}{}", ENV_PREFIX, suffix);
    let raw = std::env::var(&name).ok()?;

    match raw.parse::<T>() {
        Ok(value) => {
            tracing::debug!(variable = %name, value = %raw, "Env override");
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Invalid value for {}: {}", name, raw);
            None
        }
    }
}
