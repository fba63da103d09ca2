//! Webhook delivery of matched events
//!
//! Every match is serialized once as
//! `{"event": ..., "eventFilter": ..., "matchResult": ...}` and POSTed to
//! each configured webhook. Transport errors, `429` and `5xx` responses are
//! retried with exponential backoff; other responses are final.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{DeliveryConfig, WebhookConfig};
use crate::error::WatcherError;
use crate::event::KubeEvent;
use crate::filter::{EventFilter, MatchResult};
use crate::watcher::EventHandler;

/// Upper bound for a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Body posted to webhooks.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    pub event: &'a KubeEvent,
    pub event_filter: &'a EventFilter,
    pub match_result: &'a MatchResult,
}

/// Posts matched events to a list of webhooks.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    webhooks: Vec<WebhookConfig>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl WebhookSink {
    /// Build a sink with the delivery policy from `delivery`.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::Http` if the HTTP client cannot be built.
    pub fn new(webhooks: Vec<WebhookConfig>, delivery: &DeliveryConfig) -> Result<Self, WatcherError> {
        let client = Client::builder().timeout(delivery.timeout()).build()?;

        debug!(
            webhooks = webhooks.len(),
            max_retries = delivery.max_retries,
            timeout_secs = delivery.timeout_secs,
            "Webhook sink created"
        );

        Ok(Self {
            client,
            webhooks,
            max_retries: delivery.max_retries,
            retry_backoff: delivery.retry_backoff(),
        })
    }

    pub fn webhooks(&self) -> &[WebhookConfig] {
        &self.webhooks
    }

    /// Deliver `body` to one webhook, retrying transient failures.
    ///
    /// Returns the final HTTP status on a non-retryable or successful
    /// response.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::Sink` once every attempt has failed.
    pub async fn send(&self, webhook: &WebhookConfig, body: &[u8]) -> Result<StatusCode, WatcherError> {
        let attempts = self.max_retries + 1;
        let mut last_failure = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_backoff, attempt - 1);
                debug!(url = %webhook.url, attempt, delay_ms = delay.as_millis() as u64, "Retrying webhook");
                tokio::time::sleep(delay).await;
            }

            let mut request = self
                .client
                .post(&webhook.url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
            for (name, value) in &webhook.headers {
                request = request.header(name.as_str(), value.as_str());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let response_body = response.text().await.unwrap_or_default();

                    if is_retryable(status) {
                        warn!(
                            url = %webhook.url,
                            status_code = status.as_u16(),
                            attempt,
                            "Webhook returned retryable status"
                        );
                        last_failure = format!("status {}", status);
                        continue;
                    }

                    info!(
                        url = %webhook.url,
                        status_code = status.as_u16(),
                        response_body = %response_body,
                        "webhook sent"
                    );
                    return Ok(status);
                }
                Err(e) => {
                    warn!(url = %webhook.url, error = %e, attempt, "Webhook request failed");
                    last_failure = e.to_string();
                }
            }
        }

        Err(WatcherError::Sink(format!(
            "{} giving up after {} attempt(s): {}",
            webhook.url, attempts, last_failure
        )))
    }
}

#[async_trait]
impl EventHandler for WebhookSink {
    async fn on_event(&self, event: &KubeEvent, filter: &EventFilter, result: &MatchResult) {
        let payload = WebhookPayload {
            event,
            event_filter: filter,
            match_result: result,
        };

        info!(
            filter = %filter,
            matched_fields = ?result.matched_fields,
            matched_error_fields = ?result.matched_error_fields,
            "got event"
        );

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "failed to marshal event fields");
                return;
            }
        };

        for webhook in &self.webhooks {
            if let Err(e) = self.send(webhook, &body).await {
                error!(error = %e, "failed to send webhook request");
            }
        }
    }
}

/// Logs matches without delivering them anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSink;

#[async_trait]
impl EventHandler for DryRunSink {
    async fn on_event(&self, event: &KubeEvent, filter: &EventFilter, result: &MatchResult) {
        info!(
            event = %event.key(),
            filter = %filter,
            matched_fields = ?result.matched_fields,
            matched_error_fields = ?result.matched_error_fields,
            "got event (dry run)"
        );
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry number `retry` (zero-based): `base * 2^retry`, capped.
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}
