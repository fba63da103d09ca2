//! Watcher lifecycle controller
//!
//! This module provides the service that:
//! 1. Subscribes to an event source
//! 2. Drops events older than the launch time when `sinceNow` is set
//! 3. Normalizes each event and selects the first matching filter
//! 4. Hands matches to the registered [`EventHandler`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument, Span};

use crate::error::WatcherError;
use crate::event::KubeEvent;
use crate::filter::{EventFilter, FilterTable, MatchResult};
use crate::source::EventSource;

/// Capacity of the channel between the source and the dispatch loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Receiver of matched events.
///
/// Called from the dispatch loop, one event at a time. Implementations own
/// their timeout and retry policy and must not fail the watcher.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event that matched `filter`.
    async fn on_event(&self, event: &KubeEvent, filter: &EventFilter, result: &MatchResult);
}

/// What happened to a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Created before the watcher launched while `sinceNow` is set
    DiscardedOld,
    /// No filter matched
    Discarded,
    /// A filter matched and the handler was invoked
    Matched,
    /// The event could not be normalized or a rule path could not be resolved
    Failed(String),
}

/// Main watcher service.
///
/// The filter table is validated at construction and shared read-only with
/// the dispatch loop. Start and stop transitions are serialized by a mutex.
///
/// # Example
///
/// ```rust,no_run
/// use k8s_event_watcher::filter::FilterTable;
/// use k8s_event_watcher::sink::DryRunSink;
/// use k8s_event_watcher::source::JsonStreamSource;
/// use k8s_event_watcher::watcher::Watcher;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let watcher = Watcher::new(FilterTable::default(), Arc::new(JsonStreamSource::stdin()))?;
/// watcher.start(Some(Arc::new(DryRunSink)))?;
/// watcher.closed().await;
/// watcher.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Watcher {
    table: Arc<FilterTable>,
    source: Arc<dyn EventSource>,
    launch_time: DateTime<Utc>,
    span: Span,
    state: Mutex<Option<Running>>,
}

struct Running {
    cancel: CancellationToken,
    done: CancellationToken,
    source_task: JoinHandle<Result<(), WatcherError>>,
    dispatch_task: JoinHandle<()>,
}

impl Running {
    /// Cancel and wait for both tasks, returning the source's outcome.
    async fn join(self) -> Result<(), WatcherError> {
        self.cancel.cancel();

        if let Err(e) = self.dispatch_task.await {
            error!(error = %e, "Dispatch task ended abnormally");
        }

        match self.source_task.await {
            Ok(result) => result,
            Err(e) => Err(WatcherError::Source(format!("event source task failed: {}", e))),
        }
    }
}

impl Watcher {
    /// Create a watcher over `source`, launched now.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::EmptyRuleSet` if any filter has no rules.
    pub fn new(table: FilterTable, source: Arc<dyn EventSource>) -> Result<Self, WatcherError> {
        Self::with_launch_time(table, source, Utc::now())
    }

    /// Create a watcher with an explicit launch time.
    pub fn with_launch_time(
        table: FilterTable,
        source: Arc<dyn EventSource>,
        launch_time: DateTime<Utc>,
    ) -> Result<Self, WatcherError> {
        table.validate()?;

        debug!(
            filters = table.filters.len(),
            since_now = table.since_now,
            "Watcher created"
        );

        Ok(Self {
            table: Arc::new(table),
            source,
            launch_time,
            span: tracing::info_span!("k8s_event_watcher"),
            state: Mutex::new(None),
        })
    }

    /// Parent span for every per-event span this watcher emits.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn launch_time(&self) -> DateTime<Utc> {
        self.launch_time
    }

    pub fn table(&self) -> &FilterTable {
        &self.table
    }

    /// Whether the dispatch loop is still consuming events.
    ///
    /// Becomes false as soon as the source ends on its own, even before
    /// [`Watcher::shutdown`] collects its result.
    pub fn is_running(&self) -> bool {
        self.lock_state()
            .as_ref()
            .is_some_and(|running| !running.done.is_cancelled())
    }

    /// Start consuming the source and dispatching matches to `handler`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// A watcher whose source already ended can be started again; the
    /// finished subscription's result is discarded.
    ///
    /// # Errors
    ///
    /// Returns `WatcherError::CallbackRequired` if `handler` is `None` and
    /// `WatcherError::AlreadyStarted` if the watcher is running.
    pub fn start(&self, handler: Option<Arc<dyn EventHandler>>) -> Result<(), WatcherError> {
        let handler = handler.ok_or(WatcherError::CallbackRequired)?;

        let mut state = self.lock_state();
        if let Some(running) = state.as_ref() {
            if !running.done.is_cancelled() {
                return Err(WatcherError::AlreadyStarted);
            }
            debug!("Replacing finished subscription");
        }

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let source = self.source.clone();
        let source_cancel = cancel.clone();
        let source_task = tokio::spawn(
            async move {
                let result = source.subscribe(sender, source_cancel).await;
                if let Err(e) = &result {
                    error!(error = %e, "Event source failed");
                }
                result
            }
            .instrument(self.span.clone()),
        );

        let dispatcher = Dispatcher {
            table: self.table.clone(),
            launch_time: self.launch_time,
            span: self.span.clone(),
        };
        let dispatch_task = tokio::spawn(dispatcher.run(
            receiver,
            handler,
            cancel.clone(),
            done.clone(),
        ));

        *state = Some(Running {
            cancel,
            done,
            source_task,
            dispatch_task,
        });

        info!(launch_time = %self.launch_time, "Watcher started");
        Ok(())
    }

    /// Signal the subscription to end. Does nothing if already stopped.
    pub fn stop(&self) {
        if let Some(running) = self.lock_state().take() {
            running.cancel.cancel();
            info!("Watcher stopped");
        }
    }

    /// Stop and wait for the source and dispatch tasks to finish.
    ///
    /// Returns `Ok(())` when not running.
    ///
    /// # Errors
    ///
    /// Returns the error the event source ended with, e.g.
    /// `WatcherError::Source` for an unreadable or malformed stream.
    pub async fn shutdown(&self) -> Result<(), WatcherError> {
        let running = self.lock_state().take();
        match running {
            Some(running) => {
                let result = running.join().await;
                info!("Watcher stopped");
                result
            }
            None => Ok(()),
        }
    }

    /// Resolve once the dispatch loop has ended, either because the source
    /// ran dry or because the watcher was stopped. Returns immediately when
    /// not running.
    pub async fn closed(&self) {
        let done = self.lock_state().as_ref().map(|running| running.done.clone());
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    /// Run one event through the admission gate, the filters and `handler`.
    pub async fn process(&self, event: &KubeEvent, handler: &dyn EventHandler) -> Outcome {
        let dispatcher = Dispatcher {
            table: self.table.clone(),
            launch_time: self.launch_time,
            span: self.span.clone(),
        };
        dispatcher.process(event, handler).await
    }

    fn lock_state(&self) -> MutexGuard<'_, Option<Running>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The per-event pipeline shared with the dispatch task.
#[derive(Clone)]
struct Dispatcher {
    table: Arc<FilterTable>,
    launch_time: DateTime<Utc>,
    span: Span,
}

impl Dispatcher {
    async fn run(
        self,
        mut receiver: mpsc::Receiver<KubeEvent>,
        handler: Arc<dyn EventHandler>,
        cancel: CancellationToken,
        done: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = receiver.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            self.process(&event, handler.as_ref()).await;
        }

        debug!("Dispatch loop ended");
        done.cancel();
    }

    async fn process(&self, event: &KubeEvent, handler: &dyn EventHandler) -> Outcome {
        let span = tracing::info_span!(
            parent: &self.span,
            "handle_event",
            event = %event.key(),
            reason = %event.reason,
            involved_object = %event.involved_object.name,
        );

        self.classify_and_dispatch(event, handler)
            .instrument(span)
            .await
    }

    async fn classify_and_dispatch(&self, event: &KubeEvent, handler: &dyn EventHandler) -> Outcome {
        if self.table.since_now && event.created_before(self.launch_time) {
            debug!("discarded old event");
            return Outcome::DiscardedOld;
        }

        let record = match event.to_record() {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "failed to cast event to map");
                return Outcome::Failed(e.to_string());
            }
        };

        match self.table.matching_event_filter(&record) {
            Ok(Some((filter, result))) => {
                debug!(filter = %filter, "matched event");
                handler.on_event(event, filter, &result).await;
                Outcome::Matched
            }
            Ok(None) => {
                debug!("discarded event");
                Outcome::Discarded
            }
            Err(e) => {
                error!(error = %e, "failed to find matching event filter");
                Outcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Pattern, RuleSet};
    use chrono::Duration;

    struct NoopHandler;

    #[async_trait]
    impl EventHandler for NoopHandler {
        async fn on_event(&self, _: &KubeEvent, _: &EventFilter, _: &MatchResult) {}
    }

    struct SilentSource;

    #[async_trait]
    impl EventSource for SilentSource {
        async fn subscribe(
            &self,
            _sender: mpsc::Sender<KubeEvent>,
            cancel: CancellationToken,
        ) -> Result<(), WatcherError> {
            cancel.cancelled().await;
            Ok(())
        }
    }

    fn table() -> FilterTable {
        FilterTable::new(vec![EventFilter::new(
            RuleSet::new().with_rule("type", Pattern::compile("Warning").unwrap()),
        )])
    }

    fn warning(created: Option<DateTime<Utc>>) -> KubeEvent {
        let mut event = KubeEvent::default();
        event.event_type = "Warning".to_string();
        event.metadata.creation_timestamp = created;
        event
    }

    #[test]
    fn test_new_rejects_invalid_table() {
        let table = FilterTable::new(vec![EventFilter::default()]);
        let result = Watcher::new(table, Arc::new(SilentSource));
        assert!(matches!(result, Err(WatcherError::EmptyRuleSet { index: 0 })));
    }

    #[tokio::test]
    async fn test_start_requires_handler() {
        let watcher = Watcher::new(table(), Arc::new(SilentSource)).unwrap();
        assert!(matches!(
            watcher.start(None),
            Err(WatcherError::CallbackRequired)
        ));
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_double_start_and_idempotent_stop() {
        let watcher = Watcher::new(table(), Arc::new(SilentSource)).unwrap();

        watcher.start(Some(Arc::new(NoopHandler))).unwrap();
        assert!(watcher.is_running());
        assert!(matches!(
            watcher.start(Some(Arc::new(NoopHandler))),
            Err(WatcherError::AlreadyStarted)
        ));

        watcher.stop();
        assert!(!watcher.is_running());
        watcher.stop();
        assert!(!watcher.is_running());

        // Restart after stop is allowed
        watcher.start(Some(Arc::new(NoopHandler))).unwrap();
        watcher.shutdown().await.unwrap();
        assert!(!watcher.is_running());
    }

    #[tokio::test]
    async fn test_since_now_gate() {
        let launch = Utc::now();
        let watcher = Watcher::with_launch_time(
            table().with_since_now(true),
            Arc::new(SilentSource),
            launch,
        )
        .unwrap();

        let old = warning(Some(launch - Duration::seconds(5)));
        let fresh = warning(Some(launch + Duration::seconds(5)));
        let undated = warning(None);

        assert_eq!(watcher.process(&old, &NoopHandler).await, Outcome::DiscardedOld);
        assert_eq!(watcher.process(&undated, &NoopHandler).await, Outcome::DiscardedOld);
        assert_eq!(watcher.process(&fresh, &NoopHandler).await, Outcome::Matched);
    }

    #[tokio::test]
    async fn test_old_events_pass_without_since_now() {
        let launch = Utc::now();
        let watcher =
            Watcher::with_launch_time(table(), Arc::new(SilentSource), launch).unwrap();
        let old = warning(Some(launch - Duration::hours(1)));
        assert_eq!(watcher.process(&old, &NoopHandler).await, Outcome::Matched);
    }

    #[tokio::test]
    async fn test_process_reports_lookup_failure() {
        let table = FilterTable::new(vec![EventFilter::new(
            RuleSet::new().with_rule("metadata.labels.team", Pattern::compile("x").unwrap()),
        )]);
        let watcher = Watcher::new(table, Arc::new(SilentSource)).unwrap();

        let outcome = watcher.process(&warning(None), &NoopHandler).await;
        assert!(matches!(outcome, Outcome::Failed(message) if message.contains("metadata.labels.team")));
    }

    #[tokio::test]
    async fn test_closed_returns_when_not_running() {
        let watcher = Watcher::new(table(), Arc::new(SilentSource)).unwrap();
        watcher.closed().await;
    }
}
