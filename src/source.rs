//! Event sources feeding the watcher
//!
//! A source delivers [`KubeEvent`]s into a channel until its input ends or
//! it is cancelled. The bundled [`JsonStreamSource`] decodes a stream of
//! concatenated JSON documents, which is what
//! `kubectl get events --watch -o json` prints.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::WatcherError;
use crate::event::KubeEvent;

/// Size of each read from the underlying input.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A subscription that pushes events to the watcher.
///
/// `subscribe` runs until the input is exhausted, the receiver is dropped
/// or `cancel` fires. Reconnects and resyncs are the source's own business.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Deliver events into `sender` until done.
    async fn subscribe(
        &self,
        sender: mpsc::Sender<KubeEvent>,
        cancel: CancellationToken,
    ) -> Result<(), WatcherError>;
}

/// Where a [`JsonStreamSource`] reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamInput {
    /// Standard input
    Stdin,
    /// A file on disk
    File(PathBuf),
}

/// Source decoding concatenated JSON event documents.
///
/// Accepted documents:
/// - a bare `Event` object
/// - a watch envelope `{"type": "ADDED", "object": {...}}`; only `ADDED`
///   envelopes are forwarded
/// - a `List` object whose `items` are events
#[derive(Debug, Clone)]
pub struct JsonStreamSource {
    input: StreamInput,
}

impl JsonStreamSource {
    /// Read events from standard input.
    pub fn stdin() -> Self {
        Self {
            input: StreamInput::Stdin,
        }
    }

    /// Read events from a file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            input: StreamInput::File(path.into()),
        }
    }

    /// Interpret a CLI argument: `-` is stdin, anything else a file path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Self::stdin()
        } else {
            Self::from_path(arg)
        }
    }

    pub fn input(&self) -> &StreamInput {
        &self.input
    }
}

#[async_trait]
impl EventSource for JsonStreamSource {
    async fn subscribe(
        &self,
        sender: mpsc::Sender<KubeEvent>,
        cancel: CancellationToken,
    ) -> Result<(), WatcherError> {
        match &self.input {
            StreamInput::Stdin => {
                info!("Reading events from stdin");
                decode_stream(tokio::io::stdin(), sender, cancel).await
            }
            StreamInput::File(path) => {
                info!(path = %path.display(), "Reading events from file");
                let file = tokio::fs::File::open(path).await.map_err(|e| {
                    WatcherError::Source(format!("failed to open {}: {}", path.display(), e))
                })?;
                decode_stream(file, sender, cancel).await
            }
        }
    }
}

/// Decode concatenated JSON documents from `reader` and forward the events.
///
/// Documents that are valid JSON but not events are skipped with a warning.
/// A syntax error ends the stream, since the decoder cannot resynchronize.
pub async fn decode_stream<R>(
    mut reader: R,
    sender: mpsc::Sender<KubeEvent>,
    cancel: CancellationToken,
) -> Result<(), WatcherError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Event stream cancelled");
                return Ok(());
            }
            read = reader.read(&mut chunk) => read?,
        };

        let at_eof = read == 0;
        buffer.extend_from_slice(&chunk[..read]);

        let (documents, consumed, failure) = split_documents(&buffer);
        buffer.drain(..consumed);

        for document in documents {
            for event in events_from_document(document) {
                if sender.send(event).await.is_err() {
                    debug!("Event receiver dropped, ending stream");
                    return Ok(());
                }
            }
        }

        if let Some(e) = failure {
            error!(error = %e, "Malformed JSON in event stream");
            return Err(WatcherError::Source(format!("malformed event stream: {}", e)));
        }

        if at_eof {
            if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                warn!(
                    trailing_bytes = buffer.len(),
                    "Event stream ended inside a document"
                );
            }
            info!("Event stream ended");
            return Ok(());
        }
    }
}

/// Parse every complete document in `buffer`.
///
/// Returns the documents, how many bytes they used, and the syntax error
/// that stopped parsing, if any. An incomplete trailing document is not an
/// error; its bytes are left for the next read.
fn split_documents(buffer: &[u8]) -> (Vec<Value>, usize, Option<serde_json::Error>) {
    let mut documents = Vec::new();
    let mut stream = serde_json::Deserializer::from_slice(buffer).into_iter::<Value>();

    loop {
        let offset = stream.byte_offset();
        match stream.next() {
            Some(Ok(value)) => documents.push(value),
            Some(Err(e)) if e.is_eof() => return (documents, offset, None),
            Some(Err(e)) => return (documents, offset, Some(e)),
            None => return (documents, stream.byte_offset(), None),
        }
    }
}

/// Unwrap watch envelopes and lists into plain events.
fn events_from_document(document: Value) -> Vec<KubeEvent> {
    if let Some(items) = list_items(&document) {
        return items.iter().cloned().filter_map(decode_event).collect();
    }

    if let Some((change, object)) = watch_envelope(&document) {
        if change != "ADDED" {
            debug!(change = %change, "Ignoring non-ADDED watch notification");
            return Vec::new();
        }
        return decode_event(object.clone()).into_iter().collect();
    }

    decode_event(document).into_iter().collect()
}

fn list_items(document: &Value) -> Option<&Vec<Value>> {
    let kind = document.get("kind")?.as_str()?;
    if kind.ends_with("List") {
        document.get("items")?.as_array()
    } else {
        None
    }
}

fn watch_envelope(document: &Value) -> Option<(&str, &Value)> {
    let object = document.get("object").filter(|o| o.is_object())?;
    let change = document.get("type")?.as_str()?;
    Some((change, object))
}

fn decode_event(value: Value) -> Option<KubeEvent> {
    match serde_json::from_value::<KubeEvent>(value) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Skipping document that is not an event");
            None
        }
    }
}
