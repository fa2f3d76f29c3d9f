//! Server-sent-event encoding of a turn's event channel.
//!
//! [`StreamEncoder`] turns envelopes into SSE frames and enforces the
//! terminal rule: nothing follows `done` or `error`, and a stream that ends
//! without either gets a synthesised `internal` error. [`sse_stream`] wires
//! the encoder to an axum response and cancels the turn when the response is
//! dropped.

use crate::events::{StreamEvent, StreamEventEnvelope};
use axum::response::sse::Event;
use futures::Stream;
use std::convert::Infallible;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One rendered SSE frame: `event: <name>`, `id: <sequence>`, `data: <json>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedEvent {
    pub name: &'static str,
    pub id: u64,
    pub data: String,
}

impl From<EncodedEvent> for Event {
    fn from(frame: EncodedEvent) -> Self {
        Self::default()
            .event(frame.name)
            .id(frame.id.to_string())
            .data(frame.data)
    }
}

/// Stateful renderer for one response stream.
#[derive(Debug, Default)]
pub struct StreamEncoder {
    terminated: bool,
    next_sequence: u64,
}

impl StreamEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal frame has been produced.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Render `envelope`, or `None` once the stream has terminated.
    pub fn encode(&mut self, envelope: &StreamEventEnvelope) -> Option<EncodedEvent> {
        if self.terminated {
            log::warn!(
                "Dropping event after terminal event type={} sequence={}",
                envelope.event.event_type(),
                envelope.sequence
            );
            return None;
        }
        self.terminated = envelope.event.is_terminal();
        self.next_sequence = envelope.sequence.saturating_add(1);

        let data = serde_json::to_string(envelope).unwrap_or_else(|e| {
            log::error!("Failed to serialize stream event: {e}");
            serde_json::json!({
                "type": "error",
                "kind": "internal",
                "message": "unserializable event",
            })
            .to_string()
        });
        Some(EncodedEvent {
            name: envelope.event.event_type(),
            id: envelope.sequence,
            data,
        })
    }

    /// Close the stream; yields an `internal` error if no terminal frame was
    /// produced.
    pub fn finish(&mut self) -> Option<EncodedEvent> {
        if self.terminated {
            return None;
        }
        log::error!("Event stream ended without a terminal event");
        let envelope = StreamEventEnvelope {
            event_id: uuid::Uuid::new_v4(),
            sequence: self.next_sequence,
            timestamp: OffsetDateTime::now_utc(),
            event: StreamEvent::internal("stream ended without a result"),
        };
        self.encode(&envelope)
    }
}

/// Adapt a turn's event channel into SSE events.
///
/// The stream owns a drop guard on `cancel`, so dropping it (the client went
/// away) cancels the turn.
pub fn sse_stream(
    mut events: mpsc::Receiver<StreamEventEnvelope>,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    async_stream::stream! {
        let _guard = cancel.drop_guard();
        let mut encoder = StreamEncoder::new();

        while let Some(envelope) = events.recv().await {
            if let Some(frame) = encoder.encode(&envelope) {
                yield Ok(frame.into());
            }
            if encoder.is_terminated() {
                break;
            }
        }
        if let Some(frame) = encoder.finish() {
            yield Ok(frame.into());
        }
    }
}
