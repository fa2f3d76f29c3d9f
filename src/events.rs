//! Stream events for real-time delivery to the client.
//!
//! The [`StreamEvent`] enum represents everything a client sees while a turn
//! runs. Events travel from the agent loop to the stream encoder over a
//! bounded channel, each wrapped in a [`StreamEventEnvelope`].
//!
//! # Event Flow
//!
//! A typical event sequence looks like:
//! 1. `Token` - Answer fragments, forwarded as the model produces them
//! 2. `ToolCall` / `ToolResult` - One pair per tool call request
//! 3. `Done` on success, or `Error` on failure; exactly one of them, last

use crate::error::{TerminalErrorKind, ToolErrorKind, TurnError};
use crate::llm::ToolCallRequest;
use crate::types::{SessionId, ToolResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;

/// Maximum length of the payload rendering carried by `tool_result` events.
pub const SUMMARY_MAX_CHARS: usize = 500;

/// Events emitted by the agent loop during execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A fragment of the answer text
    Token { text: String },

    /// The model requested a tool call; emitted before it runs
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },

    /// A tool call finished
    ToolResult {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_kind: Option<ToolErrorKind>,
        summary: String,
    },

    /// The turn completed with a final answer
    Done {
        session_id: SessionId,
        iterations: usize,
        duration_ms: u64,
    },

    /// The turn stopped without a final answer
    Error {
        kind: TerminalErrorKind,
        message: String,
    },
}

impl StreamEvent {
    #[must_use]
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    #[must_use]
    pub fn tool_call(request: &ToolCallRequest) -> Self {
        Self::ToolCall {
            id: request.id.clone(),
            name: request.name.clone(),
            arguments: request.arguments.clone(),
        }
    }

    #[must_use]
    pub fn tool_result(result: &ToolResult) -> Self {
        Self::ToolResult {
            id: result.tool_call_id.clone(),
            error_kind: result.error_kind(),
            summary: result.summary(SUMMARY_MAX_CHARS),
        }
    }

    #[must_use]
    pub fn error(error: &TurnError) -> Self {
        Self::Error {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Error reported when the loop ended without a terminal event.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Error {
            kind: TerminalErrorKind::Internal,
            message: message.into(),
        }
    }

    /// The `type` discriminator, also used as the SSE event name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// `done` and `error` end the stream.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

/// Thread-safe monotonic sequence counter for event envelopes.
///
/// Each agent run creates one counter, shared by everything that emits into
/// that run's channel.
#[derive(Clone, Debug)]
pub struct SequenceCounter(Arc<AtomicU64>);

impl SequenceCounter {
    /// Create a new counter starting at 0.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    /// Get the next sequence number, incrementing the counter.
    #[must_use]
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Envelope wrapping every [`StreamEvent`] with ordering metadata.
///
/// The `event` field is flattened in JSON so that `event_id`, `sequence`,
/// `timestamp`, and the event's `type` discriminant all appear at the same level.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamEventEnvelope {
    /// Unique identifier (UUID v4) for this event emission.
    pub event_id: uuid::Uuid,
    /// Monotonically increasing sequence number within a single run.
    pub sequence: u64,
    /// UTC timestamp of when the event was emitted.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// The actual event payload.
    #[serde(flatten)]
    pub event: StreamEvent,
}

impl StreamEventEnvelope {
    /// Wrap a [`StreamEvent`] in an envelope, assigning it a unique ID,
    /// the next sequence number, and the current UTC timestamp.
    #[must_use]
    pub fn wrap(event: StreamEvent, seq: &SequenceCounter) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4(),
            sequence: seq.next(),
            timestamp: OffsetDateTime::now_utc(),
            event,
        }
    }
}
