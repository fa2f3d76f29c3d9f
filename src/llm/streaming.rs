//! Streaming types for LLM responses.
//!
//! This module provides types for handling streaming responses from LLM providers.
//! The [`StreamDelta`] enum represents individual events in a streaming response,
//! and [`StreamAccumulator`] helps collect these events into a final response.

use crate::llm::{ChatResponse, StopReason, ToolCallRequest};
use futures::Stream;
use std::pin::Pin;

/// Events yielded during streaming LLM responses.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    /// A text fragment to append to the answer.
    TextDelta { delta: String },

    /// Start of a tool call (id and name are known).
    ToolUseStart {
        /// Unique identifier for this tool call
        id: String,
        /// Name of the tool being called
        name: String,
        /// Position of the call within the response
        index: usize,
    },

    /// Incremental JSON for tool arguments (partial/incomplete JSON).
    ToolInputDelta {
        /// Position of the call this fragment belongs to
        index: usize,
        /// JSON fragment to append
        delta: String,
    },

    /// Stream completed with stop reason.
    Done { stop_reason: Option<StopReason> },

    /// Error during streaming.
    Error {
        message: String,
        /// Whether retrying the request may succeed (rate limit, 5xx)
        recoverable: bool,
    },
}

/// Type alias for a boxed stream of stream deltas.
pub type StreamBox<'a> = Pin<Box<dyn Stream<Item = anyhow::Result<StreamDelta>> + Send + 'a>>;

/// Helper to accumulate streamed content into a final response.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    tool_uses: Vec<ToolUseAccumulator>,
    stop_reason: Option<StopReason>,
}

/// Accumulator for a single tool call during streaming.
#[derive(Debug, Default)]
struct ToolUseAccumulator {
    id: String,
    name: String,
    input_json: String,
    index: usize,
}

impl StreamAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a stream delta to the accumulator.
    pub fn apply(&mut self, delta: &StreamDelta) {
        match delta {
            StreamDelta::TextDelta { delta } => self.text.push_str(delta),
            StreamDelta::ToolUseStart { id, name, index } => {
                self.tool_uses.push(ToolUseAccumulator {
                    id: id.clone(),
                    name: name.clone(),
                    input_json: String::new(),
                    index: *index,
                });
            }
            StreamDelta::ToolInputDelta { index, delta } => {
                if let Some(tool) = self.tool_uses.iter_mut().rev().find(|t| t.index == *index) {
                    tool.input_json.push_str(delta);
                }
            }
            StreamDelta::Done { stop_reason } => {
                self.stop_reason = *stop_reason;
            }
            StreamDelta::Error { .. } => {}
        }
    }

    #[must_use]
    pub const fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    /// Convert accumulated content into a [`ChatResponse`].
    ///
    /// Tool argument JSON is parsed at this point. Empty arguments become an
    /// empty object; unparseable arguments are kept as a raw string so the
    /// validator can reject them with a field-level message.
    #[must_use]
    pub fn into_response(self, model: impl Into<String>) -> ChatResponse {
        let mut tool_uses = self.tool_uses;
        tool_uses.sort_by_key(|t| t.index);

        let tool_calls = tool_uses
            .into_iter()
            .map(|tool| {
                let arguments = if tool.input_json.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&tool.input_json)
                        .unwrap_or(serde_json::Value::String(tool.input_json))
                };
                ToolCallRequest {
                    id: tool.id,
                    name: tool.name,
                    arguments,
                }
            })
            .collect();

        ChatResponse {
            text: (!self.text.is_empty()).then_some(self.text),
            tool_calls,
            model: model.into(),
            stop_reason: self.stop_reason,
        }
    }
}
