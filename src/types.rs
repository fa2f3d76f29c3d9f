//! Core types shared across the agent.
//!
//! - [`SessionId`]: Identifier used to correlate one chat request in logs and events
//! - [`AgentConfig`]: Policy constants for the tool-calling loop
//! - [`RetryConfig`]: Backoff policy for transient model failures
//! - [`ToolResult`]: Outcome of one tool call, correlated by call id

use crate::error::{ToolError, ToolErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a stock analysis assistant. You have the \
ability to get real-time stock prices, historical stock prices (given a date range), news, \
balance sheet data, company information, dividend history, and financial statements for \
publicly traded companies using the provided tools. Use these tools to provide accurate and \
up-to-date information about stocks when responding to user queries.";

/// Identifier for one chat request.
///
/// Clients may pass their own thread id; it is only used for correlation and
/// never to look up earlier history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the agent loop
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum number of tool-execution rounds per request. A model that asks
    /// for tools once more after this many rounds ends the request with
    /// `loop_limit_exceeded`.
    pub max_iterations: usize,
    /// Per-call timeout for a single tool invocation
    pub tool_timeout: Duration,
    /// Overall deadline for one request, model calls and tools included
    pub request_timeout: Duration,
    /// Maximum tokens per model response
    pub max_tokens: u32,
    /// System prompt seeded into every session
    pub system_prompt: String,
    /// Retry configuration for transient model errors
    pub retry: RetryConfig,
    /// Capacity of the engine-to-encoder event channel
    pub event_buffer: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 6,
            tool_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            max_tokens: 4096,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retry: RetryConfig::default(),
            event_buffer: 128,
        }
    }
}

/// Configuration for retry behavior on transient model errors.
///
/// A retry only happens when the failed attempt forwarded no fragment to the
/// client, so a retried response never duplicates text.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryConfig {
    /// Create a retry config with no retries (for testing)
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Create a retry config with fast retries (for testing)
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 5,
            max_delay_ms: 20,
        }
    }
}

/// Success payload or typed failure of one tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success {
        payload: serde_json::Value,
    },
    Error {
        error_kind: ToolErrorKind,
        message: String,
    },
}

/// Result of a tool execution. Exactly one exists per tool call request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the request this result answers
    pub tool_call_id: String,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
    /// Duration of the tool execution in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ToolResult {
    #[must_use]
    pub fn success(tool_call_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: ToolOutcome::Success { payload },
            duration_ms: None,
        }
    }

    #[must_use]
    pub fn error(tool_call_id: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: ToolOutcome::Error {
                error_kind: error.kind(),
                message: error.to_string(),
            },
            duration_ms: None,
        }
    }

    #[must_use]
    pub fn from_result(
        tool_call_id: impl Into<String>,
        result: Result<serde_json::Value, ToolError>,
    ) -> Self {
        match result {
            Ok(payload) => Self::success(tool_call_id, payload),
            Err(error) => Self::error(tool_call_id, &error),
        }
    }

    #[must_use]
    pub const fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    #[must_use]
    pub const fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.outcome {
            ToolOutcome::Success { .. } => None,
            ToolOutcome::Error { error_kind, .. } => Some(*error_kind),
        }
    }

    /// Content of the tool-role message fed back to the model.
    #[must_use]
    pub fn to_message_content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success { payload } => payload.to_string(),
            ToolOutcome::Error {
                error_kind,
                message,
            } => serde_json::json!({ "error": error_kind, "message": message }).to_string(),
        }
    }

    /// Short rendering for the client stream, at most `max_chars` characters.
    #[must_use]
    pub fn summary(&self, max_chars: usize) -> String {
        let full = match &self.outcome {
            ToolOutcome::Success { payload } => payload.to_string(),
            ToolOutcome::Error {
                error_kind,
                message,
            } => format!("{error_kind}: {message}"),
        };
        truncate_chars(&full, max_chars)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}…", &text[..cut]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_config_matches_documented_policy() {
        let config = AgentConfig::default();
        assert_eq!(config.max_iterations, 6);
        assert_eq!(config.tool_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(config.system_prompt.contains("stock analysis assistant"));
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
        assert_eq!(SessionId::from_string("thread-1").to_string(), "thread-1");
    }

    #[test]
    fn error_result_carries_kind_and_message() {
        let result = ToolResult::error("call_1", &ToolError::UnknownTool("nope".into()));
        assert!(!result.is_success());
        assert_eq!(result.error_kind(), Some(ToolErrorKind::UnknownToolError));

        let content: serde_json::Value =
            serde_json::from_str(&result.to_message_content()).unwrap();
        assert_eq!(content["error"], "unknown_tool_error");
        assert_eq!(content["message"], "unknown tool: nope");
    }

    #[test]
    fn success_result_serializes_flat() {
        let result = ToolResult::success("call_1", json!({"price": 12.5})).with_duration(42);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["tool_call_id"], "call_1");
        assert_eq!(value["status"], "success");
        assert_eq!(value["payload"]["price"], 12.5);
        assert_eq!(value["duration_ms"], 42);
    }

    #[test]
    fn summary_is_bounded() {
        let result = ToolResult::success("call_1", json!({"text": "x".repeat(1000)}));
        let summary = result.summary(50);
        assert_eq!(summary.chars().count(), 51);
        assert!(summary.ends_with('…'));

        let short = ToolResult::success("call_2", json!(1));
        assert_eq!(short.summary(50), "1");
    }
}
