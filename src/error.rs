//! Error taxonomy for tool calls and turns.
//!
//! Errors fall into two groups:
//!
//! - [`ToolError`] - recovered locally. Every tool failure becomes a
//!   [`ToolResult`](crate::ToolResult) that the model sees and can react to.
//! - [`TurnError`] - terminal. Ends the request with exactly one `error`
//!   stream event.
//!
//! [`ConfigurationError`] is raised while wiring the registry, before any
//! request is served.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Discriminator for a failed tool call, surfaced in `ToolResult` payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    ValidationError,
    UnknownToolError,
    UpstreamTimeout,
    UpstreamError,
}

impl ToolErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::UnknownToolError => "unknown_tool_error",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::UpstreamError => "upstream_error",
        }
    }
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single tool call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Arguments are missing, mistyped, or outside the tool's domain.
    #[error("invalid argument `{field}`: {reason}")]
    Validation { field: String, reason: String },

    /// The model asked for a tool that is not registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The tool (or its data source) did not answer in time.
    #[error("upstream timed out after {}ms", .0.as_millis())]
    UpstreamTimeout(Duration),

    /// The data source returned a fault or malformed data.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl ToolError {
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ToolErrorKind {
        match self {
            Self::Validation { .. } => ToolErrorKind::ValidationError,
            Self::UnknownTool(_) => ToolErrorKind::UnknownToolError,
            Self::UpstreamTimeout(_) => ToolErrorKind::UpstreamTimeout,
            Self::Upstream(_) => ToolErrorKind::UpstreamError,
        }
    }
}

/// Raised while building the tool registry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("tool `{0}` is already registered")]
    DuplicateTool(String),

    /// The tool's name did not serialize to a plain string.
    #[error("tool name does not serialize to a string")]
    InvalidToolName,
}

/// Discriminator for a terminal stream error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalErrorKind {
    ModelError,
    LoopLimitExceeded,
    Cancelled,
    /// The engine stopped without reporting an outcome.
    Internal,
}

/// Reason a turn stopped before producing a final answer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    /// The model provider failed; not recoverable within the request.
    #[error("model error: {0}")]
    Model(String),

    /// The model kept requesting tools past the iteration bound.
    #[error("tool loop exceeded the limit of {limit} iterations")]
    LoopLimitExceeded { limit: usize },

    /// The client went away or the request deadline passed.
    #[error("request cancelled")]
    Cancelled,
}

impl TurnError {
    #[must_use]
    pub const fn kind(&self) -> TerminalErrorKind {
        match self {
            Self::Model(_) => TerminalErrorKind::ModelError,
            Self::LoopLimitExceeded { .. } => TerminalErrorKind::LoopLimitExceeded,
            Self::Cancelled => TerminalErrorKind::Cancelled,
        }
    }
}
