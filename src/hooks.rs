//! Agent lifecycle hooks for customization.
//!
//! Hooks let callers observe the agent at key points:
//!
//! - [`AgentHooks::post_tool_use`] - React to tool completion
//! - [`AgentHooks::on_event`] - Log or process events
//! - [`AgentHooks::on_error`] - Observe turns that end without an answer
//!
//! # Built-in Implementations
//!
//! - [`DefaultHooks`] - No-op
//! - [`LoggingHooks`] - Debug logging for all events

use crate::error::TurnError;
use crate::events::StreamEvent;
use crate::types::ToolResult;
use async_trait::async_trait;

/// Lifecycle hooks for the agent loop.
/// Implement this trait to customize agent behavior.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Called after a tool call completes, in completion order.
    async fn post_tool_use(&self, _tool_name: &str, _result: &ToolResult) {
        // Default: no-op
    }

    /// Called for every event, before it is sent to the client.
    async fn on_event(&self, _event: &StreamEvent) {
        // Default: no-op
    }

    /// Called once when a turn ends with a terminal error.
    async fn on_error(&self, _error: &TurnError) {
        // Default: no-op
    }
}

/// Default hooks implementation that does nothing
pub struct DefaultHooks;

#[async_trait]
impl AgentHooks for DefaultHooks {}

/// Hooks that log all events (useful for debugging)
pub struct LoggingHooks;

#[async_trait]
impl AgentHooks for LoggingHooks {
    async fn post_tool_use(&self, tool_name: &str, result: &ToolResult) {
        log::debug!(
            "Post-tool use tool={tool_name} id={} success={} duration_ms={:?}",
            result.tool_call_id,
            result.is_success(),
            result.duration_ms
        );
    }

    async fn on_event(&self, event: &StreamEvent) {
        log::debug!("Agent event {event:?}");
    }

    async fn on_error(&self, error: &TurnError) {
        log::error!("Agent error kind={:?} error={error}", error.kind());
    }
}
