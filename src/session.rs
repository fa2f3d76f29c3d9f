//! Request-local conversation state.

use crate::llm::{Message, ToolCallRequest};
use crate::types::{SessionId, ToolResult};

/// History and iteration count for one chat request.
///
/// Owned by the task driving the request; dropped when it ends.
#[derive(Clone, Debug)]
pub struct Session {
    id: SessionId,
    messages: Vec<Message>,
    iteration_count: usize,
}

impl Session {
    /// Session seeded with the system prompt and the user's message.
    #[must_use]
    pub fn new(id: SessionId, system_prompt: &str, user_message: impl Into<String>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if !system_prompt.is_empty() {
            messages.push(Message::system(system_prompt));
        }
        messages.push(Message::user(user_message));
        Self {
            id,
            messages,
            iteration_count: 0,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Completed tool-execution rounds.
    #[must_use]
    pub const fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn push_assistant_text(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Append the assistant's tool requests followed by one tool message per
    /// result, and count the round. `results` must be in request order.
    pub fn record_round(
        &mut self,
        text: Option<String>,
        calls: Vec<ToolCallRequest>,
        results: &[ToolResult],
    ) {
        self.messages
            .push(Message::assistant_with_tool_calls(text, calls));
        self.messages.extend(
            results
                .iter()
                .map(|r| Message::tool_result(&r.tool_call_id, r.to_message_content())),
        );
        self.iteration_count += 1;
    }

    /// Ids of tool requests in the last assistant message without a reply.
    #[cfg(test)]
    pub(crate) fn unanswered_calls(&self) -> Vec<&str> {
        let Some(pos) = self
            .messages
            .iter()
            .rposition(|m| !m.tool_calls.is_empty())
        else {
            return Vec::new();
        };
        let answered: Vec<&str> = self.messages[pos + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        self.messages[pos]
            .tool_calls
            .iter()
            .map(|c| c.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }
}
