//! The tool-calling loop.
//!
//! [`AgentLoop::run`] spawns one task per chat request. The task alternates
//! streamed model calls with concurrent tool rounds and reports progress as
//! [`StreamEventEnvelope`](crate::events::StreamEventEnvelope)s on a bounded
//! channel. The caller's [`CancellationToken`] stops the task at the next
//! suspension point; the request deadline cancels the same token.

mod builder;
mod helpers;
mod llm;
mod run_loop;
mod tool_execution;
mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::AgentLoopBuilder;
pub use types::{AgentRun, TurnOutcome};

use crate::events::SequenceCounter;
use crate::hooks::{AgentHooks, DefaultHooks};
use crate::llm::LlmProvider;
use crate::session::Session;
use crate::tools::ToolRegistry;
use crate::types::{AgentConfig, SessionId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use types::TurnContext;

/// Orchestrates model calls and tool execution for chat requests.
///
/// Cheap to share: every request gets its own session, channel and task, and
/// nothing is carried over between requests.
pub struct AgentLoop<P, H>
where
    P: LlmProvider,
    H: AgentHooks,
{
    pub(crate) provider: Arc<P>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) hooks: Arc<H>,
    pub(crate) config: AgentConfig,
}

/// Create a new builder for constructing an [`AgentLoop`].
#[must_use]
pub fn builder() -> AgentLoopBuilder<(), DefaultHooks> {
    AgentLoopBuilder::new()
}

impl<P, H> AgentLoop<P, H>
where
    P: LlmProvider + 'static,
    H: AgentHooks + 'static,
{
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Start a turn for `user_message` in the background.
    ///
    /// Events arrive on [`AgentRun::events`]. Cancelling `cancel` (for
    /// example when the client disconnects) stops the turn; so does the
    /// configured request timeout.
    #[must_use]
    pub fn run(
        &self,
        session_id: SessionId,
        user_message: String,
        cancel: CancellationToken,
    ) -> AgentRun {
        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let ctx = TurnContext {
            provider: Arc::clone(&self.provider),
            tools: Arc::clone(&self.tools),
            hooks: Arc::clone(&self.hooks),
            config: self.config.clone(),
            tx,
            seq: SequenceCounter::new(),
            cancel,
        };

        tokio::spawn(async move {
            let mut session = Session::new(session_id, &ctx.config.system_prompt, user_message);
            log::info!(
                "Turn started session_id={} model={} tools={}",
                session.id(),
                ctx.provider.model(),
                ctx.tools.len()
            );

            let deadline = ctx.config.request_timeout;
            let watchdog_token = ctx.cancel.clone();
            let watchdog_session = session.id().clone();
            let watchdog = tokio::spawn(async move {
                tokio::select! {
                    () = watchdog_token.cancelled() => {}
                    () = tokio::time::sleep(deadline) => {
                        log::warn!(
                            "Request deadline exceeded session_id={watchdog_session} timeout_ms={}",
                            deadline.as_millis()
                        );
                        watchdog_token.cancel();
                    }
                }
            });

            let result = run_loop::run_turn(&ctx, &mut session).await;
            watchdog.abort();

            if outcome_tx.send(TurnOutcome { result, session }).is_err() {
                log::debug!("Turn outcome dropped, no receiver");
            }
        });

        AgentRun {
            events: rx,
            outcome: outcome_rx,
        }
    }
}
