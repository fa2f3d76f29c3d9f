use super::helpers::{millis_to_u64, send_event};
use super::llm::call_llm_streaming;
use super::tool_execution::execute_tool_calls;
use super::types::TurnContext;
use crate::error::TurnError;
use crate::events::StreamEvent;
use crate::hooks::AgentHooks;
use crate::llm::{ChatRequest, LlmProvider};
use crate::session::Session;
use std::time::Instant;

/// Drive a turn to its end and emit exactly one terminal event.
///
/// A cancelled turn whose consumer is already gone emits nothing.
pub(super) async fn run_turn<P, H>(
    ctx: &TurnContext<P, H>,
    session: &mut Session,
) -> Result<(), TurnError>
where
    P: LlmProvider,
    H: AgentHooks,
{
    let started = Instant::now();
    let result = tool_loop(ctx, session).await;
    let duration_ms = millis_to_u64(started.elapsed().as_millis());

    match &result {
        Ok(()) => {
            log::info!(
                "Turn complete session_id={} iterations={} duration_ms={duration_ms}",
                session.id(),
                session.iteration_count()
            );
            let done = StreamEvent::Done {
                session_id: session.id().clone(),
                iterations: session.iteration_count(),
                duration_ms,
            };
            if send_event(&ctx.tx, &ctx.hooks, &ctx.seq, &ctx.cancel, done)
                .await
                .is_err()
            {
                log::warn!("Done event not delivered session_id={}", session.id());
            }
        }
        Err(error) => {
            log::warn!(
                "Turn ended without answer session_id={} kind={:?} iterations={} duration_ms={duration_ms} error={error}",
                session.id(),
                error.kind(),
                session.iteration_count()
            );
            ctx.hooks.on_error(error).await;
            if matches!(error, TurnError::Cancelled) && ctx.tx.is_closed() {
                log::debug!("Consumer gone, skipping terminal event session_id={}", session.id());
            } else {
                let event = StreamEvent::error(error);
                if send_event(&ctx.tx, &ctx.hooks, &ctx.seq, &ctx.cancel, event)
                    .await
                    .is_err()
                {
                    log::debug!("Error event not delivered session_id={}", session.id());
                }
            }
        }
    }

    result
}

/// Alternate model calls and tool rounds until the model answers in text.
///
/// Every tool request in the history is answered before the next model call.
/// A model that still wants tools after `max_iterations` rounds ends the turn
/// with [`TurnError::LoopLimitExceeded`]; that last request is not recorded.
async fn tool_loop<P, H>(ctx: &TurnContext<P, H>, session: &mut Session) -> Result<(), TurnError>
where
    P: LlmProvider,
    H: AgentHooks,
{
    let definitions = ctx.tools.definitions();
    let tools = (!definitions.is_empty()).then_some(definitions);

    loop {
        let request = ChatRequest {
            messages: session.messages().to_vec(),
            tools: tools.clone(),
            max_tokens: ctx.config.max_tokens,
        };
        log::debug!(
            "Calling model session_id={} iteration={} messages={}",
            session.id(),
            session.iteration_count(),
            request.messages.len()
        );

        let response = call_llm_streaming(ctx, &request).await?;

        if !response.has_tool_calls() {
            session.push_assistant_text(response.text.unwrap_or_default());
            return Ok(());
        }

        if session.iteration_count() >= ctx.config.max_iterations {
            log::warn!(
                "Tool loop limit reached session_id={} limit={} requested={}",
                session.id(),
                ctx.config.max_iterations,
                response.tool_calls.len()
            );
            return Err(TurnError::LoopLimitExceeded {
                limit: ctx.config.max_iterations,
            });
        }

        let results = execute_tool_calls(ctx, &response.tool_calls).await?;
        session.record_round(response.text, response.tool_calls, &results);
    }
}
