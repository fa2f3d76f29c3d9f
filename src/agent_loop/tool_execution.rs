use super::helpers::{millis_to_u64, send_event};
use super::types::TurnContext;
use crate::error::{ToolError, TurnError};
use crate::events::StreamEvent;
use crate::hooks::AgentHooks;
use crate::llm::ToolCallRequest;
use crate::tools::ToolInvocation;
use crate::types::ToolResult;
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

/// Run one invocation under the per-call timeout, turning a panic into an
/// upstream error.
async fn run_invocation(
    index: usize,
    invocation: ToolInvocation,
    timeout: Duration,
) -> (usize, Result<Value, ToolError>, u64) {
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, AssertUnwindSafe(invocation).catch_unwind())
        .await
    {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(ToolError::upstream(format!(
            "tool panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(ToolError::UpstreamTimeout(timeout)),
    };
    (index, result, millis_to_u64(started.elapsed().as_millis()))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Report a finished call and park its result in the request-order slot.
async fn record_result<P, H>(
    ctx: &TurnContext<P, H>,
    call: &ToolCallRequest,
    result: ToolResult,
    slot: &mut Option<ToolResult>,
) -> Result<(), TurnError>
where
    H: AgentHooks,
{
    let event = StreamEvent::tool_result(&result);
    send_event(&ctx.tx, &ctx.hooks, &ctx.seq, &ctx.cancel, event).await?;
    ctx.hooks.post_tool_use(&call.name, &result).await;
    *slot = Some(result);
    Ok(())
}

/// Execute every tool call of one model response concurrently.
///
/// `tool_call` events go out in request order before anything runs; each
/// `tool_result` event follows its own call's completion. Calls that fail to
/// resolve or validate never start. The returned results are in request
/// order, one per call.
///
/// # Errors
/// Returns [`TurnError::Cancelled`] when the turn is cancelled while calls are
/// in flight, or when the consumer stops taking events. Running calls are
/// dropped and finished results discarded.
pub(super) async fn execute_tool_calls<P, H>(
    ctx: &TurnContext<P, H>,
    calls: &[ToolCallRequest],
) -> Result<Vec<ToolResult>, TurnError>
where
    H: AgentHooks,
{
    for call in calls {
        send_event(&ctx.tx, &ctx.hooks, &ctx.seq, &ctx.cancel, StreamEvent::tool_call(call))
            .await?;
    }

    let mut slots: Vec<Option<ToolResult>> = vec![None; calls.len()];
    let mut running = FuturesUnordered::new();

    for (index, call) in calls.iter().enumerate() {
        match ctx.tools.prepare(&call.name, &call.arguments) {
            Ok(invocation) => {
                log::debug!("Dispatching tool call id={} name={}", call.id, call.name);
                running.push(run_invocation(index, invocation, ctx.config.tool_timeout));
            }
            Err(error) => {
                log::warn!(
                    "Rejected tool call id={} name={} kind={} error={error}",
                    call.id,
                    call.name,
                    error.kind()
                );
                let result = ToolResult::error(&call.id, &error).with_duration(0);
                record_result(ctx, call, result, &mut slots[index]).await?;
            }
        }
    }

    while !running.is_empty() {
        let next = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                log::warn!("Turn cancelled, dropping in-flight tool calls count={}", running.len());
                return Err(TurnError::Cancelled);
            }
            next = running.next() => next,
        };
        let Some((index, result, duration_ms)) = next else {
            break;
        };
        let call = &calls[index];
        match &result {
            Ok(_) => log::debug!(
                "Tool call finished id={} name={} duration_ms={duration_ms}",
                call.id,
                call.name
            ),
            Err(error) => log::warn!(
                "Tool call failed id={} name={} kind={} duration_ms={duration_ms} error={error}",
                call.id,
                call.name,
                error.kind()
            ),
        }
        let result = ToolResult::from_result(&call.id, result).with_duration(duration_ms);
        record_result(ctx, call, result, &mut slots[index]).await?;
    }

    Ok(slots.into_iter().flatten().collect())
}
