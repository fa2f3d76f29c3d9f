use super::helpers::{calculate_backoff_delay, send_event};
use super::types::{StreamError, TurnContext};
use crate::error::TurnError;
use crate::events::StreamEvent;
use crate::hooks::AgentHooks;
use crate::llm::{ChatRequest, ChatResponse, LlmProvider, StreamAccumulator, StreamDelta};
use futures::StreamExt;

/// Consume one streamed model call, forwarding text fragments as they arrive.
///
/// Once a fragment has reached the client, any later failure is fatal: a
/// retry would repeat text the client already has.
async fn process_stream<P, H>(
    ctx: &TurnContext<P, H>,
    request: ChatRequest,
) -> Result<ChatResponse, StreamError>
where
    P: LlmProvider,
    H: AgentHooks,
{
    let mut stream = ctx.provider.chat_stream(request);
    let mut accumulator = StreamAccumulator::new();
    let mut forwarded = 0usize;

    let fail = |message: String, recoverable: bool, forwarded: usize| {
        if recoverable && forwarded == 0 {
            StreamError::Recoverable(message)
        } else {
            StreamError::Fatal(message)
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(StreamError::Cancelled),
            next = stream.next() => next,
        };
        let Some(item) = next else { break };

        match item {
            Ok(StreamDelta::Error {
                message,
                recoverable,
            }) => return Err(fail(message, recoverable, forwarded)),
            Ok(delta) => {
                match &delta {
                    StreamDelta::TextDelta { delta: text } if !text.is_empty() => {
                        forwarded += 1;
                        let token = StreamEvent::token(text.clone());
                        if send_event(&ctx.tx, &ctx.hooks, &ctx.seq, &ctx.cancel, token)
                            .await
                            .is_err()
                        {
                            return Err(StreamError::Cancelled);
                        }
                    }
                    _ => {}
                }
                accumulator.apply(&delta);
            }
            Err(e) => return Err(fail(format!("stream error: {e}"), true, forwarded)),
        }
    }

    log::debug!(
        "Model stream finished fragments={forwarded} stop_reason={:?}",
        accumulator.stop_reason()
    );
    Ok(accumulator.into_response(ctx.provider.model()))
}

/// Call the model, retrying transient failures with backoff.
///
/// Retries only happen while no fragment of the failed attempt reached the
/// client. Cancellation is observed during streaming and during backoff.
pub(super) async fn call_llm_streaming<P, H>(
    ctx: &TurnContext<P, H>,
    request: &ChatRequest,
) -> Result<ChatResponse, TurnError>
where
    P: LlmProvider,
    H: AgentHooks,
{
    let max_retries = ctx.config.retry.max_retries;
    let mut attempt = 0u32;

    loop {
        match process_stream(ctx, request.clone()).await {
            Ok(response) => return Ok(response),
            Err(StreamError::Cancelled) => return Err(TurnError::Cancelled),
            Err(StreamError::Recoverable(message)) if attempt < max_retries => {
                attempt += 1;
                let delay = calculate_backoff_delay(attempt, &ctx.config.retry);
                log::warn!(
                    "Transient model error, retrying attempt={attempt} max_retries={max_retries} delay_ms={} provider={} error={message}",
                    delay.as_millis(),
                    ctx.provider.provider()
                );
                tokio::select! {
                    biased;
                    () = ctx.cancel.cancelled() => return Err(TurnError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(StreamError::Recoverable(message) | StreamError::Fatal(message)) => {
                log::error!(
                    "Model call failed attempts={} provider={} model={} error={message}",
                    attempt + 1,
                    ctx.provider.provider(),
                    ctx.provider.model()
                );
                return Err(TurnError::Model(message));
            }
        }
    }
}
