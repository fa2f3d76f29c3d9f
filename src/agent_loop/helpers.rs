use crate::error::TurnError;
use crate::events::{SequenceCounter, StreamEvent, StreamEventEnvelope};
use crate::hooks::AgentHooks;
use crate::types::RetryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How long a full event channel may block the loop before the turn is cancelled.
const EVENT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Convert u128 milliseconds to u64, capping at `u64::MAX`
#[allow(clippy::cast_possible_truncation)]
pub(super) const fn millis_to_u64(millis: u128) -> u64 {
    if millis > u64::MAX as u128 {
        u64::MAX
    } else {
        millis as u64
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// Uses `base * 2^(attempt-1) + jitter`, capped at the maximum delay. Jitter
/// is bounded by the base delay and by one second.
pub(super) fn calculate_backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = config
        .base_delay_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(63));

    let max_jitter = config.base_delay_ms.min(1000);
    let jitter = if max_jitter > 0 {
        u64::from(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos(),
        ) % max_jitter
    } else {
        0
    };

    let delay_ms = base_delay.saturating_add(jitter).min(config.max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Send an event to the consumer channel.
///
/// Calls the hook's `on_event` first, then tries a non-blocking send. A full
/// channel waits for space until the turn is cancelled or
/// [`EVENT_SEND_TIMEOUT`] passes. Events are never dropped while the turn goes
/// on: a consumer that is gone or stalled ends the turn.
///
/// # Errors
/// Returns [`TurnError::Cancelled`] if the event was not delivered. A stalled
/// consumer also cancels `cancel`.
pub(super) async fn send_event<H>(
    tx: &mpsc::Sender<StreamEventEnvelope>,
    hooks: &Arc<H>,
    seq: &SequenceCounter,
    cancel: &CancellationToken,
    event: StreamEvent,
) -> Result<(), TurnError>
where
    H: AgentHooks,
{
    hooks.on_event(&event).await;

    let envelope = StreamEventEnvelope::wrap(event, seq);

    match tx.try_send(envelope) {
        Ok(()) => Ok(()),
        Err(mpsc::error::TrySendError::Full(envelope)) => {
            log::debug!("Event channel full, waiting for consumer...");
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    log::debug!("Turn cancelled while waiting for consumer");
                    Err(TurnError::Cancelled)
                }
                sent = tokio::time::timeout(EVENT_SEND_TIMEOUT, tx.send(envelope)) => match sent {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(_)) => {
                        log::warn!("Event channel closed while sending - consumer disconnected");
                        Err(TurnError::Cancelled)
                    }
                    Err(_) => {
                        log::error!(
                            "Consumer stalled, cancelling turn timeout_secs={}",
                            EVENT_SEND_TIMEOUT.as_secs()
                        );
                        cancel.cancel();
                        Err(TurnError::Cancelled)
                    }
                },
            }
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            log::debug!("Event channel closed - consumer disconnected");
            Err(TurnError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::DefaultHooks;

    #[test]
    fn backoff_grows_and_is_capped() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        };
        let first = calculate_backoff_delay(1, &config);
        let second = calculate_backoff_delay(2, &config);
        assert!(first >= Duration::from_millis(100) && first < Duration::from_millis(200));
        assert!(second >= Duration::from_millis(200) && second < Duration::from_millis(300));
        assert_eq!(calculate_backoff_delay(10, &config), Duration::from_millis(1_000));
    }

    #[test]
    fn backoff_without_base_is_zero() {
        assert_eq!(
            calculate_backoff_delay(3, &RetryConfig::no_retry()),
            Duration::ZERO
        );
    }

    #[test]
    fn huge_attempts_do_not_overflow() {
        let delay = calculate_backoff_delay(u32::MAX, &RetryConfig::default());
        assert_eq!(delay, Duration::from_millis(RetryConfig::default().max_delay_ms));
    }

    #[test]
    fn millis_saturate() {
        assert_eq!(millis_to_u64(42), 42);
        assert_eq!(millis_to_u64(u128::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn send_to_closed_channel_reports_cancelled() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let seq = SequenceCounter::new();
        let result = send_event(
            &tx,
            &Arc::new(DefaultHooks),
            &seq,
            &CancellationToken::new(),
            StreamEvent::token("x"),
        )
        .await;
        assert_eq!(result, Err(TurnError::Cancelled));
        assert_eq!(seq.next(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_channel_yields_to_cancellation() {
        let (tx, _rx) = mpsc::channel(1);
        let hooks = Arc::new(DefaultHooks);
        let seq = SequenceCounter::new();
        let cancel = CancellationToken::new();
        send_event(&tx, &hooks, &seq, &cancel, StreamEvent::token("a"))
            .await
            .unwrap();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let result = send_event(&tx, &hooks, &seq, &cancel, StreamEvent::token("b")).await;
        assert_eq!(result, Err(TurnError::Cancelled));
        assert!(started.elapsed() < EVENT_SEND_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_consumer_cancels_the_turn() {
        let (tx, _rx) = mpsc::channel(1);
        let hooks = Arc::new(DefaultHooks);
        let seq = SequenceCounter::new();
        let cancel = CancellationToken::new();
        send_event(&tx, &hooks, &seq, &cancel, StreamEvent::token("a"))
            .await
            .unwrap();

        let result = send_event(&tx, &hooks, &seq, &cancel, StreamEvent::token("b")).await;
        assert_eq!(result, Err(TurnError::Cancelled));
        assert!(cancel.is_cancelled());
    }
}
