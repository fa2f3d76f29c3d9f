use crate::error::TurnError;
use crate::events::{SequenceCounter, StreamEventEnvelope};
use crate::session::Session;
use crate::tools::ToolRegistry;
use crate::types::AgentConfig;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Everything one running turn needs, shared by the model and tool phases.
pub(super) struct TurnContext<P, H> {
    pub(super) provider: Arc<P>,
    pub(super) tools: Arc<ToolRegistry>,
    pub(super) hooks: Arc<H>,
    pub(super) config: AgentConfig,
    pub(super) tx: mpsc::Sender<StreamEventEnvelope>,
    pub(super) seq: SequenceCounter,
    pub(super) cancel: CancellationToken,
}

/// Failure of a single streamed model call.
#[derive(Debug)]
pub(super) enum StreamError {
    /// Transient and nothing reached the client yet; worth another attempt
    Recoverable(String),
    Fatal(String),
    Cancelled,
}

/// How a turn ended, together with the history it built.
#[derive(Debug)]
pub struct TurnOutcome {
    pub result: Result<(), TurnError>,
    pub session: Session,
}

/// Handles to a turn running in the background.
///
/// `events` yields the stream in emission order and ends after the terminal
/// event. `outcome` resolves once the turn task has finished.
#[derive(Debug)]
pub struct AgentRun {
    pub events: mpsc::Receiver<StreamEventEnvelope>,
    pub outcome: oneshot::Receiver<TurnOutcome>,
}
