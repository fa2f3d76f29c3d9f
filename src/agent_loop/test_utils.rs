use crate::error::ToolError;
use crate::events::{StreamEvent, StreamEventEnvelope};
use crate::llm::{ChatRequest, LlmProvider, Message, StopReason, StreamBox, StreamDelta};
use crate::tools::{Tool, ToolName};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ===================
// Mock LLM Provider
// ===================

type Script = Box<dyn Fn(usize) -> Vec<StreamDelta> + Send + Sync>;

/// Streams one scripted response per call; the n-th call gets `script(n)`.
pub struct MockProvider {
    script: Script,
    delay: Option<Duration>,
    call_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Replay `responses` in order, then answer "Done." forever.
    pub fn new(responses: Vec<Vec<StreamDelta>>) -> Self {
        Self::from_fn(move |n| {
            responses
                .get(n)
                .cloned()
                .unwrap_or_else(|| Self::text_response("Done."))
        })
    }

    pub fn from_fn(script: impl Fn(usize) -> Vec<StreamDelta> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            delay: None,
            call_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep before every delta.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }

    /// Histories sent to the model, one entry per call.
    pub fn request_log(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        Arc::clone(&self.requests)
    }

    /// Text split into word fragments, ending the turn.
    pub fn text_response(text: &str) -> Vec<StreamDelta> {
        let mut deltas: Vec<StreamDelta> = text
            .split_inclusive(' ')
            .map(|word| StreamDelta::TextDelta {
                delta: word.to_string(),
            })
            .collect();
        deltas.push(StreamDelta::Done {
            stop_reason: Some(StopReason::EndTurn),
        });
        deltas
    }

    pub fn tool_use_response(id: &str, name: &str, arguments: Value) -> Vec<StreamDelta> {
        Self::tool_uses_response(vec![(id, name, arguments)])
    }

    pub fn tool_uses_response(calls: Vec<(&str, &str, Value)>) -> Vec<StreamDelta> {
        let mut deltas = Vec::new();
        for (index, (id, name, arguments)) in calls.into_iter().enumerate() {
            deltas.push(StreamDelta::ToolUseStart {
                id: id.to_string(),
                name: name.to_string(),
                index,
            });
            deltas.push(StreamDelta::ToolInputDelta {
                index,
                delta: arguments.to_string(),
            });
        }
        deltas.push(StreamDelta::Done {
            stop_reason: Some(StopReason::ToolUse),
        });
        deltas
    }

    pub fn error_response(message: &str, recoverable: bool) -> Vec<StreamDelta> {
        vec![StreamDelta::Error {
            message: message.to_string(),
            recoverable,
        }]
    }
}

impl LlmProvider for MockProvider {
    fn chat_stream(&self, request: ChatRequest) -> StreamBox<'_> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.messages);
        }
        let deltas = (self.script)(n);
        let delay = self.delay;
        Box::pin(async_stream::stream! {
            for delta in deltas {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(delta);
            }
        })
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn provider(&self) -> &'static str {
        "mock"
    }
}

// ===================
// Scripted Tools
// ===================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestToolName {
    Alpha,
    Bravo,
    Charlie,
    Slow,
    Flaky,
    Panicky,
}

impl ToolName for TestToolName {}

#[derive(Clone)]
enum Behavior {
    Echo,
    Fail(ToolError),
    Panic,
}

/// Tool that sleeps, then echoes its `message` argument, fails or panics.
///
/// `started` counts executions that began; `finished` those that ran to
/// the end without being dropped.
pub struct ScriptedTool {
    name: TestToolName,
    delay: Duration,
    behavior: Behavior,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
}

impl ScriptedTool {
    pub fn new(name: TestToolName) -> Self {
        Self {
            name,
            delay: Duration::ZERO,
            behavior: Behavior::Echo,
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, error: ToolError) -> Self {
        self.behavior = Behavior::Fail(error);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn started(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.started)
    }

    pub fn finished(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.finished)
    }
}

impl Tool for ScriptedTool {
    type Name = TestToolName;
    type Args = String;

    fn name(&self) -> TestToolName {
        self.name
    }

    fn description(&self) -> &'static str {
        "Scripted test tool"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "message": { "type": "string" } },
            "required": ["message"]
        })
    }

    fn validate(&self, input: &Value) -> Result<String, ToolError> {
        input
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ToolError::validation("message", "must be a string"))
    }

    async fn execute(&self, message: String) -> Result<Value, ToolError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let outcome = match &self.behavior {
            Behavior::Echo => Ok(json!({ "echo": message })),
            Behavior::Fail(error) => Err(error.clone()),
            Behavior::Panic => panic!("scripted tool blew up"),
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

// ===================
// Event helpers
// ===================

/// Collect every event until the channel closes.
pub async fn drain_events(rx: &mut mpsc::Receiver<StreamEventEnvelope>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(envelope) = rx.recv().await {
        events.push(envelope.event);
    }
    events
}

pub fn tool_result_ids(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolResult { id, .. } => Some(id.clone()),
            _ => None,
        })
        .collect()
}

pub fn terminal_count(events: &[StreamEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}
