//! `OpenAI` Chat Completions provider with streaming.
//!
//! Works against any `OpenAI`-compatible endpoint (Thesys, Ollama, vLLM, ...)
//! via [`OpenAIProvider::with_base_url`].

use crate::llm::{ChatRequest, LlmProvider, Message, Role, StopReason, StreamBox, StreamDelta};
use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `OpenAI` LLM provider using the streaming Chat Completions API.
#[derive(Clone)]
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new `OpenAI` provider with the specified API key and model.
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_owned())
    }

    /// Create a new provider with a custom base URL for OpenAI-compatible APIs.
    #[must_use]
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl LlmProvider for OpenAIProvider {
    fn chat_stream(&self, request: ChatRequest) -> StreamBox<'_> {
        Box::pin(async_stream::stream! {
            let messages = build_api_messages(&request.messages);
            let tools: Option<Vec<ApiTool>> = request
                .tools
                .map(|ts| ts.into_iter().map(convert_tool).collect());

            let api_request = ApiChatRequest {
                model: &self.model,
                messages: &messages,
                max_completion_tokens: Some(request.max_tokens),
                tools: tools.as_deref(),
                stream: true,
            };

            log::debug!(
                "OpenAI streaming request model={} messages={} max_tokens={}",
                self.model,
                messages.len(),
                request.max_tokens
            );

            let response = match self
                .client
                .post(self.endpoint())
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&api_request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    // Connection failures are transient from the caller's view.
                    yield Ok(StreamDelta::Error {
                        message: format!("request failed: {e}"),
                        recoverable: true,
                    });
                    return;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                yield Ok(StreamDelta::Error {
                    message: "Rate limited".to_string(),
                    recoverable: true,
                });
                return;
            }

            if status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                log::error!("OpenAI server error status={status} body={body}");
                yield Ok(StreamDelta::Error {
                    message: format!("server error {status}: {body}"),
                    recoverable: true,
                });
                return;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                log::warn!("OpenAI client error status={status} body={body}");
                yield Ok(StreamDelta::Error {
                    message: format!("request rejected {status}: {body}"),
                    recoverable: false,
                });
                return;
            }

            let mut stream = response.bytes_stream();
            let mut lines = LineBuffer::default();
            let mut parser = ChunkParser::default();

            while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        log::error!("Stream error while reading chunk error={e}");
                        yield Err(anyhow::anyhow!("stream error: {e}"));
                        return;
                    }
                };
                lines.extend(&chunk);

                while let Some(line) = lines.next_line() {
                    for delta in parser.parse_line(&line) {
                        yield Ok(delta);
                    }
                    if parser.finished {
                        return;
                    }
                }
            }

            for delta in parser.parse_line(lines.remainder().trim()) {
                yield Ok(delta);
            }

            if !parser.finished {
                log::warn!("OpenAI stream ended without a finish marker");
                yield Ok(StreamDelta::Error {
                    message: "Stream ended unexpectedly without completion".to_string(),
                    recoverable: true,
                });
            }
        })
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}

/// Splits raw body bytes into lines.
///
/// Bytes are only decoded once a full line has arrived, so a multi-byte
/// character split across network chunks survives intact.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete line without its `\n` or `\r\n` terminator.
    fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whatever is left once the body has ended.
    fn remainder(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Incremental decoder for the `data:` lines of a chat-completions stream.
#[derive(Debug, Default)]
struct ChunkParser {
    stop_reason: Option<StopReason>,
    finished: bool,
}

impl ChunkParser {
    fn parse_line(&mut self, line: &str) -> Vec<StreamDelta> {
        let Some(data) = line.strip_prefix("data:") else {
            // Comments, `event:` lines and blank separators carry nothing.
            return Vec::new();
        };
        let data = data.trim();
        if data.is_empty() {
            return Vec::new();
        }

        if data == "[DONE]" {
            self.finished = true;
            return vec![StreamDelta::Done {
                stop_reason: self.stop_reason.take(),
            }];
        }

        match serde_json::from_str::<ApiStreamChunk>(data) {
            Ok(chunk) => self.apply_chunk(chunk),
            Err(e) => {
                log::warn!("Failed to parse stream chunk error={e} data={data}");
                Vec::new()
            }
        }
    }

    fn apply_chunk(&mut self, chunk: ApiStreamChunk) -> Vec<StreamDelta> {
        if let Some(error) = chunk.error {
            self.finished = true;
            return vec![StreamDelta::Error {
                message: error.message,
                recoverable: false,
            }];
        }

        let mut deltas = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                deltas.push(StreamDelta::TextDelta { delta: text });
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                let function = call.function.unwrap_or_default();
                if let Some(id) = call.id {
                    deltas.push(StreamDelta::ToolUseStart {
                        id,
                        name: function.name.unwrap_or_default(),
                        index: call.index,
                    });
                }
                if let Some(arguments) = function.arguments.filter(|a| !a.is_empty()) {
                    deltas.push(StreamDelta::ToolInputDelta {
                        index: call.index,
                        delta: arguments,
                    });
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.stop_reason = Some(reason.into());
            }
        }
        deltas
    }
}

fn build_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|msg| {
            let tool_calls = (!msg.tool_calls.is_empty()).then(|| {
                msg.tool_calls
                    .iter()
                    .map(|call| ApiToolCall {
                        id: call.id.clone(),
                        r#type: "function".to_owned(),
                        function: ApiFunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.to_string(),
                        },
                    })
                    .collect()
            });

            // Assistant turns that only carry tool calls send a null content.
            let content = if msg.role == Role::Assistant && msg.content.is_empty() {
                None
            } else {
                Some(msg.content.clone())
            };

            ApiMessage {
                role: msg.role,
                content,
                tool_calls,
                tool_call_id: msg.tool_call_id.clone(),
            }
        })
        .collect()
}

fn convert_tool(t: crate::llm::Tool) -> ApiTool {
    ApiTool {
        r#type: "function".to_owned(),
        function: ApiFunction {
            name: t.name,
            description: t.description,
            parameters: t.input_schema,
        },
    }
}

// ============================================================================
// API Request Types
// ============================================================================

#[derive(Serialize)]
struct ApiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ApiTool]>,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage {
    role: Role,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunctionCall,
}

#[derive(Serialize)]
struct ApiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct ApiTool {
    r#type: String,
    function: ApiFunction,
}

#[derive(Serialize)]
struct ApiFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// ============================================================================
// API Stream Types
// ============================================================================

#[derive(Deserialize)]
struct ApiStreamChunk {
    #[serde(default)]
    choices: Vec<ApiStreamChoice>,
    #[serde(default)]
    error: Option<ApiStreamError>,
}

#[derive(Deserialize)]
struct ApiStreamChoice {
    #[serde(default)]
    delta: ApiStreamDelta,
    finish_reason: Option<ApiFinishReason>,
}

#[derive(Deserialize, Default)]
struct ApiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ApiStreamToolCall>>,
}

#[derive(Deserialize)]
struct ApiStreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<ApiStreamFunction>,
}

#[derive(Deserialize, Default)]
struct ApiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct ApiStreamError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ApiFinishReason {
    Stop,
    ToolCalls,
    FunctionCall,
    Length,
    ContentFilter,
    #[serde(other)]
    Other,
}

impl From<ApiFinishReason> for StopReason {
    fn from(reason: ApiFinishReason) -> Self {
        match reason {
            ApiFinishReason::Stop | ApiFinishReason::Other => Self::EndTurn,
            ApiFinishReason::ToolCalls | ApiFinishReason::FunctionCall => Self::ToolUse,
            ApiFinishReason::Length => Self::MaxTokens,
            ApiFinishReason::ContentFilter => Self::ContentFilter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ToolCallRequest;
    use serde_json::json;

    #[test]
    fn test_with_base_url_strips_trailing_slash() {
        let provider = OpenAIProvider::with_base_url(
            "key".to_string(),
            "gpt-4o".to_string(),
            "http://localhost:11434/v1/".to_string(),
        );
        assert_eq!(provider.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(provider.model(), "gpt-4o");
        assert_eq!(provider.provider(), "openai");
    }

    #[test]
    fn test_line_buffer_keeps_split_characters() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"Nestlé\"}}]}\n";
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;

        let mut lines = LineBuffer::default();
        lines.extend(&bytes[..split]);
        assert_eq!(lines.next_line(), None);
        lines.extend(&bytes[split..]);

        let decoded = lines.next_line().unwrap();
        let mut parser = ChunkParser::default();
        assert_eq!(
            parser.parse_line(&decoded),
            vec![StreamDelta::TextDelta {
                delta: "Nestlé".to_string()
            }]
        );
        assert_eq!(lines.next_line(), None);
        assert!(lines.remainder().is_empty());
    }

    #[test]
    fn test_line_buffer_strips_crlf() {
        let mut lines = LineBuffer::default();
        lines.extend(b"data: [DONE]\r\n: keep-alive\n\ndata: tail");
        assert_eq!(lines.next_line().as_deref(), Some("data: [DONE]"));
        assert_eq!(lines.next_line().as_deref(), Some(": keep-alive"));
        assert_eq!(lines.next_line().as_deref(), Some(""));
        assert_eq!(lines.next_line(), None);
        assert_eq!(lines.remainder(), "data: tail");
    }

    #[test]
    fn test_text_chunks() {
        let mut parser = ChunkParser::default();
        let deltas = parser.parse_line(
            r#"data: {"choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
        );
        assert_eq!(
            deltas,
            vec![StreamDelta::TextDelta {
                delta: "Hel".to_string()
            }]
        );
        assert!(!parser.finished);
    }

    #[test]
    fn test_tool_call_chunks() {
        let mut parser = ChunkParser::default();
        let start = parser.parse_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_1","type":"function","function":{"name":"get_dividends","arguments":""}}]}}]}"#,
        );
        assert_eq!(
            start,
            vec![StreamDelta::ToolUseStart {
                id: "call_1".to_string(),
                name: "get_dividends".to_string(),
                index: 1,
            }]
        );

        let args = parser.parse_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":1,"function":{"arguments":"{\"ticker\":"}}]}}]}"#,
        );
        assert_eq!(
            args,
            vec![StreamDelta::ToolInputDelta {
                index: 1,
                delta: r#"{"ticker":"#.to_string(),
            }]
        );
    }

    #[test]
    fn test_finish_reason_reported_on_done() {
        let mut parser = ChunkParser::default();
        assert!(
            parser
                .parse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#)
                .is_empty()
        );
        let done = parser.parse_line("data: [DONE]");
        assert_eq!(
            done,
            vec![StreamDelta::Done {
                stop_reason: Some(StopReason::ToolUse)
            }]
        );
        assert!(parser.finished);
    }

    #[test]
    fn test_error_chunk_is_fatal() {
        let mut parser = ChunkParser::default();
        let deltas = parser.parse_line(r#"data: {"error":{"message":"bad model"}}"#);
        assert_eq!(
            deltas,
            vec![StreamDelta::Error {
                message: "bad model".to_string(),
                recoverable: false,
            }]
        );
        assert!(parser.finished);
    }

    #[test]
    fn test_unknown_finish_reason_keeps_text() {
        let mut parser = ChunkParser::default();
        let deltas = parser.parse_line(
            r#"data: {"choices":[{"delta":{"content":"bye"},"finish_reason":"eos"}]}"#,
        );
        assert_eq!(
            deltas,
            vec![StreamDelta::TextDelta {
                delta: "bye".to_string()
            }]
        );
        assert_eq!(
            parser.parse_line("data: [DONE]"),
            vec![StreamDelta::Done {
                stop_reason: Some(StopReason::EndTurn)
            }]
        );
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut parser = ChunkParser::default();
        assert!(parser.parse_line(": keep-alive").is_empty());
        assert!(parser.parse_line("").is_empty());
        assert!(parser.parse_line("data: not json").is_empty());
    }

    #[test]
    fn test_build_api_messages() {
        let messages = vec![
            Message::system("sys"),
            Message::user("price of ACME?"),
            Message::assistant_with_tool_calls(
                None,
                vec![ToolCallRequest::new(
                    "call_1",
                    "get_stock_price",
                    json!({"ticker": "ACME"}),
                )],
            ),
            Message::tool_result("call_1", r#"{"price":12.5}"#),
        ];

        let api = serde_json::to_value(build_api_messages(&messages)).unwrap();
        assert_eq!(api[0]["role"], "system");
        assert_eq!(api[2]["content"], serde_json::Value::Null);
        assert_eq!(api[2]["tool_calls"][0]["function"]["name"], "get_stock_price");
        assert_eq!(
            api[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"ticker":"ACME"}"#
        );
        assert_eq!(api[3]["role"], "tool");
        assert_eq!(api[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_api_tool_serialization() {
        let tool = convert_tool(crate::llm::Tool {
            name: "get_stock_news".to_string(),
            description: "News".to_string(),
            input_schema: json!({"type": "object"}),
        });
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "get_stock_news");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }
}
