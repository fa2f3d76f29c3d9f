//! HTTP surface: `POST /chat` (alias `/api/chat`) streaming SSE, and
//! `GET /health`.

use crate::agent_loop::AgentLoop;
use crate::hooks::AgentHooks;
use crate::llm::LlmProvider;
use crate::stream::sse_stream;
use crate::types::SessionId;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Chat request body.
///
/// Either the prompt envelope used by the web client or a flat
/// `{"message": ...}` form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatBody {
    Prompt(PromptRequest),
    Flat(FlatRequest),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptRequest {
    prompt: Prompt,
    thread_id: Option<String>,
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Prompt {
    content: String,
    id: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatRequest {
    message: String,
    thread_id: Option<String>,
}

/// A validated chat request.
#[derive(Debug, PartialEq, Eq)]
struct ChatInput {
    session_id: SessionId,
    message: String,
}

impl ChatBody {
    fn into_input(self) -> Result<ChatInput, String> {
        let (message, thread_id) = match self {
            Self::Prompt(request) => {
                log::debug!(
                    "Chat prompt id={:?} role={:?} response_id={:?}",
                    request.prompt.id,
                    request.prompt.role,
                    request.response_id
                );
                (request.prompt.content, request.thread_id)
            }
            Self::Flat(request) => (request.message, request.thread_id),
        };
        if message.trim().is_empty() {
            return Err("prompt content must not be empty".to_string());
        }
        let session_id = thread_id
            .filter(|id| !id.trim().is_empty())
            .map_or_else(SessionId::new, SessionId::from_string);
        Ok(ChatInput {
            session_id,
            message,
        })
    }
}

fn parse_chat_body(body: &[u8]) -> Result<ChatInput, String> {
    let parsed: ChatBody =
        serde_json::from_slice(body).map_err(|e| format!("invalid request body: {e}"))?;
    parsed.into_input()
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Build the application router around a shared agent.
pub fn router<P, H>(agent: Arc<AgentLoop<P, H>>) -> Router
where
    P: LlmProvider + 'static,
    H: AgentHooks + 'static,
{
    Router::new()
        .route("/chat", post(chat::<P, H>))
        .route("/api/chat", post(chat::<P, H>))
        .route("/health", get(health))
        .with_state(agent)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn chat<P, H>(State(agent): State<Arc<AgentLoop<P, H>>>, body: Bytes) -> Response
where
    P: LlmProvider + 'static,
    H: AgentHooks + 'static,
{
    let input = match parse_chat_body(&body) {
        Ok(input) => input,
        Err(message) => {
            log::warn!("Rejected chat request: {message}");
            return bad_request(message);
        }
    };
    log::info!(
        "Chat request session_id={} chars={}",
        input.session_id,
        input.message.chars().count()
    );

    let cancel = CancellationToken::new();
    let run = agent.run(input.session_id, input.message, cancel.clone());
    let sse = Sse::new(sse_stream(run.events, cancel))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL));

    (
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::CONNECTION, "keep-alive"),
        ],
        sse,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_loop::builder;
    use crate::agent_loop::test_utils::MockProvider;
    use crate::tools::ToolRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(provider: MockProvider) -> Router {
        let agent = builder()
            .provider(provider)
            .tools(ToolRegistry::new())
            .build();
        router(Arc::new(agent))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// SSE event names in order of appearance.
    fn event_names(body: &str) -> Vec<&str> {
        body.lines()
            .filter_map(|line| line.strip_prefix("event:"))
            .map(str::trim)
            .collect()
    }

    #[test]
    fn prompt_envelope_is_parsed() {
        let input = parse_chat_body(
            br#"{"prompt":{"content":"Price of ACME?","id":"p1","role":"user"},"threadId":"t-1","responseId":"r-1"}"#,
        )
        .unwrap();
        assert_eq!(input.message, "Price of ACME?");
        assert_eq!(input.session_id, SessionId::from_string("t-1"));
    }

    #[test]
    fn flat_form_is_parsed() {
        let input = parse_chat_body(br#"{"message":"hi"}"#).unwrap();
        assert_eq!(input.message, "hi");
        assert!(!input.session_id.0.is_empty());
    }

    #[test]
    fn blank_thread_id_gets_a_fresh_session() {
        let input = parse_chat_body(br#"{"message":"hi","threadId":"  "}"#).unwrap();
        assert_ne!(input.session_id, SessionId::from_string("  "));
    }

    #[test]
    fn empty_or_malformed_bodies_are_rejected() {
        for body in [
            &br#"{"prompt":{"content":"   "}}"#[..],
            br#"{"message":""}"#,
            br#"{"prompt":{}}"#,
            br#"{"text":"hi"}"#,
            b"not json",
        ] {
            assert!(parse_chat_body(body).is_err(), "{}", String::from_utf8_lossy(body));
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app(MockProvider::new(vec![]))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn chat_streams_server_sent_events() {
        let provider = MockProvider::new(vec![MockProvider::text_response("ACME is up.")]);
        let response = app(provider)
            .oneshot(post_json(
                "/api/chat",
                r#"{"prompt":{"content":"How is ACME?","id":"1","role":"user"},"threadId":"t","responseId":"r"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert!(
            headers[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-transform");
        assert_eq!(headers[header::CONNECTION], "keep-alive");

        let body = body_text(response).await;
        assert_eq!(event_names(&body), vec!["token", "token", "token", "done"]);
        assert!(body.contains(r#""session_id":"t""#));
    }

    #[tokio::test]
    async fn model_failure_streams_one_error() {
        let provider = MockProvider::new(vec![MockProvider::error_response("bad key", false)]);
        let response = app(provider)
            .oneshot(post_json("/chat", r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert_eq!(event_names(&body), vec!["error"]);
        assert!(body.contains(r#""kind":"model_error""#));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_streaming() {
        let response = app(MockProvider::new(vec![]))
            .oneshot(post_json("/chat", r#"{"prompt":{"content":""}}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "prompt content must not be empty");
    }
}
