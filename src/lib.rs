//! Ticker Agent - a streaming stock-analysis chat agent.
//!
//! This crate provides:
//! - A bounded tool-calling loop over a streaming, OpenAI-compatible model
//! - Concurrent tool execution with per-call timeouts and cancellation
//! - Seven read-only finance tools backed by Yahoo Finance
//! - An axum server that streams each turn as server-sent events
//!
//! # Example
//!
//! ```ignore
//! use ticker_agent::{
//!     builder, register_finance_tools, SessionId, ToolRegistry,
//!     market_data::{MarketData, YahooFinance},
//!     providers::OpenAIProvider,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let data: Arc<dyn MarketData> = Arc::new(YahooFinance::new()?);
//! let mut tools = ToolRegistry::new();
//! register_finance_tools(&mut tools, &data)?;
//!
//! let agent = builder()
//!     .provider(OpenAIProvider::new(api_key, "gpt-4o".to_string()))
//!     .tools(tools)
//!     .build();
//!
//! let mut run = agent.run(SessionId::new(), "How is ACME doing?".to_string(), CancellationToken::new());
//! while let Some(envelope) = run.events.recv().await {
//!     println!("{:?}", envelope.event);
//! }
//! ```

#![forbid(unsafe_code)]

mod agent_loop;
pub mod config;
mod error;
mod events;
pub mod finance_tools;
mod hooks;
pub mod llm;
pub mod market_data;
pub mod providers;
pub mod server;
mod session;
pub mod stream;
mod tools;
mod types;

pub use agent_loop::{AgentLoop, AgentLoopBuilder, AgentRun, TurnOutcome, builder};
pub use error::{ConfigurationError, TerminalErrorKind, ToolError, ToolErrorKind, TurnError};
pub use events::{SequenceCounter, StreamEvent, StreamEventEnvelope};
pub use finance_tools::{FinanceToolName, register_finance_tools};
pub use hooks::{AgentHooks, DefaultHooks, LoggingHooks};
pub use llm::LlmProvider;
pub use session::Session;
pub use tools::{ErasedTool, Tool, ToolInvocation, ToolName, ToolRegistry};
pub use types::{AgentConfig, DEFAULT_SYSTEM_PROMPT, RetryConfig, SessionId, ToolOutcome, ToolResult};
