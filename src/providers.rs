//! LLM Provider implementations.
//!
//! [`OpenAIProvider`] speaks the streaming chat-completions protocol used by
//! `OpenAI` and compatible gateways.

pub mod openai;

pub use openai::OpenAIProvider;
