//! Command-line and environment configuration for the server binary.

use crate::market_data::yahoo;
use crate::types::AgentConfig;
use anyhow::Context;
use clap::Parser;
use std::time::Duration;

/// Model requested when none is configured.
pub const DEFAULT_MODEL: &str = "c1/openai/gpt-5/v-20250930";
/// OpenAI-compatible endpoint used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.thesys.dev/v1/embed";

/// Stock-analysis chat server
#[derive(Clone, Debug, Parser)]
#[command(name = "ticker-agent", version, about)]
pub struct ServerConfig {
    /// Address to bind the server
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the server
    #[arg(short, long, default_value_t = 8888)]
    pub port: u16,

    /// Model name sent to the provider
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Base URL of the OpenAI-compatible chat completions API
    #[arg(long, env = "LLM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// API key for the model provider (falls back to OPENAI_API_KEY)
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Tool rounds allowed per request
    #[arg(long, default_value_t = 6)]
    pub max_iterations: usize,

    /// Per-call tool timeout in seconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub tool_timeout_secs: u64,

    /// Overall request deadline in seconds
    #[arg(long, default_value_t = 120, value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout_secs: u64,

    /// Base URL of the Yahoo Finance API
    #[arg(long, env = "MARKET_DATA_URL", default_value = yahoo::DEFAULT_BASE_URL)]
    pub market_data_url: String,
}

impl ServerConfig {
    /// Loop policy for the library, starting from its defaults.
    #[must_use]
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations,
            tool_timeout: Duration::from_secs(self.tool_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..AgentConfig::default()
        }
    }

    /// `host:port` to listen on.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The provider API key from `--api-key`, `LLM_API_KEY` or `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                std::env::var("OPENAI_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            })
            .context("no API key: pass --api-key or set LLM_API_KEY or OPENAI_API_KEY")
    }
}
