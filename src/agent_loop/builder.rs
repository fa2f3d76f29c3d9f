use crate::hooks::{AgentHooks, DefaultHooks};
use crate::llm::LlmProvider;
use crate::tools::ToolRegistry;
use crate::types::AgentConfig;
use std::sync::Arc;

use super::AgentLoop;

/// Builder for constructing an `AgentLoop`.
///
/// The provider is tracked in the type, so `build` only exists once one has
/// been set.
///
/// # Example
///
/// ```ignore
/// let agent = ticker_agent::builder()
///     .provider(my_provider)
///     .tools(my_tools)
///     .config(AgentConfig::default())
///     .build();
/// ```
pub struct AgentLoopBuilder<P, H> {
    provider: P,
    hooks: H,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl AgentLoopBuilder<(), DefaultHooks> {
    /// Create a new builder with no provider, no tools, and default hooks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            provider: (),
            hooks: DefaultHooks,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }
}

impl Default for AgentLoopBuilder<(), DefaultHooks> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, H> AgentLoopBuilder<P, H> {
    /// Set the LLM provider.
    #[must_use]
    pub fn provider<P2: LlmProvider>(self, provider: P2) -> AgentLoopBuilder<P2, H> {
        AgentLoopBuilder {
            provider,
            hooks: self.hooks,
            tools: self.tools,
            config: self.config,
        }
    }

    /// Set the agent hooks.
    #[must_use]
    pub fn hooks<H2: AgentHooks>(self, hooks: H2) -> AgentLoopBuilder<P, H2> {
        AgentLoopBuilder {
            provider: self.provider,
            hooks,
            tools: self.tools,
            config: self.config,
        }
    }

    /// Set the tool registry.
    #[must_use]
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Set the agent configuration.
    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }
}

impl<P, H> AgentLoopBuilder<P, H>
where
    P: LlmProvider + 'static,
    H: AgentHooks + 'static,
{
    /// Build the agent loop.
    #[must_use]
    pub fn build(self) -> AgentLoop<P, H> {
        AgentLoop {
            provider: Arc::new(self.provider),
            tools: Arc::new(self.tools),
            hooks: Arc::new(self.hooks),
            config: self.config,
        }
    }
}
