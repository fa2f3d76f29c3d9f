//! Tool definition and registry.
//!
//! Tools let the model fetch data. This module provides:
//!
//! - [`Tool`] trait - Define a tool the model can call
//! - [`ToolName`] trait - Marker trait for strongly-typed tool names
//! - [`ToolRegistry`] - Collection of available tools, keyed by name
//!
//! Argument validation is split from execution: [`Tool::validate`] runs
//! synchronously and produces typed arguments, so a call with bad arguments
//! never reaches the tool's data source.
//!
//! # Implementing a Tool
//!
//! ```ignore
//! struct PriceTool { data: Arc<dyn MarketData> }
//!
//! impl Tool for PriceTool {
//!     type Name = FinanceToolName;
//!     type Args = Ticker;
//!
//!     fn name(&self) -> FinanceToolName { FinanceToolName::GetStockPrice }
//!     fn description(&self) -> &'static str { "Current price of a stock" }
//!     fn input_schema(&self) -> Value { json!({ "type": "object" }) }
//!     fn validate(&self, input: &Value) -> Result<Ticker, ToolError> { Ticker::from_args(input) }
//!
//!     async fn execute(&self, ticker: Ticker) -> Result<Value, ToolError> {
//!         self.data.quote(&ticker).await.map(|q| json!(q))
//!     }
//! }
//! ```

use crate::error::{ConfigurationError, ToolError};
use crate::llm;
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

// ============================================================================
// Tool Name Types
// ============================================================================

/// Marker trait for tool names.
///
/// The string a model sees and calls is the name's serde serialization.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// #[serde(rename_all = "snake_case")]
/// pub enum MyToolName {
///     GetStockPrice,
/// }
///
/// impl ToolName for MyToolName {}
/// ```
pub trait ToolName: Send + Sync + Serialize + DeserializeOwned + 'static {}

/// String representation of a tool name via serde.
///
/// Returns `None` if the name does not serialize to a JSON string.
#[must_use]
pub fn tool_name_to_string<N: ToolName>(name: &N) -> Option<String> {
    match serde_json::to_value(name) {
        Ok(Value::String(s)) => Some(s),
        _ => None,
    }
}

// ============================================================================
// Tool Trait
// ============================================================================

/// Definition of a tool that can be called by the agent.
///
/// # Native Async Support
///
/// This trait uses Rust's native async functions in traits. You do NOT need
/// the `async_trait` crate to implement it.
pub trait Tool: Send + Sync + 'static {
    /// The type of name for this tool.
    type Name: ToolName;
    /// Validated arguments handed to [`Tool::execute`].
    type Args: Send + 'static;

    /// Returns the tool's strongly-typed name.
    fn name(&self) -> Self::Name;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &'static str;

    /// JSON schema for the tool's input parameters.
    fn input_schema(&self) -> Value;

    /// Presence, type and domain checks on raw model arguments.
    ///
    /// # Errors
    /// Returns [`ToolError::Validation`] naming the offending field.
    fn validate(&self, input: &Value) -> Result<Self::Args, ToolError>;

    /// Execute the tool with validated arguments.
    ///
    /// # Errors
    /// Returns an upstream error if the data source fails.
    fn execute(&self, args: Self::Args) -> impl Future<Output = Result<Value, ToolError>> + Send;
}

// ============================================================================
// Type-Erased Tool (for Registry)
// ============================================================================

/// A validated call, ready to run. Owns everything it needs.
pub type ToolInvocation = BoxFuture<'static, Result<Value, ToolError>>;

/// Type-erased tool trait for registry storage.
///
/// This allows tools with different `Name` and `Args` associated types to be
/// stored in the same registry.
pub trait ErasedTool: Send + Sync {
    /// Get the tool name as a string.
    fn name_str(&self) -> &str;
    /// Get the tool description.
    fn description(&self) -> &'static str;
    /// Get the JSON schema for tool inputs.
    fn input_schema(&self) -> Value;
    /// Validate `input` and bind it to an invocation without running it.
    ///
    /// # Errors
    /// Returns the tool's validation error.
    fn prepare(self: Arc<Self>, input: &Value) -> Result<ToolInvocation, ToolError>;
}

/// Wrapper that erases the associated types from a Tool.
struct ToolWrapper<T: Tool> {
    inner: T,
    name_cache: String,
}

impl<T: Tool> ToolWrapper<T> {
    fn new(tool: T) -> Result<Self, ConfigurationError> {
        let name_cache =
            tool_name_to_string(&tool.name()).ok_or(ConfigurationError::InvalidToolName)?;
        Ok(Self {
            inner: tool,
            name_cache,
        })
    }
}

impl<T: Tool> ErasedTool for ToolWrapper<T> {
    fn name_str(&self) -> &str {
        &self.name_cache
    }

    fn description(&self) -> &'static str {
        self.inner.description()
    }

    fn input_schema(&self) -> Value {
        self.inner.input_schema()
    }

    fn prepare(self: Arc<Self>, input: &Value) -> Result<ToolInvocation, ToolError> {
        let args = self.inner.validate(input)?;
        Ok(Box::pin(async move { self.inner.execute(args).await }))
    }
}

// ============================================================================
// Tool Registry
// ============================================================================

/// Registry of available tools, keyed by name.
///
/// Built once at startup and shared read-only across requests.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ErasedTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool in the registry.
    ///
    /// The tool's name is converted to a string via serde serialization
    /// and used as the lookup key.
    ///
    /// # Errors
    /// Returns [`ConfigurationError::DuplicateTool`] if the name is taken.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<&mut Self, ConfigurationError> {
        let wrapper = ToolWrapper::new(tool)?;
        let name = wrapper.name_str().to_string();
        if self.tools.contains_key(&name) {
            return Err(ConfigurationError::DuplicateTool(name));
        }
        log::debug!("Registered tool name={name}");
        self.tools.insert(name, Arc::new(wrapper));
        Ok(self)
    }

    /// Look up a tool by name.
    ///
    /// # Errors
    /// Returns [`ToolError::UnknownTool`] if no tool has that name.
    pub fn resolve(&self, name: &str) -> Result<&Arc<dyn ErasedTool>, ToolError> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Resolve `name` and validate `arguments` against it.
    ///
    /// # Errors
    /// Returns an unknown-tool or validation error.
    pub fn prepare(&self, name: &str, arguments: &Value) -> Result<ToolInvocation, ToolError> {
        Arc::clone(self.resolve(name)?).prepare(arguments)
    }

    /// Check a call without running it.
    ///
    /// # Errors
    /// Returns an unknown-tool or validation error.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<(), ToolError> {
        // The prepared future is dropped unpolled, so nothing runs.
        self.prepare(name, arguments).map(drop)
    }

    /// Get the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions advertised to the model, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<llm::Tool> {
        let mut tools: Vec<_> = self
            .tools
            .values()
            .map(|tool| llm::Tool {
                name: tool.name_str().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    enum TestToolName {
        Shout,
        Whisper,
    }

    impl ToolName for TestToolName {}

    struct ShoutTool {
        name: TestToolName,
        calls: Arc<AtomicUsize>,
    }

    impl ShoutTool {
        fn new(name: TestToolName) -> Self {
            Self {
                name,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Tool for ShoutTool {
        type Name = TestToolName;
        type Args = String;

        fn name(&self) -> TestToolName {
            self.name
        }

        fn description(&self) -> &'static str {
            "Upper-cases a message"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({
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
                .ok_or_else(|| ToolError::validation("message", "required string"))
        }

        async fn execute(&self, message: String) -> Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::String(message.to_uppercase()))
        }
    }

    #[test]
    fn test_tool_name_serialization() {
        assert_eq!(
            tool_name_to_string(&TestToolName::Shout).as_deref(),
            Some("shout")
        );
        assert_eq!(
            tool_name_to_string(&TestToolName::Whisper).as_deref(),
            Some("whisper")
        );
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(ShoutTool::new(TestToolName::Shout)).unwrap();

        let err = registry
            .register(ShoutTool::new(TestToolName::Shout))
            .err()
            .unwrap();
        assert_eq!(err, ConfigurationError::DuplicateTool("shout".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        let err = registry.resolve("missing").err().unwrap();
        assert_eq!(err, ToolError::UnknownTool("missing".into()));
    }

    #[tokio::test]
    async fn test_prepare_then_run() -> anyhow::Result<()> {
        let mut registry = ToolRegistry::new();
        registry.register(ShoutTool::new(TestToolName::Shout))?;

        let invocation = registry.prepare("shout", &serde_json::json!({"message": "hi"}))?;
        assert_eq!(invocation.await?, Value::String("HI".into()));
        Ok(())
    }

    #[test]
    fn test_validation_failure_never_executes() {
        let tool = ShoutTool::new(TestToolName::Shout);
        let calls = Arc::clone(&tool.calls);
        let mut registry = ToolRegistry::new();
        registry.register(tool).unwrap();

        let err = registry
            .validate("shout", &serde_json::json!({"message": 3}))
            .unwrap_err();
        assert_eq!(err.kind(), crate::ToolErrorKind::ValidationError);
        assert!(registry.validate("shout", &serde_json::json!({"message": "ok"})).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_definitions_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ShoutTool::new(TestToolName::Whisper))
            .unwrap()
            .register(ShoutTool::new(TestToolName::Shout))
            .unwrap();

        let names: Vec<_> = registry.definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["shout", "whisper"]);
    }
}
