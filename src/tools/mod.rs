//! Tool system for agents.
//!
//! Tools are the capabilities a worker agent may invoke instead of answering.
//! Each agent owns a [`ToolRegistry`]; the model sees the registry's
//! definitions, and the resolver in [`crate::tool_calls`] executes the calls it
//! requests against that same registry.

mod date;
mod http;

pub use date::CurrentDate;
pub use http::HttpRequest;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{ChatMessage, Provider, ToolDefinition};

/// Errors raised while resolving tool calls. All of them abort the run.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Invalid tool request: {0}")]
    InvalidRequest(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Tool {tool} failed: {message}")]
    Execution { tool: String, message: String },
}

/// What a tool can see while it runs.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    /// Provider of the agent that requested the call.
    pub provider: &'a dyn Provider,
    /// Ancestor context followed by the requesting node's messages.
    pub messages: &'a [ChatMessage],
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with arguments that already match the schema.
    async fn execute(&self, args: Value, context: ToolContext<'_>) -> anyhow::Result<String>;
}

/// Name-indexed set of tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a registry with the bundled tools (`current_date`, `http_request`).
    pub fn builtin() -> Self {
        Self::empty()
            .with(Arc::new(CurrentDate))
            .with(Arc::new(HttpRequest))
    }

    /// Add a tool, replacing any tool with the same name.
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Build a registry holding only the named tools of `self`.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<ToolRegistry, ToolError> {
        let mut selected = ToolRegistry::empty();
        for name in names {
            let tool = self
                .get(name.as_ref())
                .ok_or_else(|| ToolError::UnknownTool(name.as_ref().to_string()))?;
            selected.register(tool);
        }
        Ok(selected)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Tool definitions offered to the model, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

/// Check call arguments against the tool's parameter schema.
pub fn validate_arguments(tool: &dyn Tool, args: &Value) -> Result<(), ToolError> {
    let invalid = |message: String| ToolError::InvalidArguments {
        tool: tool.name().to_string(),
        message,
    };

    let schema = tool.parameters_schema();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| invalid(format!("invalid parameter schema: {}", e)))?;
    let errors: Vec<String> = validator.iter_errors(args).map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        return Err(invalid(errors.join("; ")));
    }
    Ok(())
}
