//! Language-model provider seam.
//!
//! The engine never talks to a model directly. Every call goes through the
//! [`Provider`] trait, which receives a conversation plus the set of named
//! result shapes the caller accepts and answers with exactly one of them, or
//! with a list of tool calls when tools were offered.
//!
//! [`OpenRouterProvider`] is the bundled implementation.

mod error;
mod openrouter;
pub mod schema;

pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use openrouter::{OpenRouterProvider, OPENROUTER_BASE_URL};
pub use schema::{ResponseFormat, ResponseShape, StructuredReply};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a workflow conversation.
///
/// Tool-call requests are assistant messages carrying `tool_calls`; tool
/// results are `tool` messages correlated through `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Create a simple text message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result correlated to the call `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Create an assistant message requesting the given tool calls.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// Whether this message asks for tool calls.
    pub fn is_tool_call_request(&self) -> bool {
        self.tool_calls.is_some()
    }

    /// Calls requested by this message (empty for ordinary messages).
    pub fn requested_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// A tool invocation requested by the model, with already-parsed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Tool definition offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A single provider call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Named result shapes the caller accepts.
    pub response_format: ResponseFormat,
    /// Tools the model may call instead of answering. Empty means no tools.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature (provider default when `None`).
    pub temperature: Option<f64>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, response_format: ResponseFormat) -> Self {
        Self {
            messages,
            response_format,
            tools: Vec::new(),
            temperature: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Raw provider answer: one named result, or tool calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// A value for the result shape `name`.
    Structured { name: String, value: Value },
    /// The model preferred to call tools.
    ToolCalls(Vec<ToolCall>),
}

/// Trait for language-model providers.
///
/// Implementations only translate wire formats. Validation of the returned
/// value against its shape happens in [`schema`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a chat request and return the tagged result.
    async fn chat(&self, request: ChatRequest) -> Result<ProviderResponse, LlmError>;
}
