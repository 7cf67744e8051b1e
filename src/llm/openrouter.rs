//! OpenRouter (OpenAI-compatible) provider with automatic retry for transient errors.
//!
//! Result shapes are offered to the model as functions next to the agent's
//! tools, and tool choice is `required`: the model either calls one shape
//! function (the result) or any number of real tools.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use super::error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
use super::{
    ChatMessage, ChatRequest, Provider, ProviderResponse, ResponseFormat, Role, ToolCall,
    ToolDefinition,
};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// OpenRouter provider with automatic retry for transient errors.
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    retry_config: RetryConfig,
}

impl OpenRouterProvider {
    /// Create a new provider with default retry configuration.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENROUTER_BASE_URL.to_string(),
            retry_config: RetryConfig::default(),
        }
    }

    /// Point the provider at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(Duration::from_secs))
    }

    /// Create an LlmError from HTTP response status and body.
    fn create_error(
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> LlmError {
        let status_code = status.as_u16();
        match classify_http_status(status_code) {
            LlmErrorKind::RateLimited => LlmError::rate_limited(body.to_string(), retry_after),
            LlmErrorKind::ClientError => LlmError::client_error(status_code, body.to_string()),
            _ => LlmError::server_error(status_code, body.to_string()),
        }
    }

    /// Execute a single request without retry.
    async fn execute_request(&self, request: &WireRequest) -> Result<WireMessage, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network_error(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::network_error(format!("Connection failed: {}", e))
                } else {
                    LlmError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Self::create_error(status, &body, retry_after));
        }

        let parsed: WireResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!("Failed to parse response: {}, body: {}", e, body))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LlmError::parse_error("No choices in response".to_string()))
    }

    /// Execute a request with automatic retry for transient errors.
    async fn execute_with_retry(&self, request: &WireRequest) -> Result<WireMessage, LlmError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            match self.execute_request(request).await {
                Ok(message) => {
                    if attempt > 0 {
                        tracing::info!(
                            "Request succeeded after {} retries (total time: {:?})",
                            attempt,
                            start.elapsed()
                        );
                    }
                    return Ok(message);
                }
                Err(error) => {
                    let remaining = self
                        .retry_config
                        .max_retry_duration
                        .saturating_sub(start.elapsed());
                    let should_retry = self.retry_config.should_retry(&error, attempt);
                    let delay = error.suggested_delay(attempt).min(remaining);

                    if !should_retry || delay.is_zero() {
                        tracing::error!(
                            "Request failed after {} retries (total time: {:?}): {}",
                            attempt,
                            start.elapsed(),
                            error
                        );
                        return Err(error);
                    }

                    tracing::warn!(
                        "Retry attempt {} failed with {}, retrying in {:?}: {}",
                        attempt + 1,
                        error.kind,
                        delay,
                        error.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ProviderResponse, LlmError> {
        let wire = WireRequest::build(&self.model, &request);
        tracing::debug!(
            "Sending request to OpenRouter: model={}, tools={}",
            self.model,
            wire.tools.len()
        );
        let message = self.execute_with_retry(&wire).await?;
        interpret_message(message, &request.response_format)
    }
}

/// Turn the assistant message into a tagged result or tool calls.
fn interpret_message(
    message: WireMessage,
    format: &ResponseFormat,
) -> Result<ProviderResponse, LlmError> {
    let calls = message.tool_calls.unwrap_or_default();
    let Some(first) = calls.first() else {
        return Err(LlmError::contract_violation(
            "No tool call in response although tool choice is required".to_string(),
        ));
    };

    if format.contains(&first.function.name) {
        if calls.len() > 1 {
            return Err(LlmError::contract_violation(format!(
                "When calling one of {}, no other tools may be called",
                format.names().join(", ")
            )));
        }
        let value = parse_arguments(&first.function.name, &first.function.arguments)?;
        return Ok(ProviderResponse::Structured {
            name: first.function.name.clone(),
            value,
        });
    }

    if let Some(mixed) = calls.iter().find(|c| format.contains(&c.function.name)) {
        return Err(LlmError::contract_violation(format!(
            "Result '{}' was returned together with tool calls",
            mixed.function.name
        )));
    }

    // Provider-issued ids are only unique per request.
    calls
        .into_iter()
        .map(|call| {
            let arguments = parse_arguments(&call.function.name, &call.function.arguments)?;
            Ok(ToolCall::new(
                uuid::Uuid::new_v4().to_string(),
                call.function.name,
                arguments,
            ))
        })
        .collect::<Result<Vec<_>, LlmError>>()
        .map(ProviderResponse::ToolCalls)
}

fn parse_arguments(name: &str, arguments: &str) -> Result<Value, LlmError> {
    if arguments.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(arguments)
        .map_err(|e| LlmError::parse_error(format!("Invalid arguments for '{}': {}", name, e)))
}

/// OpenAI-compatible request format.
#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    tools: Vec<WireTool>,
    tool_choice: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

impl WireRequest {
    fn build(model: &str, request: &ChatRequest) -> Self {
        let shape_tools = request.response_format.shapes().iter().map(|shape| WireTool {
            tool_type: "function",
            function: ToolDefinition {
                name: shape.name.clone(),
                description: format!(
                    "Call this function when you are done processing the request and want to return \"{}\" as the result. {}",
                    shape.name, shape.description
                ),
                parameters: shape.schema.clone(),
            },
        });
        let tools = request
            .tools
            .iter()
            .map(|tool| WireTool {
                tool_type: "function",
                function: tool.clone(),
            })
            .chain(shape_tools)
            .collect();

        Self {
            model: model.to_string(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools,
            tool_choice: "required",
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: ToolDefinition,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        let tool_calls = message.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    call_type: "function".to_string(),
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect()
        });
        Self {
            role: message.role,
            content: Some(message.content.clone()),
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    call_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// Arguments as a JSON string. May be empty for no-argument functions.
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}
