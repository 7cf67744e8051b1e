//! Named result shapes and typed decoding of provider answers.
//!
//! A call site declares the shapes it accepts as a [`ResponseFormat`] and a
//! matching adjacently tagged enum:
//!
//! ```ignore
//! #[derive(Deserialize)]
//! #[serde(tag = "type", content = "value", rename_all = "snake_case")]
//! enum PlannerResponse {
//!     NextTask(NextTask),
//! }
//! ```
//!
//! The provider answers with `(name, value)`; the value is validated against
//! the shape's JSON schema before it is deserialised into the enum.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::{ChatRequest, LlmError, Provider, ProviderResponse, ToolCall};

/// One named result shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseShape {
    pub name: String,
    pub description: String,
    /// JSON schema of the value.
    pub schema: Value,
}

/// The set of result shapes a call accepts.
///
/// # Invariants
/// - Shape names are unique (a later shape with the same name replaces the earlier one)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseFormat {
    shapes: Vec<ResponseShape>,
}

impl ResponseFormat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named shape.
    pub fn shape(
        mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
    ) -> Self {
        let shape = ResponseShape {
            name: name.into(),
            description: description.into(),
            schema,
        };
        self.shapes.retain(|s| s.name != shape.name);
        self.shapes.push(shape);
        self
    }

    pub fn shapes(&self) -> &[ResponseShape] {
        &self.shapes
    }

    pub fn get(&self, name: &str) -> Option<&ResponseShape> {
        self.shapes.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.shapes.iter().map(|s| s.name.as_str()).collect()
    }

    /// Check `value` against the schema of shape `name`.
    pub fn validate(&self, name: &str, value: &Value) -> Result<(), LlmError> {
        let shape = self.get(name).ok_or_else(|| {
            LlmError::contract_violation(format!(
                "unexpected result '{}', expected one of: {}",
                name,
                self.names().join(", ")
            ))
        })?;

        let validator = jsonschema::validator_for(&shape.schema).map_err(|e| {
            LlmError::contract_violation(format!("invalid schema for '{}': {}", name, e))
        })?;
        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(LlmError::contract_violation(format!(
                "result '{}' does not match its schema: {}",
                name,
                errors.join("; ")
            )));
        }
        Ok(())
    }

    /// Validate and deserialise a tagged value into the call site's enum.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: Value) -> Result<T, LlmError> {
        self.validate(name, &value)?;
        serde_json::from_value(json!({ "type": name, "value": value })).map_err(|e| {
            LlmError::parse_error(format!("failed to decode result '{}': {}", name, e))
        })
    }
}

/// Answer of a call that offered tools.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredReply<T> {
    Result(T),
    ToolCalls(Vec<ToolCall>),
}

/// Send a request without tools and decode the single expected result.
pub async fn request<T: DeserializeOwned>(
    provider: &dyn Provider,
    request: ChatRequest,
) -> Result<T, LlmError> {
    let format = request.response_format.clone();
    match provider.chat(request).await? {
        ProviderResponse::Structured { name, value } => format.decode(&name, value),
        ProviderResponse::ToolCalls(_) => Err(LlmError::contract_violation(
            "provider returned tool calls but no tools were offered".to_string(),
        )),
    }
}

/// Send a request offering tools and decode either the result or the calls.
pub async fn request_with_tools<T: DeserializeOwned>(
    provider: &dyn Provider,
    request: ChatRequest,
) -> Result<StructuredReply<T>, LlmError> {
    let format = request.response_format.clone();
    let offered_tools = !request.tools.is_empty();
    match provider.chat(request).await? {
        ProviderResponse::Structured { name, value } => {
            format.decode(&name, value).map(StructuredReply::Result)
        }
        ProviderResponse::ToolCalls(calls) if calls.is_empty() => Err(
            LlmError::contract_violation("provider returned an empty tool call list".to_string()),
        ),
        ProviderResponse::ToolCalls(_) if !offered_tools => Err(LlmError::contract_violation(
            "provider returned tool calls but no tools were offered".to_string(),
        )),
        ProviderResponse::ToolCalls(calls) => Ok(StructuredReply::ToolCalls(calls)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, LlmErrorKind};
    use crate::testing::ScriptedProvider;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(tag = "type", content = "value", rename_all = "snake_case")]
    enum Answer {
        Done(Done),
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Done {
        text: String,
    }

    fn format() -> ResponseFormat {
        ResponseFormat::new().shape(
            "done",
            "final answer",
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        )
    }

    #[test]
    fn test_decode_valid_value() {
        let answer: Answer = format().decode("done", json!({"text": "ok"})).unwrap();
        assert_eq!(answer, Answer::Done(Done { text: "ok".into() }));
    }

    #[test]
    fn test_decode_rejects_schema_mismatch() {
        let err = format()
            .decode::<Answer>("done", json!({"text": 3}))
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ContractViolation);
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let err = format()
            .decode::<Answer>("other", json!({"text": "ok"}))
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ContractViolation);
        assert!(err.message.contains("done"));
    }

    #[test]
    fn test_shape_names_are_unique() {
        let format = format().shape("done", "again", json!({"type": "object"}));
        assert_eq!(format.names(), vec!["done"]);
    }

    #[tokio::test]
    async fn test_tool_calls_without_tools_is_violation() {
        let provider = ScriptedProvider::new(vec![ProviderResponse::ToolCalls(vec![
            ToolCall::new("c1", "t", json!({})),
        ])]);
        let req = ChatRequest::new(vec![ChatMessage::user("hi")], format());
        let err = request::<Answer>(&provider, req).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_empty_tool_call_list_is_violation() {
        let provider = ScriptedProvider::new(vec![ProviderResponse::ToolCalls(vec![])]);
        let req = ChatRequest::new(vec![ChatMessage::user("hi")], format()).with_tools(vec![
            crate::llm::ToolDefinition {
                name: "t".into(),
                description: "t".into(),
                parameters: json!({"type": "object"}),
            },
        ]);
        let err = request_with_tools::<Answer>(&provider, req)
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::ContractViolation);
    }
}
