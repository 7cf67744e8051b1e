//! Generic HTTP request tool.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolContext};

/// Make an HTTP request with a configurable method, headers and body.
pub struct HttpRequest;

#[derive(Debug, Deserialize)]
struct HttpRequestArgs {
    url: String,
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: String,
}

fn parse_method(method: &str) -> anyhow::Result<reqwest::Method> {
    match method {
        "GET" => Ok(reqwest::Method::GET),
        "POST" => Ok(reqwest::Method::POST),
        "PUT" => Ok(reqwest::Method::PUT),
        "DELETE" => Ok(reqwest::Method::DELETE),
        "PATCH" => Ok(reqwest::Method::PATCH),
        other => Err(anyhow::anyhow!("Unsupported HTTP method: {}", other)),
    }
}

#[async_trait]
impl Tool for HttpRequest {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Makes HTTP requests to specified URLs with configurable method, headers, and body."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to make the request to."
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "PUT", "DELETE", "PATCH"],
                    "description": "The HTTP method to use."
                },
                "headers": {
                    "type": "object",
                    "additionalProperties": {"type": "string"},
                    "description": "Headers to include in the HTTP request."
                },
                "body": {
                    "type": "string",
                    "description": "The body of the HTTP request. For GET requests, this should typically be empty string. For other requests it could be JSON or other formats."
                }
            },
            "required": ["url", "method", "body"]
        })
    }

    async fn execute(&self, args: Value, _context: ToolContext<'_>) -> anyhow::Result<String> {
        let args: HttpRequestArgs = serde_json::from_value(args)?;
        let method = parse_method(&args.method)?;

        let client = reqwest::Client::builder()
            .user_agent("teamwork/0.1")
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let mut request = client.request(method, &args.url);
        for (name, value) in &args.headers {
            request = request.header(name, value);
        }
        if !args.body.is_empty() {
            request = request.body(args.body);
        }

        tracing::debug!(url = %args.url, method = %args.method, "http_request");
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("HTTP error {}: {}", status.as_u16(), body);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use crate::tools::validate_arguments;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("PATCH").unwrap(), reqwest::Method::PATCH);
        assert!(parse_method("TRACE").is_err());
    }

    #[test]
    fn test_schema_rejects_unknown_method() {
        let args = json!({"url": "http://localhost", "method": "TRACE", "body": ""});
        assert!(validate_arguments(&HttpRequest, &args).is_err());

        let args = json!({"url": "http://localhost", "method": "GET", "body": ""});
        assert!(validate_arguments(&HttpRequest, &args).is_ok());
    }

    #[tokio::test]
    async fn test_missing_url_is_an_error() {
        let provider = ScriptedProvider::new(vec![]);
        let context = ToolContext {
            provider: &provider,
            messages: &[],
        };
        let result = HttpRequest
            .execute(json!({"method": "GET", "body": ""}), context)
            .await;
        tokio_test::assert_err!(result);
    }
}
