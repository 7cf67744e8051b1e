//! Configuration management for teamwork.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `DEFAULT_MODEL` - Optional. The default model. Defaults to `openai/gpt-4o`.
//! - `OPENROUTER_BASE_URL` - Optional. OpenAI-compatible endpoint. Defaults to OpenRouter.
//! - `MAX_ITERATIONS` - Optional. Per-node conversation budget. Defaults to `50`.
//! - `LLM_MAX_RETRIES` - Optional. Retries for transient provider errors. Defaults to `3`.

use thiserror::Error;

use crate::llm::{OpenRouterProvider, RetryConfig};

pub const DEFAULT_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key
    pub api_key: String,

    /// Default model identifier (OpenRouter format)
    pub default_model: String,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Maximum conversation length of a node before the fallback agent takes over
    pub max_iterations: usize,

    /// Retry attempts for transient provider errors
    pub max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENROUTER_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let base_url = std::env::var("OPENROUTER_BASE_URL")
            .unwrap_or_else(|_| crate::llm::OPENROUTER_BASE_URL.to_string());

        let max_iterations = parse_var("MAX_ITERATIONS", DEFAULT_MAX_ITERATIONS)?;
        let max_retries = parse_var("LLM_MAX_RETRIES", RetryConfig::default().max_retries)?;

        Ok(Self {
            api_key,
            default_model,
            base_url,
            max_iterations,
            max_retries,
        })
    }

    /// Create a config with default values (useful for testing).
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            api_key,
            default_model,
            base_url: crate::llm::OPENROUTER_BASE_URL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_retries: RetryConfig::default().max_retries,
        }
    }

    /// Build the provider described by this configuration.
    pub fn provider(&self) -> OpenRouterProvider {
        OpenRouterProvider::new(self.api_key.clone(), self.default_model.clone())
            .with_base_url(self.base_url.clone())
            .with_retry_config(RetryConfig {
                max_retries: self.max_retries,
                ..RetryConfig::default()
            })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_defaults() {
        let config = Config::new("key".to_string(), "some/model".to_string());
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_url, crate::llm::OPENROUTER_BASE_URL);
    }

    #[test]
    fn test_parse_var_reports_invalid_value() {
        std::env::set_var("TEAMWORK_TEST_BAD_NUMBER", "many");
        let err = parse_var::<usize>("TEAMWORK_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue(name, _) if name == "TEAMWORK_TEST_BAD_NUMBER"
        ));
        assert_eq!(parse_var::<usize>("TEAMWORK_TEST_UNSET_NUMBER", 7).unwrap(), 7);
    }
}
