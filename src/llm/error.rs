//! Provider errors.
//!
//! Rate limits, server and network errors are transient and retried by the
//! provider. Contract violations and unparseable answers abort a run.

use std::time::Duration;

/// Error from a provider call.
#[derive(Debug, Clone)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub status_code: Option<u16>,
    pub message: String,
    /// Delay requested by the server through `Retry-After`.
    pub retry_after: Option<Duration>,
}

impl LlmError {
    fn of_kind(kind: LlmErrorKind, message: String) -> Self {
        Self {
            kind,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            status_code: Some(429),
            retry_after,
            ..Self::of_kind(LlmErrorKind::RateLimited, message)
        }
    }

    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::of_kind(LlmErrorKind::ServerError, message)
        }
    }

    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::of_kind(LlmErrorKind::ClientError, message)
        }
    }

    pub fn network_error(message: String) -> Self {
        Self::of_kind(LlmErrorKind::NetworkError, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::of_kind(LlmErrorKind::ParseError, message)
    }

    /// The provider answered with something the caller did not ask for: no
    /// expected tag, an empty tool-call list, a result mixed with tool calls.
    pub fn contract_violation(message: String) -> Self {
        Self::of_kind(LlmErrorKind::ContractViolation, message)
    }

    /// Check if the engine must abort instead of recovering.
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Delay before retry `attempt` (zero based), capped at one minute.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }
        let base: u64 = match self.kind {
            LlmErrorKind::RateLimited => 5,
            LlmErrorKind::ServerError => 2,
            _ => 1,
        };
        let secs = base.saturating_mul(2u64.saturating_pow(attempt));
        // up to a quarter of the delay, deterministic per attempt
        let jitter = match secs / 4 {
            0 => 0,
            range => (attempt as u64 * 7) % range,
        };
        Duration::from_secs(secs.saturating_add(jitter).min(60))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    ServerError,
    /// Other HTTP 4xx
    ClientError,
    /// Connection failure or timeout
    NetworkError,
    /// Response body or value could not be parsed
    ParseError,
    /// Provider answered outside of the requested shapes
    ContractViolation,
}

impl LlmErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, LlmErrorKind::ParseError | LlmErrorKind::ContractViolation)
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
            LlmErrorKind::ContractViolation => write!(f, "Provider contract violation"),
        }
    }
}

/// Retry limits for transient provider errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Upper bound on the time spent waiting between attempts.
    pub max_retry_duration: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_duration: Duration::from_secs(120),
        }
    }
}

impl RetryConfig {
    /// Whether a failed attempt (zero based) should be retried.
    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        error.kind.is_transient() && attempt < self.max_retries
    }
}

pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}
