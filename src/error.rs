//! Error types for Agent Hub.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Job lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} not found")]
    NotFound { id: Uuid },

    #[error("Job {id} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        state: String,
        target: String,
    },

    #[error("Job {id} exceeded its timeout of {timeout:?}")]
    Timeout { id: Uuid, timeout: Duration },

    #[error("Maximum concurrent jobs ({max}) exceeded")]
    MaxJobsExceeded { max: usize },
}

/// Agent resolution and execution errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent '{id}' not found")]
    NotFound { id: String },

    #[error("Agent '{id}' requirements not met: {}", missing.join(", "))]
    RequirementsNotMet { id: String, missing: Vec<String> },

    #[error("Invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error(transparent)]
    Upstream(#[from] ProviderError),

    #[error("Agent run aborted: {reason}")]
    Aborted { reason: String },
}

/// External provider errors. Carries the provider name so callers can tell
/// which upstream failed without parsing the message.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Provider {provider} is not configured")]
    Unconfigured { provider: String },
}

impl ProviderError {
    /// The provider this error originated from.
    pub fn provider(&self) -> &str {
        match self {
            Self::RequestFailed { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::RateLimited { provider }
            | Self::Unconfigured { provider } => provider,
        }
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_exposes_provider_name() {
        let err = ProviderError::RequestFailed {
            provider: "search".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.provider(), "search");
        assert!(err.to_string().contains("search"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn requirements_not_met_lists_missing() {
        let err = AgentError::RequirementsNotMet {
            id: "daily-news".to_string(),
            missing: vec![
                "ANTHROPIC_API_KEY".to_string(),
                "TELEGRAM_BOT_TOKEN".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("ANTHROPIC_API_KEY, TELEGRAM_BOT_TOKEN"));
    }
}
