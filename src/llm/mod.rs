//! Hosted completion provider.
//!
//! Supports:
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! Agents consume the narrow [`CompletionProvider`] trait; rig supplies the
//! HTTP transport and request shaping underneath.

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::{CompletionModel, Prompt};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, ProviderError};

/// Supported completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

/// Configuration for creating a completion provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
}

/// Prompt-in, text-out completion contract.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Bridges a rig agent to the `CompletionProvider` trait.
struct RigCompletion<M: CompletionModel> {
    agent: rig::agent::Agent<M>,
    model: String,
}

#[async_trait]
impl<M> CompletionProvider for RigCompletion<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.agent
            .prompt(prompt)
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: "completion".to_string(),
                reason: e.to_string(),
            })
    }
}

/// Create a completion provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    match config.backend {
        LlmBackend::Anthropic => create_anthropic_provider(config),
        LlmBackend::OpenAi => create_openai_provider(config),
    }
}

fn create_anthropic_provider(
    config: &LlmConfig,
) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "ANTHROPIC_API_KEY".to_string(),
                message: format!("failed to create Anthropic client: {e}"),
            }
        })?;

    let model = client.completion_model(&config.model);
    let agent = rig::agent::AgentBuilder::new(model).build();
    tracing::info!("Using Anthropic completion backend (model: {})", config.model);
    Ok(Arc::new(RigCompletion {
        agent,
        model: config.model.clone(),
    }))
}

fn create_openai_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "OPENAI_API_KEY".to_string(),
                message: format!("failed to create OpenAI client: {e}"),
            }
        })?;

    let model = client.completion_model(&config.model);
    let agent = rig::agent::AgentBuilder::new(model).build();
    tracing::info!("Using OpenAI completion backend (model: {})", config.model);
    Ok(Arc::new(RigCompletion {
        agent,
        model: config.model.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_anthropic_provider_with_any_key() {
        // rig clients accept any string at construction; auth fails only on
        // the first request.
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: SecretString::from("test-key"),
            model: "claude-sonnet-4-20250514".to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "claude-sonnet-4-20250514");
    }

    #[tokio::test]
    async fn create_openai_provider_with_any_key() {
        let config = LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: SecretString::from("sk-test"),
            model: "gpt-4.1-mini".to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4.1-mini");
    }
}
