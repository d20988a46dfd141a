//! Agent abstraction and registry.

pub mod echo;
pub mod news;
pub mod trending;

pub use echo::EchoAgent;
pub use news::DailyNewsAgent;
pub use trending::GithubTrendingAgent;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Settings;
use crate::error::{AgentError, ConfigError, ProviderError};
use crate::llm::{self, CompletionProvider, LlmConfig};
use crate::providers::{
    DuckDuckGoSearch, FirecrawlScraper, Notifier, QuoteProvider, ScrapeProvider, SearchProvider,
    TelegramNotifier, YahooQuotes,
};

/// External capability an agent needs configured before it can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Completion,
    Search,
    Scrape,
    Quotes,
    Telegram,
}

/// Provider bundle handed to every agent run.
///
/// Each slot is optional; agents degrade or refuse depending on which of
/// their capabilities are actually wired up.
pub struct AgentDeps {
    pub completion: Option<Arc<dyn CompletionProvider>>,
    pub search: Option<Arc<dyn SearchProvider>>,
    pub scrape: Option<Arc<dyn ScrapeProvider>>,
    pub quotes: Option<Arc<dyn QuoteProvider>>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl AgentDeps {
    /// An empty bundle (tests, agents without external calls).
    pub fn none() -> Self {
        Self {
            completion: None,
            search: None,
            scrape: None,
            quotes: None,
            notifier: None,
        }
    }

    /// Build the bundle from configured credentials. Unconfigured providers
    /// stay `None`; per-agent requirement checks happen at the API boundary.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let completion = match settings.llm_api_key.clone() {
            Some(api_key) => Some(llm::create_provider(&LlmConfig {
                backend: settings.llm_backend,
                api_key,
                model: settings.llm_model.clone(),
            })?),
            None => None,
        };

        let scrape: Option<Arc<dyn ScrapeProvider>> = settings
            .firecrawl_api_key
            .clone()
            .map(|key| Arc::new(FirecrawlScraper::new(key)) as Arc<dyn ScrapeProvider>);

        let notifier: Option<Arc<dyn Notifier>> = match (
            settings.telegram_bot_token.clone(),
            settings.telegram_chat_id.clone(),
        ) {
            (Some(token), Some(chat_id)) => {
                Some(Arc::new(TelegramNotifier::new(token, chat_id)) as Arc<dyn Notifier>)
            }
            _ => None,
        };

        Ok(Self {
            completion,
            search: Some(Arc::new(DuckDuckGoSearch::new())),
            scrape,
            quotes: Some(Arc::new(YahooQuotes::new())),
            notifier,
        })
    }

    /// The completion provider, or an `Unconfigured` error.
    pub fn completion(&self) -> Result<&Arc<dyn CompletionProvider>, ProviderError> {
        self.completion.as_ref().ok_or(ProviderError::Unconfigured {
            provider: "completion".to_string(),
        })
    }

    /// The search provider, or an `Unconfigured` error.
    pub fn search(&self) -> Result<&Arc<dyn SearchProvider>, ProviderError> {
        self.search.as_ref().ok_or(ProviderError::Unconfigured {
            provider: "search".to_string(),
        })
    }
}

/// A named, registered operation that executes a fixed pipeline of external
/// calls against supplied parameters.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable identifier used in API paths and job records.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    fn category(&self) -> &str {
        "general"
    }

    /// Per-agent timeout; `None` falls back to the configured default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Capabilities that must be configured for this agent to run.
    fn required_capabilities(&self) -> &[Capability];

    /// Parameters used when the caller supplies none.
    fn default_parameters(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    /// Validate parameters at the API boundary, before a job record is
    /// created. The default accepts anything.
    fn validate_parameters(&self, params: &serde_json::Value) -> Result<(), AgentError> {
        let _ = params;
        Ok(())
    }

    /// Execute the agent. Non-essential step failures should degrade into
    /// annotated output rather than failing the whole run.
    async fn run(
        &self,
        params: serde_json::Value,
        deps: &AgentDeps,
    ) -> Result<String, AgentError>;
}

/// Public metadata for one registered agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub available: bool,
    pub requirements_met: bool,
    pub missing_requirements: Vec<String>,
    pub default_parameters: serde_json::Value,
    pub timeout_seconds: u64,
}

/// Static lookup from agent identifier to executable operation.
///
/// Built once at startup and shared by reference; there is no runtime
/// registration.
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            agents: HashMap::new(),
        }
    }

    /// Register an agent. Later registrations with the same id win.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        tracing::debug!(agent = %agent.id(), "Registered agent");
        self.agents.insert(agent.id().to_string(), agent);
    }

    /// Registry with all built-in agents.
    pub fn builtin(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EchoAgent));
        registry.register(Arc::new(DailyNewsAgent::new(
            settings.default_topics.clone(),
            settings.max_articles_per_topic,
        )));
        registry.register(Arc::new(GithubTrendingAgent::new(
            settings.github_token.clone(),
        )));
        registry
    }

    /// Look up an agent by id.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Agent>, AgentError> {
        self.agents
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound { id: id.to_string() })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Build descriptors for all agents, requirements checked against the
    /// given settings. Sorted by id for stable listings.
    pub fn descriptors(&self, settings: &Settings) -> Vec<AgentDescriptor> {
        let mut descriptors: Vec<AgentDescriptor> = self
            .agents
            .values()
            .map(|agent| {
                let missing = settings.missing_for(agent.required_capabilities());
                let requirements_met = missing.is_empty();
                AgentDescriptor {
                    id: agent.id().to_string(),
                    name: agent.name().to_string(),
                    description: agent.description().to_string(),
                    category: agent.category().to_string(),
                    available: requirements_met,
                    requirements_met,
                    missing_requirements: missing,
                    default_parameters: agent.default_parameters(),
                    timeout_seconds: agent
                        .timeout()
                        .unwrap_or(settings.default_timeout)
                        .as_secs(),
                }
            })
            .collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_expected_agents() {
        let registry = AgentRegistry::builtin(&Settings::default());
        assert!(registry.resolve("echo").is_ok());
        assert!(registry.resolve("daily-news").is_ok());
        assert!(registry.resolve("github-trending").is_ok());
        assert!(matches!(
            registry.resolve("nope"),
            Err(AgentError::NotFound { .. })
        ));
    }

    #[test]
    fn descriptors_are_sorted_and_reflect_requirements() {
        let registry = AgentRegistry::builtin(&Settings::default());
        let descriptors = registry.descriptors(&Settings::default());

        let ids: Vec<&str> = descriptors.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["daily-news", "echo", "github-trending"]);

        let news = descriptors.iter().find(|d| d.id == "daily-news").unwrap();
        // No completion key configured by default.
        assert!(!news.available);
        assert!(news.missing_requirements.contains(&"ANTHROPIC_API_KEY".to_string()));

        let echo = descriptors.iter().find(|d| d.id == "echo").unwrap();
        assert!(echo.available);
        assert!(echo.missing_requirements.is_empty());
    }

    #[test]
    fn deps_from_default_settings_have_keyless_providers_only() {
        let deps = AgentDeps::from_settings(&Settings::default()).unwrap();
        assert!(deps.completion.is_none());
        assert!(deps.search.is_some());
        assert!(deps.quotes.is_some());
        assert!(deps.scrape.is_none());
        assert!(deps.notifier.is_none());
    }

    #[test]
    fn missing_provider_accessors_report_unconfigured() {
        let deps = AgentDeps::none();
        assert!(matches!(
            deps.completion().err().unwrap(),
            ProviderError::Unconfigured { .. }
        ));
        assert!(matches!(
            deps.search().err().unwrap(),
            ProviderError::Unconfigured { .. }
        ));
    }
}
