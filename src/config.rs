//! Service configuration, loaded from the environment.

use std::time::Duration;

use secrecy::SecretString;

use crate::agents::Capability;
use crate::error::ConfigError;
use crate::llm::LlmBackend;
use crate::schedule::ScheduleEntry;

/// Topics researched when an execute request does not name its own.
pub const DEFAULT_TOPICS: &[&str] = &[
    "Bitcoin cryptocurrency",
    "Artificial Intelligence AI",
    "Politics elections",
    "Finance markets",
];

/// What to do with execute requests arriving while all job slots are busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    /// Accept the job; it stays `pending` until a slot frees.
    Queue,
    /// Reject the request with a 429-equivalent error.
    Reject,
}

impl QueuePolicy {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::InvalidValue {
                key: "AGENT_HUB_QUEUE_FULL".to_string(),
                message: format!("expected 'queue' or 'reject', got '{other}'"),
            }),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bind address for the HTTP server.
    pub host: String,
    /// Bind port for the HTTP server.
    pub port: u16,
    /// Which hosted completion backend to use.
    pub llm_backend: LlmBackend,
    /// API key for the completion backend.
    pub llm_api_key: Option<SecretString>,
    /// Model identifier passed to the completion backend.
    pub llm_model: String,
    /// Firecrawl API key (scrape provider).
    pub firecrawl_api_key: Option<SecretString>,
    /// Telegram bot token (notification provider).
    pub telegram_bot_token: Option<String>,
    /// Telegram chat to deliver notifications to.
    pub telegram_chat_id: Option<String>,
    /// GitHub token for the trending agent (optional, raises rate limits).
    pub github_token: Option<String>,
    /// Maximum number of concurrently running jobs.
    pub max_concurrent_jobs: usize,
    /// Default per-job timeout, used when an agent does not set its own.
    pub default_timeout: Duration,
    /// Behavior when the concurrency limit is reached.
    pub queue_policy: QueuePolicy,
    /// Default topic preset for the news agent.
    pub default_topics: Vec<String>,
    /// Default article cap per topic.
    pub max_articles_per_topic: usize,
    /// Scheduled executions ("agent-id=cron expr" entries).
    pub schedule: Vec<ScheduleEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            llm_backend: LlmBackend::Anthropic,
            llm_api_key: None,
            llm_model: "claude-sonnet-4-20250514".to_string(),
            firecrawl_api_key: None,
            telegram_bot_token: None,
            telegram_chat_id: None,
            github_token: None,
            max_concurrent_jobs: 3,
            default_timeout: Duration::from_secs(600),
            queue_policy: QueuePolicy::Queue,
            default_topics: DEFAULT_TOPICS.iter().map(|s| s.to_string()).collect(),
            max_articles_per_topic: 3,
            schedule: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Ok(host) = std::env::var("AGENT_HUB_HOST") {
            settings.host = host;
        }
        if let Some(port) = env_parse::<u16>("AGENT_HUB_PORT")? {
            settings.port = port;
        }

        // Backend selection: explicit env wins, otherwise whichever key is set.
        let anthropic_key = env_opt("ANTHROPIC_API_KEY");
        let openai_key = env_opt("OPENAI_API_KEY");
        settings.llm_backend = match std::env::var("AGENT_HUB_LLM_BACKEND").ok().as_deref() {
            Some("anthropic") => LlmBackend::Anthropic,
            Some("openai") => LlmBackend::OpenAi,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "AGENT_HUB_LLM_BACKEND".to_string(),
                    message: format!("expected 'anthropic' or 'openai', got '{other}'"),
                });
            }
            None if anthropic_key.is_none() && openai_key.is_some() => LlmBackend::OpenAi,
            None => LlmBackend::Anthropic,
        };
        settings.llm_api_key = match settings.llm_backend {
            LlmBackend::Anthropic => anthropic_key.map(SecretString::from),
            LlmBackend::OpenAi => openai_key.map(SecretString::from),
        };
        if let Ok(model) = std::env::var("AGENT_HUB_MODEL") {
            settings.llm_model = model;
        } else if settings.llm_backend == LlmBackend::OpenAi {
            settings.llm_model = "gpt-4.1-mini".to_string();
        }

        settings.firecrawl_api_key = env_opt("FIRECRAWL_API_KEY").map(SecretString::from);
        settings.telegram_bot_token = env_opt("TELEGRAM_BOT_TOKEN");
        settings.telegram_chat_id = env_opt("TELEGRAM_CHAT_ID");
        settings.github_token = env_opt("GITHUB_TOKEN");

        if let Some(max) = env_parse::<usize>("AGENT_HUB_MAX_CONCURRENT_JOBS")? {
            if max < 1 {
                return Err(ConfigError::InvalidValue {
                    key: "AGENT_HUB_MAX_CONCURRENT_JOBS".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            settings.max_concurrent_jobs = max;
        }
        if let Some(secs) = env_parse::<u64>("AGENT_HUB_JOB_TIMEOUT_SECS")? {
            if secs < 1 {
                return Err(ConfigError::InvalidValue {
                    key: "AGENT_HUB_JOB_TIMEOUT_SECS".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            settings.default_timeout = Duration::from_secs(secs);
        }
        if let Ok(policy) = std::env::var("AGENT_HUB_QUEUE_FULL") {
            settings.queue_policy = QueuePolicy::parse(&policy)?;
        }

        if let Ok(topics) = std::env::var("AGENT_HUB_TOPICS") {
            let topics: Vec<String> = topics
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if topics.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "AGENT_HUB_TOPICS".to_string(),
                    message: "must contain at least one topic".to_string(),
                });
            }
            settings.default_topics = topics;
        }
        if let Some(max) = env_parse::<usize>("AGENT_HUB_MAX_ARTICLES_PER_TOPIC")? {
            if !(1..=10).contains(&max) {
                return Err(ConfigError::InvalidValue {
                    key: "AGENT_HUB_MAX_ARTICLES_PER_TOPIC".to_string(),
                    message: "must be between 1 and 10".to_string(),
                });
            }
            settings.max_articles_per_topic = max;
        }

        if let Ok(spec) = std::env::var("AGENT_HUB_SCHEDULE") {
            settings.schedule = ScheduleEntry::parse_list(&spec)?;
        }

        Ok(settings)
    }

    /// Environment variable names that are missing for the given capabilities.
    ///
    /// Search and quotes use keyless public endpoints, so they never report
    /// anything missing.
    pub fn missing_for(&self, capabilities: &[Capability]) -> Vec<String> {
        let mut missing = Vec::new();
        for capability in capabilities {
            match capability {
                Capability::Completion => {
                    if self.llm_api_key.is_none() {
                        missing.push(match self.llm_backend {
                            LlmBackend::Anthropic => "ANTHROPIC_API_KEY".to_string(),
                            LlmBackend::OpenAi => "OPENAI_API_KEY".to_string(),
                        });
                    }
                }
                Capability::Search | Capability::Quotes => {}
                Capability::Scrape => {
                    if self.firecrawl_api_key.is_none() {
                        missing.push("FIRECRAWL_API_KEY".to_string());
                    }
                }
                Capability::Telegram => {
                    if self.telegram_bot_token.is_none() {
                        missing.push("TELEGRAM_BOT_TOKEN".to_string());
                    }
                    if self.telegram_chat_id.is_none() {
                        missing.push("TELEGRAM_CHAT_ID".to_string());
                    }
                }
            }
        }
        missing
    }

    /// Check whether a single capability is fully configured.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.missing_for(&[capability]).is_empty()
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("could not parse '{value}'"),
        }),
        Err(_) => Ok(None),
    }
}
