//! GitHub trending repositories agent.
//!
//! Queries the GitHub search API for the most-starred repositories created in
//! the last N days and formats a report. A token is optional but raises the
//! unauthenticated rate limit.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::agents::{Agent, AgentDeps, Capability};
use crate::error::{AgentError, ProviderError};

const SEARCH_ENDPOINT: &str = "https://api.github.com/search/repositories";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrendingParams {
    days_back: Option<i64>,
    max_repos: Option<usize>,
    notify: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    stargazers_count: u64,
    #[serde(default)]
    language: Option<String>,
}

pub struct GithubTrendingAgent {
    token: Option<String>,
    client: reqwest::Client,
}

impl GithubTrendingAgent {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            client: reqwest::Client::new(),
        }
    }

    fn resolve(params: &serde_json::Value) -> Result<(i64, usize, Option<bool>), AgentError> {
        let raw: TrendingParams = if params.is_null() {
            TrendingParams::default()
        } else {
            serde_json::from_value(params.clone()).map_err(|e| AgentError::InvalidParameters {
                reason: e.to_string(),
            })?
        };

        let days_back = raw.days_back.unwrap_or(7);
        if !(1..=30).contains(&days_back) {
            return Err(AgentError::InvalidParameters {
                reason: "'days_back' must be between 1 and 30".to_string(),
            });
        }
        let max_repos = raw.max_repos.unwrap_or(10);
        if !(1..=25).contains(&max_repos) {
            return Err(AgentError::InvalidParameters {
                reason: "'max_repos' must be between 1 and 25".to_string(),
            });
        }
        Ok((days_back, max_repos, raw.notify))
    }

    async fn fetch(&self, days_back: i64, max_repos: usize) -> Result<Vec<RepoItem>, ProviderError> {
        let since = (Utc::now() - chrono::Duration::days(days_back))
            .format("%Y-%m-%d")
            .to_string();

        let mut request = self
            .client
            .get(SEARCH_ENDPOINT)
            .header("User-Agent", "agent-hub/0.1")
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("q", format!("created:>{since}")),
                ("sort", "stars".to_string()),
                ("order", "desc".to_string()),
                ("per_page", max_repos.to_string()),
            ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| ProviderError::RequestFailed {
            provider: "github".to_string(),
            reason: e.to_string(),
        })?;

        if response.status() == reqwest::StatusCode::FORBIDDEN
            || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            return Err(ProviderError::RateLimited {
                provider: "github".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(ProviderError::RequestFailed {
                provider: "github".to_string(),
                reason: format!("search returned {}", response.status()),
            });
        }

        let body: SearchBody = response.json().await.map_err(|e| ProviderError::InvalidResponse {
            provider: "github".to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.items)
    }
}

#[async_trait]
impl Agent for GithubTrendingAgent {
    fn id(&self) -> &str {
        "github-trending"
    }

    fn name(&self) -> &str {
        "GitHub Trending Agent"
    }

    fn description(&self) -> &str {
        "Reports the most-starred GitHub repositories created recently"
    }

    fn category(&self) -> &str {
        "research"
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(300))
    }

    fn required_capabilities(&self) -> &[Capability] {
        &[]
    }

    fn default_parameters(&self) -> serde_json::Value {
        serde_json::json!({ "days_back": 7, "max_repos": 10 })
    }

    fn validate_parameters(&self, params: &serde_json::Value) -> Result<(), AgentError> {
        Self::resolve(params).map(|_| ())
    }

    async fn run(
        &self,
        params: serde_json::Value,
        deps: &AgentDeps,
    ) -> Result<String, AgentError> {
        let (days_back, max_repos, notify) = Self::resolve(&params)?;

        // The fetch is the essential step; there is nothing to degrade to.
        let items = self.fetch(days_back, max_repos).await?;
        let mut report = format_report(days_back, &items);

        if notify.unwrap_or(false) {
            match &deps.notifier {
                Some(notifier) => {
                    if let Err(e) = notifier.send(&report).await {
                        tracing::warn!(error = %e, "Trending report delivery failed");
                        report
                            .push_str("\n\n_Delivery failed; result available via the API only._");
                    }
                }
                None => {
                    report.push_str("\n\n_Notification channel not configured._");
                }
            }
        }

        Ok(report)
    }
}

fn format_report(days_back: i64, items: &[RepoItem]) -> String {
    let mut report = format!("*GitHub Trending - last {days_back} days*\n");
    if items.is_empty() {
        report.push_str("\n_No repositories found._");
        return report;
    }
    for (i, repo) in items.iter().enumerate() {
        report.push_str(&format!(
            "\n{}. [{}]({}) ⭐ {}{}\n   {}",
            i + 1,
            repo.full_name,
            repo.html_url,
            repo.stargazers_count,
            repo.language
                .as_deref()
                .map(|l| format!(" ({l})"))
                .unwrap_or_default(),
            repo.description.as_deref().unwrap_or("(no description)"),
        ));
    }
    report
}
