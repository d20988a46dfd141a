//! Daily news research agent.
//!
//! Fixed pipeline per topic: plan search queries (completion) → search →
//! scrape each article (falling back to the search snippet) → write a topic
//! summary (completion). Afterwards a market snapshot, a TLDR, and final
//! assembly, with optional Telegram delivery.
//!
//! Failure policy: per-step failures degrade into annotated sections and the
//! job keeps going. Only missing essential providers or a validation error
//! fail the whole run.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;

use crate::agents::{Agent, AgentDeps, Capability};
use crate::error::AgentError;
use crate::llm::CompletionProvider;
use crate::providers::{QuoteProvider, ScrapeProvider, SearchHit, SearchProvider};

/// Queries issued per topic.
const QUERIES_PER_TOPIC: usize = 2;
/// Hits kept per query before the per-topic article cap applies.
const HITS_PER_QUERY: usize = 2;
/// Article content handed to the summarizer is capped to this many chars.
const CONTENT_HEAD_CHARS: usize = 500;

/// Symbols in the market snapshot, with their display labels.
const MARKET_SYMBOLS: &[(&str, &str)] = &[
    ("BTC-USD", "BTC price"),
    ("GC=F", "GOLD price"),
    ("EURCHF=X", "EUR/CHF"),
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NewsParams {
    topics: Option<Vec<String>>,
    max_articles_per_topic: Option<usize>,
    notify: Option<bool>,
}

struct ResolvedParams {
    topics: Vec<String>,
    max_articles: usize,
    notify: Option<bool>,
}

/// News research agent over the configured topic preset.
pub struct DailyNewsAgent {
    default_topics: Vec<String>,
    default_max_articles: usize,
}

impl DailyNewsAgent {
    pub fn new(default_topics: Vec<String>, default_max_articles: usize) -> Self {
        Self {
            default_topics,
            default_max_articles,
        }
    }

    fn resolve(&self, params: &serde_json::Value) -> Result<ResolvedParams, AgentError> {
        let raw: NewsParams = if params.is_null() {
            NewsParams::default()
        } else {
            serde_json::from_value(params.clone()).map_err(|e| AgentError::InvalidParameters {
                reason: e.to_string(),
            })?
        };

        let topics = match raw.topics {
            Some(topics) => {
                let topics: Vec<String> = topics
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                if topics.is_empty() {
                    return Err(AgentError::InvalidParameters {
                        reason: "'topics' must contain at least one non-empty entry".to_string(),
                    });
                }
                if topics.len() > 10 {
                    return Err(AgentError::InvalidParameters {
                        reason: "at most 10 topics are allowed".to_string(),
                    });
                }
                topics
            }
            None => self.default_topics.clone(),
        };

        let max_articles = raw.max_articles_per_topic.unwrap_or(self.default_max_articles);
        if !(1..=10).contains(&max_articles) {
            return Err(AgentError::InvalidParameters {
                reason: "'max_articles_per_topic' must be between 1 and 10".to_string(),
            });
        }

        Ok(ResolvedParams {
            topics,
            max_articles,
            notify: raw.notify,
        })
    }
}

#[async_trait]
impl Agent for DailyNewsAgent {
    fn id(&self) -> &str {
        "daily-news"
    }

    fn name(&self) -> &str {
        "Daily News Agent"
    }

    fn description(&self) -> &str {
        "Researches news per topic, summarizes it with market data, and optionally delivers via Telegram"
    }

    fn category(&self) -> &str {
        "news"
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(600))
    }

    fn required_capabilities(&self) -> &[Capability] {
        &[Capability::Completion, Capability::Search]
    }

    fn default_parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "topics": self.default_topics,
            "max_articles_per_topic": self.default_max_articles,
        })
    }

    fn validate_parameters(&self, params: &serde_json::Value) -> Result<(), AgentError> {
        self.resolve(params).map(|_| ())
    }

    async fn run(
        &self,
        params: serde_json::Value,
        deps: &AgentDeps,
    ) -> Result<String, AgentError> {
        let resolved = self.resolve(&params)?;
        let completion = deps.completion()?;
        let search = deps.search()?;

        let mut sections = Vec::with_capacity(resolved.topics.len());
        for topic in &resolved.topics {
            let section = research_topic(
                topic,
                resolved.max_articles,
                completion.as_ref(),
                search.as_ref(),
                deps.scrape.as_deref(),
            )
            .await;
            sections.push(section);
        }

        let market = market_snapshot(deps.quotes.as_deref()).await;
        let tldr = generate_tldr(completion.as_ref(), &sections).await;
        let mut message = assemble(&market, &tldr, &sections);

        let should_notify = resolved.notify.unwrap_or(deps.notifier.is_some());
        if should_notify {
            match &deps.notifier {
                Some(notifier) => {
                    if let Err(e) = notifier.send(&message).await {
                        tracing::warn!(error = %e, "News delivery failed");
                        message
                            .push_str("\n\n_Delivery failed; result available via the API only._");
                    }
                }
                None => {
                    tracing::warn!("Notification requested but no channel is configured");
                    message.push_str("\n\n_Notification channel not configured._");
                }
            }
        }

        Ok(message)
    }
}

/// Research one topic. Never fails; every failure mode degrades into an
/// annotated section.
async fn research_topic(
    topic: &str,
    max_articles: usize,
    completion: &dyn CompletionProvider,
    search: &dyn SearchProvider,
    scrape: Option<&dyn ScrapeProvider>,
) -> String {
    let queries = plan_queries(completion, topic).await;

    let mut articles: Vec<SearchHit> = Vec::new();
    for query in queries.iter().take(QUERIES_PER_TOPIC) {
        match search.search(query).await {
            Ok(hits) => {
                for hit in hits.into_iter().take(HITS_PER_QUERY) {
                    if !articles.iter().any(|a| a.url == hit.url) {
                        articles.push(hit);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(topic = %topic, query = %query, error = %e, "Search failed, continuing");
            }
        }
    }

    if articles.is_empty() {
        return format!("*{topic}*\n_No recent news available._");
    }
    articles.truncate(max_articles);

    let mut digest = String::new();
    for hit in &articles {
        let content = match scrape {
            Some(provider) => match provider.scrape(&hit.url).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(url = %hit.url, error = %e, "Scrape failed, using search snippet");
                    hit.snippet.clone()
                }
            },
            None => hit.snippet.clone(),
        };
        digest.push_str(&format!(
            "- {} ({})\n  {}\n",
            hit.title,
            hit.url,
            head(&content, CONTENT_HEAD_CHARS)
        ));
    }

    let prompt = format!(
        "Write a short markdown summary section for the topic '{topic}' from these articles. \
         Use 2-3 bullet points with • and *bold* for key terms, include article links as \
         [text](url), and keep it under 800 characters. Return only the section body.\n\n{digest}"
    );

    match completion.complete(&prompt).await {
        Ok(body) => format!("*{topic}*\n{}", body.trim()),
        Err(e) => {
            tracing::warn!(topic = %topic, error = %e, "Topic summary failed, emitting headlines only");
            let bullets = articles
                .iter()
                .map(|a| format!("• {} — {}", a.title, a.url))
                .collect::<Vec<_>>()
                .join("\n");
            format!("*{topic}*\n{bullets}\n_Summary unavailable._")
        }
    }
}

/// Ask the completion provider for search queries; fall back to generic ones
/// when planning fails or returns garbage.
async fn plan_queries(completion: &dyn CompletionProvider, topic: &str) -> Vec<String> {
    let today = Utc::now().format("%Y-%m-%d");
    let prompt = format!(
        "Generate 2 or 3 targeted news search queries for the topic '{topic}' as of {today}. \
         Prefer recent coverage from authoritative sources. \
         Respond with a JSON array of strings and nothing else."
    );
    let fallback = || {
        vec![
            format!("latest {topic} news today"),
            format!("{topic} breaking news {today}"),
        ]
    };

    match completion.complete(&prompt).await {
        Ok(text) => {
            match extract_json(&text).and_then(|v| serde_json::from_value::<Vec<String>>(v).ok()) {
                Some(queries) if !queries.is_empty() => queries,
                _ => {
                    tracing::warn!(topic = %topic, "Could not parse planned queries, using fallback");
                    fallback()
                }
            }
        }
        Err(e) => {
            tracing::warn!(topic = %topic, error = %e, "Query planning failed, using fallback");
            fallback()
        }
    }
}

/// Current prices for the snapshot symbols; failures become explicit
/// "unavailable" markers and never block the rest of the job.
async fn market_snapshot(quotes: Option<&dyn QuoteProvider>) -> String {
    let mut lines = Vec::with_capacity(MARKET_SYMBOLS.len());
    for (symbol, label) in MARKET_SYMBOLS {
        let value = match quotes {
            Some(provider) => match provider.quote(symbol).await {
                Ok(quote) => quote.price.round_dp(2).to_string(),
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Quote lookup failed");
                    "unavailable".to_string()
                }
            },
            None => "unavailable".to_string(),
        };
        lines.push(format!("*{label}:* {value}"));
    }
    lines.join("\n")
}

async fn generate_tldr(completion: &dyn CompletionProvider, sections: &[String]) -> String {
    let prompt = format!(
        "Write a TLDR of the following news sections in one or two plain-text sentences, \
         under 150 characters, present tense, no emojis. Return only the TLDR text.\n\n{}",
        sections.join("\n\n")
    );
    match completion.complete(&prompt).await {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "TLDR generation failed, using fallback");
            "Key developments across today's topics.".to_string()
        }
    }
}

fn assemble(market: &str, tldr: &str, sections: &[String]) -> String {
    let date = Utc::now().format("%B %d, %Y");
    format!(
        "*News Agent - {date}*\n\n{market}\n\n*TLDR:* {tldr}\n\n{}",
        sections.join("\n\n")
    )
}

/// Pull a JSON value out of an LLM response: fenced block first, then the
/// widest braced/bracketed span, then the whole text.
fn extract_json(text: &str) -> Option<serde_json::Value> {
    static FENCED: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("static regex"));

    if let Some(cap) = FENCED.captures(text)
        && let Ok(value) = serde_json::from_str(cap[1].trim())
    {
        return Some(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close))
            && start < end
            && let Ok(value) = serde_json::from_str(&text[start..=end])
        {
            return Some(value);
        }
    }

    serde_json::from_str(text.trim()).ok()
}

fn head(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
