//! Firecrawl scrape adapter.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ProviderError;
use crate::providers::ScrapeProvider;

const SCRAPE_ENDPOINT: &str = "https://api.firecrawl.dev/v1/scrape";

/// Cap on returned article text; the summarizer only ever sees the head of
/// the article anyway.
const MAX_CONTENT_CHARS: usize = 6_000;

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    success: bool,
    #[serde(default)]
    data: Option<ScrapeData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    markdown: Option<String>,
}

/// Scrape provider backed by the Firecrawl API.
pub struct FirecrawlScraper {
    api_key: SecretString,
    client: reqwest::Client,
}

impl FirecrawlScraper {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn request_failed(reason: impl std::fmt::Display) -> ProviderError {
        ProviderError::RequestFailed {
            provider: "firecrawl".to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ScrapeProvider for FirecrawlScraper {
    async fn scrape(&self, url: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(SCRAPE_ENDPOINT)
            .bearer_auth(self.api_key.expose_secret())
            .json(&serde_json::json!({
                "url": url,
                "formats": ["markdown"],
                "onlyMainContent": true,
            }))
            .send()
            .await
            .map_err(Self::request_failed)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                provider: "firecrawl".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(Self::request_failed(format!(
                "scrape returned {}",
                response.status()
            )));
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: "firecrawl".to_string(),
                reason: e.to_string(),
            })?;

        if !body.success {
            return Err(Self::request_failed(
                body.error.unwrap_or_else(|| "scrape unsuccessful".to_string()),
            ));
        }

        let markdown = body
            .data
            .and_then(|d| d.markdown)
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: "firecrawl".to_string(),
                reason: "response contained no markdown content".to_string(),
            })?;

        Ok(truncate_chars(&markdown, MAX_CONTENT_CHARS))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parsing_happy_path() {
        let json = r##"{"success": true, "data": {"markdown": "# Headline\n\nBody text."}}"##;
        let parsed: ScrapeResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.success);
        assert_eq!(
            parsed.data.unwrap().markdown.as_deref(),
            Some("# Headline\n\nBody text.")
        );
    }

    #[test]
    fn response_parsing_error_shape() {
        let json = r#"{"success": false, "error": "blocked by robots.txt"}"#;
        let parsed: ScrapeResponse = serde_json::from_str(json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("blocked by robots.txt"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "héllo wörld".repeat(1000);
        let truncated = truncate_chars(&text, 100);
        assert_eq!(truncated.chars().count(), 100);
    }

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
