//! DuckDuckGo search adapter.
//!
//! Uses the keyless HTML endpoint and extracts results with regexes; there is
//! no official JSON API. Good enough for the handful of hits per query the
//! news pipeline consumes.

use async_trait::async_trait;
use regex::Regex;

use crate::error::ProviderError;
use crate::providers::SearchProvider;

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// One search result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Search provider backed by DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    result_re: Regex,
    snippet_re: Regex,
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            // Anchor markup is stable on the html.duckduckgo.com frontend.
            result_re: Regex::new(
                r#"<a[^>]*class="result__a"[^>]*href="(?P<url>[^"]+)"[^>]*>(?P<title>.*?)</a>"#,
            )
            .expect("static regex"),
            snippet_re: Regex::new(
                r#"<a[^>]*class="result__snippet"[^>]*>(?P<snippet>.*?)</a>"#,
            )
            .expect("static regex"),
        }
    }

    fn request_failed(reason: impl std::fmt::Display) -> ProviderError {
        ProviderError::RequestFailed {
            provider: "duckduckgo".to_string(),
            reason: reason.to_string(),
        }
    }

    /// Extract hits from a results page.
    fn parse_results(&self, html: &str) -> Vec<SearchHit> {
        let snippets: Vec<String> = self
            .snippet_re
            .captures_iter(html)
            .map(|cap| strip_tags(&cap["snippet"]))
            .collect();

        self.result_re
            .captures_iter(html)
            .enumerate()
            .filter_map(|(i, cap)| {
                let url = decode_result_url(&cap["url"])?;
                Some(SearchHit {
                    title: strip_tags(&cap["title"]),
                    url,
                    snippet: snippets.get(i).cloned().unwrap_or_default(),
                })
            })
            .collect()
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let response = self
            .client
            .post(SEARCH_ENDPOINT)
            .header("User-Agent", "agent-hub/0.1")
            .form(&[("q", query)])
            .send()
            .await
            .map_err(Self::request_failed)?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                provider: "duckduckgo".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(Self::request_failed(format!(
                "search returned {}",
                response.status()
            )));
        }

        let html = response.text().await.map_err(Self::request_failed)?;
        Ok(self.parse_results(&html))
    }
}

/// DuckDuckGo wraps result links in a redirect (`/l/?uddg=<encoded>`);
/// unwrap to the target URL. Direct links pass through.
fn decode_result_url(href: &str) -> Option<String> {
    if let Some(idx) = href.find("uddg=") {
        let encoded = &href[idx + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        return percent_decode(encoded);
    }
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    None
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

/// Drop markup and collapse entities the endpoint commonly emits.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .trim()
        .to_string()
}
