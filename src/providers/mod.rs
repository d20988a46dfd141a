//! External provider contracts and adapters.
//!
//! Each provider is a narrow request/response trait; agents consume them
//! through [`crate::agents::AgentDeps`]. Adapters here talk to DuckDuckGo,
//! Firecrawl, Yahoo Finance, and the Telegram Bot API.

pub mod quote;
pub mod scrape;
pub mod search;
pub mod telegram;

pub use quote::{Quote, YahooQuotes};
pub use scrape::FirecrawlScraper;
pub use search::{DuckDuckGoSearch, SearchHit};
pub use telegram::TelegramNotifier;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Web search: query in, ordered hits out. May legitimately return nothing.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ProviderError>;
}

/// Full-text extraction for a single URL.
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<String, ProviderError>;
}

/// Market quote lookup for a single symbol.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote, ProviderError>;
}

/// Outbound notification delivery. Implementations are responsible for
/// channel-specific length limits and chunking.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), ProviderError>;
}
