//! Market quote adapter backed by the Yahoo Finance chart endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;

use crate::error::ProviderError;
use crate::providers::QuoteProvider;

const CHART_ENDPOINT: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// A single market quote.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "regularMarketTime")]
    regular_market_time: Option<i64>,
}

/// Quote provider using Yahoo's keyless chart API.
pub struct YahooQuotes {
    client: reqwest::Client,
}

impl YahooQuotes {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn invalid(reason: impl std::fmt::Display) -> ProviderError {
        ProviderError::InvalidResponse {
            provider: "yahoo-finance".to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Default for YahooQuotes {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteProvider for YahooQuotes {
    async fn quote(&self, symbol: &str) -> Result<Quote, ProviderError> {
        let response = self
            .client
            .get(format!("{CHART_ENDPOINT}/{symbol}"))
            .header("User-Agent", "agent-hub/0.1")
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: "yahoo-finance".to_string(),
                reason: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                provider: "yahoo-finance".to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(ProviderError::RequestFailed {
                provider: "yahoo-finance".to_string(),
                reason: format!("chart returned {}", response.status()),
            });
        }

        let body: ChartResponse = response.json().await.map_err(Self::invalid)?;
        parse_quote(symbol, body)
    }
}

fn parse_quote(symbol: &str, body: ChartResponse) -> Result<Quote, ProviderError> {
    if let Some(error) = body.chart.error {
        if !error.is_null() {
            return Err(YahooQuotes::invalid(error));
        }
    }

    let meta = body
        .chart
        .result
        .and_then(|mut r| r.pop())
        .map(|r| r.meta)
        .ok_or_else(|| YahooQuotes::invalid("empty chart result"))?;

    let price = meta
        .regular_market_price
        .and_then(Decimal::from_f64)
        .ok_or_else(|| YahooQuotes::invalid("missing regularMarketPrice"))?;

    let at = meta
        .regular_market_time
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    Ok(Quote {
        symbol: symbol.to_string(),
        price,
        at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn chart_json(price: f64, time: i64) -> ChartResponse {
        serde_json::from_value(serde_json::json!({
            "chart": {
                "result": [{"meta": {
                    "regularMarketPrice": price,
                    "regularMarketTime": time,
                }}],
                "error": null,
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_price_and_timestamp() {
        let quote = parse_quote("BTC-USD", chart_json(64250.5, 1_754_000_000)).unwrap();
        assert_eq!(quote.symbol, "BTC-USD");
        assert_eq!(quote.price, dec!(64250.5));
        assert_eq!(quote.at.timestamp(), 1_754_000_000);
    }

    #[test]
    fn missing_price_is_invalid_response() {
        let body: ChartResponse = serde_json::from_value(serde_json::json!({
            "chart": {"result": [{"meta": {}}], "error": null}
        }))
        .unwrap();
        let err = parse_quote("GC=F", body).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }

    #[test]
    fn chart_error_is_surfaced() {
        let body: ChartResponse = serde_json::from_value(serde_json::json!({
            "chart": {"result": null, "error": {"code": "Not Found"}}
        }))
        .unwrap();
        let err = parse_quote("NOPE", body).unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }
}
