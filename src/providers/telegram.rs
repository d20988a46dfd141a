//! Telegram notification adapter.
//!
//! Sends via the Bot API, Markdown-first with a plain-text fallback. Texts
//! longer than Telegram's per-message limit are split into ordered chunks,
//! each sent (and retried) independently.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::providers::Notifier;

/// Hard limit of Telegram's sendMessage API, in characters.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Transport-level retries per chunk.
const SEND_ATTEMPTS: usize = 2;

/// Notifier that delivers to a single Telegram chat.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    fn send_failed(reason: impl std::fmt::Display) -> ProviderError {
        ProviderError::RequestFailed {
            provider: "telegram".to_string(),
            reason: reason.to_string(),
        }
    }

    async fn post_message(
        &self,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.to_string());
        }

        let mut last_err = None;
        for attempt in 1..=SEND_ATTEMPTS {
            match self
                .client
                .post(self.api_url("sendMessage"))
                .json(&body)
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Telegram sendMessage transport error");
                    last_err = Some(e);
                }
            }
        }
        Err(Self::send_failed(last_err.expect("at least one attempt")))
    }

    /// Send one chunk, Markdown-first. Telegram rejects malformed markup with
    /// a 400, so a failed parse falls back to plain text.
    async fn send_chunk(&self, text: &str) -> Result<(), ProviderError> {
        let markdown = self.post_message(text, Some("Markdown")).await?;
        if markdown.status().is_success() {
            return Ok(());
        }
        let markdown_status = markdown.status();
        tracing::warn!(
            status = %markdown_status,
            "Telegram rejected Markdown message, retrying as plain text"
        );

        let plain = self.post_message(text, None).await?;
        if plain.status().is_success() {
            return Ok(());
        }
        if plain.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                provider: "telegram".to_string(),
            });
        }
        let detail = plain.text().await.unwrap_or_default();
        Err(Self::send_failed(format!(
            "sendMessage failed (markdown: {markdown_status}, plain: {detail})"
        )))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), ProviderError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            self.send_chunk(chunk).await?;
            tracing::debug!(part = i + 1, total, "Telegram chunk delivered");
        }
        Ok(())
    }
}

/// Split a message into ordered chunks of at most `max_len` characters,
/// preferring newline and space boundaries over hard cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset of the character just past the limit, if any.
        let Some((limit, _)) = remaining.char_indices().nth(max_len) else {
            chunks.push(remaining.to_string());
            break;
        };

        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&at| at > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_embeds_token_and_method() {
        let notifier = TelegramNotifier::new("123:ABC".into(), "42".into());
        assert_eq!(
            notifier.api_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[test]
    fn short_message_is_one_chunk() {
        assert_eq!(split_message("hello", 4096), vec!["hello"]);
    }

    #[test]
    fn exact_limit_is_one_chunk() {
        let text = "a".repeat(4096);
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), 4096);
    }

    #[test]
    fn nine_thousand_chars_split_into_three_ordered_parts() {
        let text = "a".repeat(9000);
        let chunks = split_message(&text, TELEGRAM_MAX_MESSAGE_LENGTH);

        assert!(chunks.len() >= 3, "expected at least 3 parts, got {}", chunks.len());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= TELEGRAM_MAX_MESSAGE_LENGTH);
        }
        // Reassembles in order (no whitespace to lose in this input).
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn splits_prefer_newlines() {
        let text = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn splits_fall_back_to_spaces() {
        let text = format!("{} {}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "ß".repeat(5000);
        let chunks = split_message(&text, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 4096);
        assert_eq!(chunks[1].chars().count(), 904);
    }

    #[tokio::test]
    async fn send_with_bad_token_fails_with_provider_error() {
        // No server behind this token; transport or HTTP failure either way.
        let notifier = TelegramNotifier::new("invalid".into(), "1".into());
        let result = notifier.send("hello").await;
        assert!(result.is_err());
    }
}
