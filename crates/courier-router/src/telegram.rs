//! Telegram Bot API client for notification delivery.

use std::time::Duration;

use serde_json::{json, Value};

use crate::RouterError;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramNotifierConfig {
    pub api_base: String,
    pub bot_token: String,
    /// Channel receiving the masked broadcast copy of every OTP.
    pub broadcast_chat_id: Option<String>,
    pub http_timeout: Duration,
}

impl Default for TelegramNotifierConfig {
    fn default() -> Self {
        Self {
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token: String::new(),
            broadcast_chat_id: None,
            http_timeout: Duration::from_secs(15),
        }
    }
}

/// Thin `sendMessage` wrapper with markdown fallback.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    config: TelegramNotifierConfig,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramNotifierConfig) -> Result<Self, RouterError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn broadcast_chat_id(&self) -> Option<&str> {
        self.config.broadcast_chat_id.as_deref()
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    /// Sends the MarkdownV2 payload, retrying once as plain text when
    /// Telegram rejects the markup. Markup rejections come back as HTTP
    /// 400 with `ok: false`, so any API-level rejection triggers the
    /// fallback.
    pub async fn send_with_fallback(
        &self,
        chat_id: &str,
        markdown: &str,
        plain: &str,
    ) -> Result<(), RouterError> {
        match self.send(chat_id, markdown, Some("MarkdownV2")).await {
            Ok(()) => Ok(()),
            Err(RouterError::Rejected(reason)) => {
                tracing::debug!(chat_id, reason, "markdown payload rejected, sending plain");
                self.send(chat_id, plain, None).await
            }
            Err(error) => Err(error),
        }
    }

    async fn send(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), RouterError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(mode) = parse_mode {
            if let Value::Object(map) = &mut body {
                map.insert("parse_mode".to_string(), Value::String(mode.to_string()));
            }
        }
        let response = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(RouterError::Rejected(format!("http {status}: {detail}")))
    }
}
