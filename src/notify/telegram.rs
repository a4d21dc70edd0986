use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Notifier, ParseMode};
use crate::config::TelegramConfig;
use crate::constants::notify::SEND_TIMEOUT;
use crate::error::NotifyError;

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: i64,
}

#[derive(Serialize, Debug)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Deserialize, Debug)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(SEND_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id,
        })
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    pub async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        self.send_message_with_parse_mode(text, ParseMode::Html).await
    }

    pub async fn send_markdown_message(&self, text: &str) -> Result<(), NotifyError> {
        self.send_message_with_parse_mode(text, ParseMode::MarkdownV2).await
    }

    pub async fn send_message_with_parse_mode(
        &self,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let body = SendMessageRequest {
            chat_id: self.chat_id,
            text,
            parse_mode: Some(parse_mode.as_str()),
        };

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        let raw = resp.text().await?;

        let response: SendMessageResponse =
            serde_json::from_str(&raw).map_err(|_| NotifyError::Response {
                status,
                body: raw.chars().take(200).collect(),
            })?;

        if !response.ok {
            return Err(NotifyError::Api {
                status,
                description: response
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        debug!("📨 [TELEGRAM] Delivered {} chars to chat {}", text.len(), self.chat_id);
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.send_message(text).await
    }
}
