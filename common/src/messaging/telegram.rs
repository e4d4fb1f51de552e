use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::MessagingGateway;
use crate::config::TelegramConfig;
use crate::errors::DeliveryError;

/// A gateway for pushing messages via the Telegram Bot API.
pub struct TelegramGateway {
    client: Client,
    api_url: String,
}

impl TelegramGateway {
    pub fn new(config: &TelegramConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DeliveryError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: format!(
                "{}/bot{}/sendMessage",
                config.api_base_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }
}

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send(&self, destination_id: i64, text: &str) -> Result<(), DeliveryError> {
        let payload = TelegramMessage {
            chat_id: destination_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self.client.post(&self.api_url).json(&payload).send().await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response body".to_string());

        // The Bot API answers with {"ok": false, "description": ...} on rejection
        let parsed: Option<TelegramResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(TelegramResponse { description, .. }) => Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description: description.unwrap_or(body),
            }),
            None => Err(DeliveryError::Rejected {
                status: status.as_u16(),
                description: body,
            }),
        }
    }
}
