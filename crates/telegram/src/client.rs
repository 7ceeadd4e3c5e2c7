use std::time::Duration;

use ailvi_core::{CoreError, Outbox, UserId};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::TelegramError;
use crate::types::{ApiResponse, Update};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Long-poll wait passed to `getUpdates`. The HTTP timeout must exceed it.
pub const POLL_TIMEOUT_SECS: u64 = 25;
const HTTP_TIMEOUT_SECS: u64 = 60;

/// Minimal Bot API client: the four methods the bot uses.
pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("token", &"***")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(token: String) -> Result<Self, TelegramError> {
        Self::with_base_url(token, DEFAULT_API_BASE.to_owned())
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(token: String, base_url: String) -> Result<Self, TelegramError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| TelegramError::ClientInit(e.to_string()))?;
        Ok(Self { client, token, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// Updates after `offset`, waiting up to `timeout_secs` for new ones.
    ///
    /// # Errors
    /// Transport, API or parse failure.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({ "timeout": timeout_secs, "allowed_updates": ["message"] });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body).await
    }

    /// Sends `text` with HTML parse mode. If Telegram rejects the markup the
    /// text is sent again as plain text.
    ///
    /// # Errors
    /// Transport, API or parse failure of the last attempt.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let html = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        match self.call::<serde_json::Value>("sendMessage", &html).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_markup_rejected() => {
                tracing::warn!(chat_id, error = %e, "HTML rejected, resending as plain text");
                let plain = json!({ "chat_id": chat_id, "text": text });
                self.call::<serde_json::Value>("sendMessage", &plain).await.map(|_| ())
            },
            Err(e) => Err(e),
        }
    }

    /// # Errors
    /// Transport, API or parse failure.
    pub async fn set_webhook(&self, url: &str, secret: &str) -> Result<(), TelegramError> {
        let body = json!({
            "url": url,
            "secret_token": secret,
            "allowed_updates": ["message"],
        });
        self.call::<bool>("setWebhook", &body).await.map(|_| ())
    }

    /// # Errors
    /// Transport, API or parse failure.
    pub async fn delete_webhook(&self) -> Result<(), TelegramError> {
        self.call::<bool>("deleteWebhook", &json!({})).await.map(|_| ())
    }

    /// One Bot API call. Transient failures are retried twice with a short
    /// backoff.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TelegramError> {
        const MAX_RETRIES: usize = 2;
        const RETRY_DELAYS: [u64; 3] = [0, 1, 3];
        let url = format!("{}/bot{}/{method}", self.base_url, self.token);
        let mut last_error: Option<TelegramError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_secs(RETRY_DELAYS.get(attempt).copied().unwrap_or(3));
                tokio::time::sleep(delay).await;
                tracing::warn!(method, attempt, max = MAX_RETRIES, ?delay, "Bot API retry");
            }

            let err = match self.try_call(&url, method, body).await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };
            if !err.is_transient() {
                return Err(err);
            }
            last_error = Some(err);
        }

        Err(last_error.unwrap_or(TelegramError::Api {
            code: 0,
            description: format!("{method}: retries exhausted"),
        }))
    }

    async fn try_call<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let parsed: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            // Proxies in front of the API answer overload with HTML pages.
            Err(_) if status == 429 || status >= 500 => {
                return Err(TelegramError::Api {
                    code: status,
                    description: ailvi_core::truncate_bytes(&text, 200).to_owned(),
                });
            },
            Err(e) => {
                return Err(TelegramError::JsonParse {
                    context: format!(
                        "{method} (status {status}: {})",
                        ailvi_core::truncate_bytes(&text, 200)
                    ),
                    source: e,
                });
            },
        };

        match parsed {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { description, error_code, .. } => Err(TelegramError::Api {
                code: error_code.unwrap_or(status),
                description: description.unwrap_or_else(|| format!("{method} returned no result")),
            }),
        }
    }
}

#[async_trait]
impl Outbox for TelegramClient {
    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<(), CoreError> {
        let chat_id = user_id
            .as_str()
            .parse::<i64>()
            .map_err(|_| CoreError::Transport(TelegramError::InvalidChatId(user_id.to_string()).to_string()))?;
        self.send_message(chat_id, text).await.map_err(|e| CoreError::Transport(e.to_string()))
    }
}
