//! Typed error enum for the Telegram transport.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),
    /// The Bot API answered `ok: false`.
    #[error("Bot API error {code}: {description}")]
    Api { code: u16, description: String },
    #[error("JSON parse error in {context}: {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("client initialization failed: {0}")]
    ClientInit(String),
    #[error("invalid chat id: {0}")]
    InvalidChatId(String),
}

impl TelegramError {
    /// Whether this error is transient and should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpRequest(_) => true,
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// The API refused the HTML markup of a message.
    #[must_use]
    pub fn is_markup_rejected(&self) -> bool {
        matches!(self, Self::Api { code: 400, description } if description.contains("can't parse entities"))
    }
}
