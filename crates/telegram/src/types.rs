//! The subset of Bot API objects the bot reads.

use ailvi_core::UserId;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<Sender>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// A text message ready for the engine. Sessions are keyed by chat id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

impl Update {
    /// The trimmed text of a message update; `None` for anything else,
    /// including blank texts.
    #[must_use]
    pub fn into_inbound(self) -> Option<Inbound> {
        let message = self.message?;
        let text = message.text?.trim().to_owned();
        if text.is_empty() {
            return None;
        }
        Some(Inbound {
            user_id: UserId::from(message.chat.id),
            username: message.from.and_then(|f| f.username),
            text,
        })
    }
}
