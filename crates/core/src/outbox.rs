use async_trait::async_trait;

use crate::error::CoreError;
use crate::session::UserId;

/// Outbound side of the chat transport.
///
/// The engine may call `send_text` several times for one inbound message,
/// for instance a placeholder followed by the real result.
#[async_trait]
pub trait Outbox: Send + Sync {
    /// # Errors
    /// Returns [`CoreError::Transport`] if delivery fails.
    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<(), CoreError>;
}
