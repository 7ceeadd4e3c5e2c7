use std::sync::Arc;

use ailvi_core::{EngineConfig, UserId};

/// Optional free-message limit. Allow-listed users are never gated.
#[derive(Debug, Clone)]
pub struct Paywall {
    config: Arc<EngineConfig>,
}

impl Paywall {
    #[must_use]
    pub const fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Whether a user who has already spent `messages_used` generations may
    /// have another one.
    #[must_use]
    pub fn admits(&self, user_id: &UserId, messages_used: u32) -> bool {
        match self.config.free_message_limit {
            None => true,
            Some(_) if self.config.is_allowlisted(user_id) => true,
            Some(limit) => messages_used < limit,
        }
    }
}
