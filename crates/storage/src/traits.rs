//! Storage backend trait abstraction
//!
//! Keyed async domain traits, one per record kind. Every backend
//! (in-memory, SQLite, PostgreSQL) implements all four, and
//! [`StorageBackend`](crate::StorageBackend) dispatches between them.

use ailvi_core::{MessageLogEntry, PhaseState, Summary, Turn, UserId};
use async_trait::async_trait;

use crate::error::StorageError;

/// Append-only per-user conversation history.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// All turns of a user in insertion order.
    async fn load_turns(&self, user_id: &UserId) -> Result<Vec<Turn>, StorageError>;

    /// Append one turn at the end of the user's history.
    async fn append_turn(&self, user_id: &UserId, turn: &Turn) -> Result<(), StorageError>;

    /// Delete the user's history. Returns the number of removed turns.
    async fn clear_turns(&self, user_id: &UserId) -> Result<usize, StorageError>;
}

/// One phase-state record per user.
#[async_trait]
pub trait PhaseStore: Send + Sync {
    async fn load_phase_state(&self, user_id: &UserId)
    -> Result<Option<PhaseState>, StorageError>;

    /// Insert or replace the user's record.
    async fn save_phase_state(&self, state: &PhaseState) -> Result<(), StorageError>;
}

/// Append-only summaries, zero or more per user.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn save_summary(&self, summary: &Summary) -> Result<(), StorageError>;

    /// All summaries of a user, oldest first.
    async fn get_summaries(&self, user_id: &UserId) -> Result<Vec<Summary>, StorageError>;
}

/// Audit trail of texts crossing the transport.
#[async_trait]
pub trait MessageLogStore: Send + Sync {
    async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), StorageError>;

    /// Most recent `limit` entries of a user, oldest first.
    async fn recent_messages(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MessageLogEntry>, StorageError>;
}
