//! Async trait implementations for SQLite `Storage` via `spawn_blocking`.

use ailvi_core::{MessageLogEntry, PhaseState, Summary, Turn, UserId};
use async_trait::async_trait;

use crate::Storage;
use crate::error::StorageError;
use crate::traits::{MessageLogStore, PhaseStore, SummaryStore, TurnStore};

/// Run a blocking closure on the tokio blocking pool.
async fn blocking<F, T>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Join(format!("spawn_blocking join error: {e}")))?
}

/// Body-generating macro for async-to-blocking delegation.
///
/// Each argument is annotated with a capture kind:
/// - `@ref arg`: `.clone()` a `&T`, pass as `&arg`
/// - `@val arg`: move directly (Copy/owned types)
macro_rules! delegate {
    ($self:ident, $method:ident $(, @$kind:ident $arg:ident)*) => {{
        let s = $self.clone();
        $(delegate!(@capture $kind $arg);)*
        blocking(move || s.$method($(delegate!(@pass $kind $arg)),*)).await
    }};
    (@capture ref $arg:ident) => { let $arg = $arg.clone(); };
    (@capture val $arg:ident) => { };
    (@pass ref $arg:ident) => { &$arg };
    (@pass val $arg:ident) => { $arg };
}

// ── TurnStore ────────────────────────────────────────────────────

#[async_trait]
impl TurnStore for Storage {
    async fn load_turns(&self, user_id: &UserId) -> Result<Vec<Turn>, StorageError> {
        delegate!(self, load_turns, @ref user_id)
    }
    async fn append_turn(&self, user_id: &UserId, turn: &Turn) -> Result<(), StorageError> {
        delegate!(self, append_turn, @ref user_id, @ref turn)
    }
    async fn clear_turns(&self, user_id: &UserId) -> Result<usize, StorageError> {
        delegate!(self, clear_turns, @ref user_id)
    }
}

// ── PhaseStore ───────────────────────────────────────────────────

#[async_trait]
impl PhaseStore for Storage {
    async fn load_phase_state(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PhaseState>, StorageError> {
        delegate!(self, load_phase_state, @ref user_id)
    }
    async fn save_phase_state(&self, state: &PhaseState) -> Result<(), StorageError> {
        delegate!(self, save_phase_state, @ref state)
    }
}

// ── SummaryStore ─────────────────────────────────────────────────

#[async_trait]
impl SummaryStore for Storage {
    async fn save_summary(&self, summary: &Summary) -> Result<(), StorageError> {
        delegate!(self, save_summary, @ref summary)
    }
    async fn get_summaries(&self, user_id: &UserId) -> Result<Vec<Summary>, StorageError> {
        delegate!(self, get_summaries, @ref user_id)
    }
}

// ── MessageLogStore ──────────────────────────────────────────────

#[async_trait]
impl MessageLogStore for Storage {
    async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), StorageError> {
        delegate!(self, log_message, @ref entry)
    }
    async fn recent_messages(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MessageLogEntry>, StorageError> {
        delegate!(self, recent_messages, @ref user_id, @val limit)
    }
}
