//! Unified storage backend with enum dispatch.

#[cfg(feature = "sqlite")]
use std::path::Path;

use ailvi_core::{MessageLogEntry, PhaseState, Summary, Turn, UserId};
use async_trait::async_trait;

use crate::error::StorageError;
use crate::memory::MemoryStorage;
use crate::traits::{MessageLogStore, PhaseStore, SummaryStore, TurnStore};

macro_rules! dispatch {
    ($self:expr, $trait:path, $method:ident ( $($arg:expr),* $(,)? )) => {
        match $self {
            StorageBackend::Memory(s) => <MemoryStorage as $trait>::$method(s, $($arg),*).await,
            #[cfg(feature = "sqlite")]
            StorageBackend::Sqlite(s) => <crate::Storage as $trait>::$method(s, $($arg),*).await,
            #[cfg(feature = "postgres")]
            StorageBackend::Postgres(s) => <crate::pg_storage::PgStorage as $trait>::$method(s, $($arg),*).await,
        }
    };
}

#[derive(Clone, Debug)]
pub enum StorageBackend {
    Memory(MemoryStorage),
    #[cfg(feature = "sqlite")]
    Sqlite(crate::Storage),
    #[cfg(feature = "postgres")]
    Postgres(crate::pg_storage::PgStorage),
}

impl StorageBackend {
    #[must_use]
    pub fn new_memory() -> Self {
        Self::Memory(MemoryStorage::new())
    }

    /// # Errors
    /// Returns error if the database cannot be opened or migrated.
    #[cfg(feature = "sqlite")]
    pub fn new_sqlite(db_path: &Path) -> Result<Self, StorageError> {
        Ok(Self::Sqlite(crate::Storage::new(db_path)?))
    }

    /// # Errors
    /// Returns error if the database cannot be reached or migrated.
    #[cfg(feature = "postgres")]
    pub async fn new_postgres(database_url: &str) -> Result<Self, StorageError> {
        Ok(Self::Postgres(crate::pg_storage::PgStorage::new(database_url).await?))
    }

    /// Backend name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => "postgres",
        }
    }
}

// ── TurnStore ────────────────────────────────────────────────────

#[async_trait]
impl TurnStore for StorageBackend {
    async fn load_turns(&self, user_id: &UserId) -> Result<Vec<Turn>, StorageError> {
        dispatch!(self, TurnStore, load_turns(user_id))
    }

    async fn append_turn(&self, user_id: &UserId, turn: &Turn) -> Result<(), StorageError> {
        dispatch!(self, TurnStore, append_turn(user_id, turn))
    }

    async fn clear_turns(&self, user_id: &UserId) -> Result<usize, StorageError> {
        dispatch!(self, TurnStore, clear_turns(user_id))
    }
}

// ── PhaseStore ───────────────────────────────────────────────────

#[async_trait]
impl PhaseStore for StorageBackend {
    async fn load_phase_state(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PhaseState>, StorageError> {
        dispatch!(self, PhaseStore, load_phase_state(user_id))
    }

    async fn save_phase_state(&self, state: &PhaseState) -> Result<(), StorageError> {
        dispatch!(self, PhaseStore, save_phase_state(state))
    }
}

// ── SummaryStore ─────────────────────────────────────────────────

#[async_trait]
impl SummaryStore for StorageBackend {
    async fn save_summary(&self, summary: &Summary) -> Result<(), StorageError> {
        dispatch!(self, SummaryStore, save_summary(summary))
    }

    async fn get_summaries(&self, user_id: &UserId) -> Result<Vec<Summary>, StorageError> {
        dispatch!(self, SummaryStore, get_summaries(user_id))
    }
}

// ── MessageLogStore ──────────────────────────────────────────────

#[async_trait]
impl MessageLogStore for StorageBackend {
    async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), StorageError> {
        dispatch!(self, MessageLogStore, log_message(entry))
    }

    async fn recent_messages(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MessageLogEntry>, StorageError> {
        dispatch!(self, MessageLogStore, recent_messages(user_id, limit))
    }
}
