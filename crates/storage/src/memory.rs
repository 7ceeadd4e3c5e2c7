//! In-memory backend.
//!
//! Satisfies the same contract as the durable backends and is the fake used
//! in tests. [`MemoryStorage::set_unavailable`] makes every call fail, which
//! exercises the callers' degradation paths.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ailvi_core::{MessageLogEntry, PhaseState, Summary, Turn, UserId};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StorageError;
use crate::traits::{MessageLogStore, PhaseStore, SummaryStore, TurnStore};

#[derive(Debug, Default)]
struct Tables {
    turns: HashMap<UserId, Vec<Turn>>,
    phases: HashMap<UserId, PhaseState>,
    summaries: HashMap<UserId, Vec<Summary>>,
    log: Vec<MessageLogEntry>,
}

/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every operation returns [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("in-memory store switched off".to_owned()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TurnStore for MemoryStorage {
    async fn load_turns(&self, user_id: &UserId) -> Result<Vec<Turn>, StorageError> {
        self.check()?;
        Ok(self.tables.lock().turns.get(user_id).cloned().unwrap_or_default())
    }

    async fn append_turn(&self, user_id: &UserId, turn: &Turn) -> Result<(), StorageError> {
        self.check()?;
        self.tables.lock().turns.entry(user_id.clone()).or_default().push(turn.clone());
        Ok(())
    }

    async fn clear_turns(&self, user_id: &UserId) -> Result<usize, StorageError> {
        self.check()?;
        Ok(self.tables.lock().turns.remove(user_id).map_or(0, |t| t.len()))
    }
}

#[async_trait]
impl PhaseStore for MemoryStorage {
    async fn load_phase_state(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PhaseState>, StorageError> {
        self.check()?;
        Ok(self.tables.lock().phases.get(user_id).cloned())
    }

    async fn save_phase_state(&self, state: &PhaseState) -> Result<(), StorageError> {
        self.check()?;
        self.tables.lock().phases.insert(state.user_id.clone(), state.clone());
        Ok(())
    }
}

#[async_trait]
impl SummaryStore for MemoryStorage {
    async fn save_summary(&self, summary: &Summary) -> Result<(), StorageError> {
        self.check()?;
        let mut tables = self.tables.lock();
        let list = tables.summaries.entry(summary.user_id.clone()).or_default();
        if list.iter().any(|s| s.id == summary.id) {
            return Err(StorageError::Duplicate(summary.id.clone()));
        }
        list.push(summary.clone());
        Ok(())
    }

    async fn get_summaries(&self, user_id: &UserId) -> Result<Vec<Summary>, StorageError> {
        self.check()?;
        Ok(self.tables.lock().summaries.get(user_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl MessageLogStore for MemoryStorage {
    async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), StorageError> {
        self.check()?;
        self.tables.lock().log.push(entry.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<MessageLogEntry>, StorageError> {
        self.check()?;
        let tables = self.tables.lock();
        let mine: Vec<&MessageLogEntry> =
            tables.log.iter().filter(|e| &e.user_id == user_id).collect();
        let skip = mine.len().saturating_sub(limit);
        Ok(mine.into_iter().skip(skip).cloned().collect())
    }
}
