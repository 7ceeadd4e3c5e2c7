//! Per-user conversation history with a write-through cache.
//!
//! The cache is authoritative for the running process. The durable store is
//! read when a user is first seen (lazy hydration) and written on every
//! append. After the first durable failure writes stop until restart; reads
//! for users not yet cached are still attempted.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ailvi_core::{Role, Turn, UserId};
use ailvi_storage::StorageBackend;
use ailvi_storage::traits::TurnStore;
use parking_lot::Mutex;

pub struct HistoryStore {
    storage: Arc<StorageBackend>,
    cache: Mutex<HashMap<UserId, Vec<Turn>>>,
    degraded: AtomicBool,
}

impl HistoryStore {
    #[must_use]
    pub fn new(storage: Arc<StorageBackend>) -> Self {
        Self { storage, cache: Mutex::new(HashMap::new()), degraded: AtomicBool::new(false) }
    }

    /// `true` once a durable read or write has failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Adds one turn at the end of the user's history and returns it.
    pub async fn append(&self, user_id: &UserId, role: Role, content: &str) -> Turn {
        self.hydrate(user_id).await;
        let turn = Turn::new(role, content);
        self.cache.lock().entry(user_id.clone()).or_default().push(turn.clone());

        if !self.is_degraded()
            && let Err(e) = self.storage.append_turn(user_id, &turn).await
        {
            self.degrade(user_id, "append", &e);
        }
        turn
    }

    /// The most recent `limit` turns, oldest first.
    pub async fn window(&self, user_id: &UserId, limit: usize) -> Vec<Turn> {
        self.hydrate(user_id).await;
        let cache = self.cache.lock();
        let Some(turns) = cache.get(user_id) else {
            return Vec::new();
        };
        let start = turns.len().saturating_sub(limit);
        turns.get(start..).map(<[Turn]>::to_vec).unwrap_or_default()
    }

    pub async fn full(&self, user_id: &UserId) -> Vec<Turn> {
        self.hydrate(user_id).await;
        self.cache.lock().get(user_id).cloned().unwrap_or_default()
    }

    pub async fn len(&self, user_id: &UserId) -> usize {
        self.hydrate(user_id).await;
        self.cache.lock().get(user_id).map_or(0, Vec::len)
    }

    /// Drops the cached turns of an idle user. While degraded the cache is
    /// the only copy, so nothing is dropped and `false` is returned.
    pub fn evict(&self, user_id: &UserId) -> bool {
        if self.is_degraded() {
            return false;
        }
        self.cache.lock().remove(user_id).is_some()
    }

    /// Number of users whose history is held in memory.
    #[must_use]
    pub fn cached_users(&self) -> usize {
        self.cache.lock().len()
    }

    /// Empties the user's history. Summaries are not touched.
    pub async fn clear(&self, user_id: &UserId) {
        self.cache.lock().insert(user_id.clone(), Vec::new());
        if self.is_degraded() {
            return;
        }
        match self.storage.clear_turns(user_id).await {
            Ok(removed) => tracing::debug!(user_id = %user_id, removed, "history cleared"),
            Err(e) => self.degrade(user_id, "clear", &e),
        }
    }

    async fn hydrate(&self, user_id: &UserId) {
        if self.cache.lock().contains_key(user_id) {
            return;
        }
        let loaded = match self.storage.load_turns(user_id).await {
            Ok(turns) => turns,
            Err(e) => {
                self.degrade(user_id, "load", &e);
                Vec::new()
            },
        };
        self.cache.lock().entry(user_id.clone()).or_insert(loaded);
    }

    fn degrade(&self, user_id: &UserId, op: &str, err: &dyn std::error::Error) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                user_id = %user_id,
                op,
                error = %err,
                "history store unavailable, continuing cache-only"
            );
        }
    }
}
