//! Per-user phase progress: loading, updating and the summary offer flag.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ailvi_core::{EngineConfig, PhaseMode, PhaseState, Turn, UserId};
use ailvi_llm::{Generator, classify_phases};
use ailvi_storage::StorageBackend;
use ailvi_storage::traits::PhaseStore;
use parking_lot::Mutex;

/// Owns every user's [`PhaseState`]. States are cached in memory and written
/// through to the durable store; a failed durable call switches the tracker
/// to cache-only operation.
pub struct PhaseTracker {
    storage: Arc<StorageBackend>,
    generator: Arc<dyn Generator>,
    config: Arc<EngineConfig>,
    cache: Mutex<HashMap<UserId, PhaseState>>,
    degraded: AtomicBool,
}

impl PhaseTracker {
    #[must_use]
    pub fn new(
        storage: Arc<StorageBackend>,
        generator: Arc<dyn Generator>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            storage,
            generator,
            config,
            cache: Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Current state, created with defaults on first contact.
    pub async fn state(&self, user_id: &UserId) -> PhaseState {
        if let Some(state) = self.cache.lock().get(user_id) {
            return state.clone();
        }
        let loaded = match self.storage.load_phase_state(user_id).await {
            Ok(state) => state,
            Err(e) => {
                self.degrade(user_id, "load", &e);
                None
            },
        };
        let state = loaded.unwrap_or_else(|| PhaseState::new(user_id.clone()));
        self.cache.lock().entry(user_id.clone()).or_insert(state).clone()
    }

    /// Folds the latest exchange into the user's progress.
    ///
    /// In classify mode `recent` is sent to a classification pass; any
    /// failure leaves the state as it was. In linear mode the current phase
    /// is completed and the index moves on by one.
    pub async fn update(&self, user_id: &UserId, recent: &[Turn]) -> PhaseState {
        let mut state = self.state(user_id).await;
        let catalog = &self.config.phases;

        match self.config.phase_mode {
            PhaseMode::Classify => {
                let pass = classify_phases(
                    self.generator.as_ref(),
                    catalog,
                    recent,
                    &state.free_text_note,
                );
                let classification =
                    match tokio::time::timeout(self.config.generation_timeout, pass).await {
                        Ok(Ok(c)) => c,
                        Ok(Err(e)) => {
                            tracing::warn!(user_id = %user_id, error = %e, "phase classification failed");
                            return state;
                        },
                        Err(_) => {
                            tracing::warn!(user_id = %user_id, "phase classification timed out");
                            return state;
                        },
                    };
                let newly = state.apply_classification(
                    catalog,
                    &classification.flags,
                    classification.note.as_deref(),
                );
                if !newly.is_empty() {
                    tracing::info!(
                        user_id = %user_id,
                        phases = ?newly,
                        index = state.current_phase_index,
                        "phases completed"
                    );
                }
            },
            PhaseMode::Linear => {
                if let Some(done) = state.advance_linear(catalog) {
                    tracing::info!(user_id = %user_id, phase = %done, "phase completed");
                }
            },
        }

        self.save(&state).await;
        state
    }

    /// Counts one generation against the free-message limit.
    pub async fn record_usage(&self, user_id: &UserId) -> PhaseState {
        let mut state = self.state(user_id).await;
        state.messages_used = state.messages_used.saturating_add(1);
        self.save(&state).await;
        state
    }

    /// Sets `offered_summary` if every phase is complete. `true` only on the
    /// call that flipped it.
    pub async fn try_offer(&self, user_id: &UserId) -> bool {
        let mut state = self.state(user_id).await;
        if !state.try_offer(&self.config.phases) {
            return false;
        }
        self.save(&state).await;
        tracing::info!(user_id = %user_id, "summary offered");
        true
    }

    pub async fn mark_delivered(&self, user_id: &UserId) -> bool {
        let mut state = self.state(user_id).await;
        if !state.mark_delivered() {
            return false;
        }
        self.save(&state).await;
        true
    }

    /// Drops the cached state of an idle user unless the tracker is
    /// degraded. Returns whether anything was dropped.
    pub fn evict(&self, user_id: &UserId) -> bool {
        if self.is_degraded() {
            return false;
        }
        self.cache.lock().remove(user_id).is_some()
    }

    #[must_use]
    pub fn cached_users(&self) -> usize {
        self.cache.lock().len()
    }

    pub async fn reset(&self, user_id: &UserId) -> PhaseState {
        let mut state = self.state(user_id).await;
        state.reset();
        self.save(&state).await;
        state
    }

    async fn save(&self, state: &PhaseState) {
        self.cache.lock().insert(state.user_id.clone(), state.clone());
        if self.is_degraded() {
            return;
        }
        if let Err(e) = self.storage.save_phase_state(state).await {
            self.degrade(&state.user_id, "save", &e);
        }
    }

    fn degrade(&self, user_id: &UserId, op: &str, err: &dyn std::error::Error) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                user_id = %user_id,
                op,
                error = %err,
                "phase store unavailable, continuing cache-only"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use ailvi_core::PhaseCatalog;
    use ailvi_storage::MemoryStorage;

    use super::*;
    use crate::test_support::{FakeGenerator, Pass, Scripted, all_phases_json};

    fn catalog() -> PhaseCatalog {
        PhaseCatalog::parse("a:Первая;b:Вторая;c:Третья").unwrap()
    }

    fn tracker(generator: Arc<FakeGenerator>, mode: PhaseMode) -> (PhaseTracker, MemoryStorage) {
        let memory = MemoryStorage::new();
        let config = EngineConfig::default().with_phases(catalog()).with_phase_mode(mode);
        let tracker = PhaseTracker::new(
            Arc::new(StorageBackend::Memory(memory.clone())),
            generator,
            Arc::new(config),
        );
        (tracker, memory)
    }

    #[tokio::test]
    async fn first_contact_creates_defaults() {
        let (tracker, _) = tracker(FakeGenerator::chatty("x"), PhaseMode::Classify);
        let state = tracker.state(&UserId::from("1")).await;
        assert_eq!(state.current_phase_index, 0);
        assert!(state.completed_phases.is_empty());
        assert!(!state.offered_summary);
    }

    #[tokio::test]
    async fn progress_survives_eviction_and_degraded_first_contact() {
        let (tracker, memory) = tracker(FakeGenerator::chatty("x"), PhaseMode::Linear);
        let user = UserId::from("1");
        tracker.update(&user, &[]).await;
        assert!(tracker.evict(&user));
        assert_eq!(tracker.cached_users(), 0);
        assert_eq!(tracker.state(&user).await.current_phase_index, 1);

        let mut returning = PhaseState::new(UserId::from("2"));
        returning.offered_summary = true;
        memory.save_phase_state(&returning).await.unwrap();
        memory.set_unavailable(true);
        tracker.record_usage(&UserId::from("3")).await;
        assert!(tracker.is_degraded());
        assert!(!tracker.evict(&UserId::from("3")));

        memory.set_unavailable(false);
        assert!(tracker.state(&UserId::from("2")).await.offered_summary);
    }

    #[tokio::test]
    async fn completion_never_shrinks() {
        let script = [r#"{"phases": {"a": true, "b": true}}"#, r#"{"phases": {"a": false}}"#, "мусор"];
        let step = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let generator = {
            let step = Arc::clone(&step);
            FakeGenerator::new(move |_, _| {
                let i = step.fetch_add(1, Ordering::SeqCst);
                Scripted::text(script.get(i).copied().unwrap_or("{}"))
            })
        };
        let (tracker, _) = tracker(generator, PhaseMode::Classify);
        let user = UserId::from("1");

        let mut previous = tracker.state(&user).await.completed_phases;
        for _ in 0..script.len() {
            let state = tracker.update(&user, &[Turn::user("...")]).await;
            assert!(state.completed_phases.is_superset(&previous));
            assert!(state.current_phase_index >= 2);
            previous = state.completed_phases;
        }
        assert_eq!(previous.len(), 2);
    }

    #[tokio::test]
    async fn classification_failure_leaves_state_unchanged() {
        let (tracker, _) = tracker(FakeGenerator::new(|_, _| Scripted::Fail(503)), PhaseMode::Classify);
        let user = UserId::from("1");
        let before = tracker.state(&user).await;
        let after = tracker.update(&user, &[Turn::user("...")]).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn linear_mode_advances_without_model_calls() {
        let generator = FakeGenerator::chatty("x");
        let (tracker, _) = tracker(Arc::clone(&generator), PhaseMode::Linear);
        let user = UserId::from("1");
        for _ in 0..5 {
            tracker.update(&user, &[]).await;
        }
        let state = tracker.state(&user).await;
        assert_eq!(state.current_phase_index, 2);
        assert!(state.is_complete(&catalog()));
        assert_eq!(generator.count(Pass::Classify), 0);
    }

    #[tokio::test]
    async fn offer_flips_exactly_once() {
        let generator =
            FakeGenerator::new(|_, _| Scripted::Text(all_phases_json(&["a", "b", "c"])));
        let (tracker, memory) = tracker(generator, PhaseMode::Classify);
        let user = UserId::from("1");

        assert!(!tracker.try_offer(&user).await);
        let state = tracker.update(&user, &[Turn::user("...")]).await;
        assert_eq!(state.free_text_note, "любит горы");
        assert!(tracker.try_offer(&user).await);
        assert!(!tracker.try_offer(&user).await);
        assert!(memory.load_phase_state(&user).await.unwrap().unwrap().offered_summary);
    }

    #[tokio::test]
    async fn reset_keeps_usage_counter() {
        let (tracker, _) = tracker(FakeGenerator::chatty("x"), PhaseMode::Linear);
        let user = UserId::from("1");
        tracker.record_usage(&user).await;
        tracker.update(&user, &[]).await;
        let state = tracker.reset(&user).await;
        assert_eq!(state.current_phase_index, 0);
        assert!(state.completed_phases.is_empty());
        assert_eq!(state.messages_used, 1);
    }

    #[tokio::test]
    async fn store_outage_degrades_to_cache() {
        let (tracker, memory) = tracker(FakeGenerator::chatty("x"), PhaseMode::Linear);
        let user = UserId::from("1");
        memory.set_unavailable(true);
        tracker.update(&user, &[]).await;
        assert!(tracker.is_degraded());
        assert_eq!(tracker.state(&user).await.current_phase_index, 1);
    }
}
