//! Shared contract tests run against every backend available in tests.

#![expect(clippy::unwrap_used, reason = "test code")]

use std::collections::BTreeSet;

use ailvi_core::{Direction, MessageLogEntry, PhaseState, Role, Summary, Turn, UserId};
use chrono::Utc;

use crate::StorageBackend;
use crate::traits::{MessageLogStore, PhaseStore, SummaryStore, TurnStore};


#[cfg(feature = "sqlite")]
pub fn create_test_storage() -> (crate::Storage, tempfile::TempDir) {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let storage = crate::Storage::new(&db_path).unwrap();
    (storage, temp_dir)
}

pub fn summary(id: &str, user: &str, text: &str) -> Summary {
    Summary {
        id: id.to_owned(),
        user_id: UserId::from(user),
        text: text.to_owned(),
        turn_count: 4,
        created_at: Utc::now(),
    }
}

pub async fn turns_keep_insertion_order(store: &StorageBackend) {
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    for i in 0..5 {
        store.append_turn(&alice, &Turn::user(format!("u{i}"))).await.unwrap();
        store.append_turn(&alice, &Turn::assistant(format!("a{i}"))).await.unwrap();
    }
    store.append_turn(&bob, &Turn::user("bob only")).await.unwrap();

    let turns = store.load_turns(&alice).await.unwrap();
    assert_eq!(turns.len(), 10);
    let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, ["u0", "a0", "u1", "a1", "u2", "a2", "u3", "a3", "u4", "a4"]);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[1].role, Role::Assistant);

    assert_eq!(store.clear_turns(&alice).await.unwrap(), 10);
    assert!(store.load_turns(&alice).await.unwrap().is_empty());
    assert_eq!(store.load_turns(&bob).await.unwrap().len(), 1);
}

pub async fn phase_state_round_trip(store: &StorageBackend) {
    let user = UserId::from("42");
    assert!(store.load_phase_state(&user).await.unwrap().is_none());

    let mut state = PhaseState::new(user.clone());
    state.current_phase_index = 2;
    state.completed_phases = BTreeSet::from(["meaning".to_owned(), "values".to_owned()]);
    state.free_text_note = "любит рисовать".to_owned();
    state.messages_used = 7;
    store.save_phase_state(&state).await.unwrap();

    let loaded = store.load_phase_state(&user).await.unwrap().unwrap();
    assert_eq!(loaded.current_phase_index, 2);
    assert_eq!(loaded.completed_phases, state.completed_phases);
    assert_eq!(loaded.free_text_note, "любит рисовать");
    assert_eq!(loaded.messages_used, 7);
    assert!(!loaded.offered_summary);

    state.offered_summary = true;
    state.summary_delivered = true;
    store.save_phase_state(&state).await.unwrap();
    let loaded = store.load_phase_state(&user).await.unwrap().unwrap();
    assert!(loaded.offered_summary && loaded.summary_delivered);
}

pub async fn summaries_are_append_only(store: &StorageBackend) {
    let user = UserId::from("7");
    store.save_summary(&summary("s1", "7", "first")).await.unwrap();
    store.save_summary(&summary("s2", "7", "second")).await.unwrap();
    store.save_summary(&summary("s3", "8", "other")).await.unwrap();

    let err = store.save_summary(&summary("s1", "7", "again")).await.unwrap_err();
    assert!(err.is_duplicate());

    let texts: Vec<String> =
        store.get_summaries(&user).await.unwrap().into_iter().map(|s| s.text).collect();
    assert_eq!(texts, ["first", "second"]);

    store.clear_turns(&user).await.unwrap();
    assert_eq!(store.get_summaries(&user).await.unwrap().len(), 2);
}

pub async fn message_log_returns_recent_tail(store: &StorageBackend) {
    let user = UserId::from("99");
    for i in 0..6 {
        let direction = if i % 2 == 0 { Direction::In } else { Direction::Out };
        let entry =
            MessageLogEntry::new(user.clone(), Some("anna".to_owned()), direction, format!("m{i}"));
        store.log_message(&entry).await.unwrap();
    }
    let recent = store.recent_messages(&user, 3).await.unwrap();
    let texts: Vec<&str> = recent.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, ["m3", "m4", "m5"]);
    assert_eq!(recent[0].direction, Direction::Out);
    assert_eq!(recent[0].username.as_deref(), Some("anna"));
}
