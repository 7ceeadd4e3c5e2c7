#![expect(clippy::unwrap_used, reason = "test code")]

use std::sync::Arc;
use std::time::Duration;

use ailvi_core::persona::{
    APOLOGY, BRIDGE_MESSAGE, HEALTH_OK, IDENTITY_REPLY, OFFER_DECLINED, ONBOARDING, SAFE_REDIRECT,
    START_TEXT, SUMMARY_NOT_READY, SUMMARY_OFFER, SUMMARY_PREPARING, UPSELL,
};
use ailvi_core::{Direction, EngineConfig, PhaseCatalog, PhaseMode, Role, UserId};
use ailvi_llm::{Generator, Message};
use ailvi_storage::traits::{MessageLogStore, SummaryStore};
use ailvi_storage::{MemoryStorage, StorageBackend};

use crate::engine::DialogueEngine;
use crate::test_support::{FakeGenerator, Pass, RecordingOutbox, Scripted, all_phases_json};

const PORTRAIT: &str = "<b>1. Твои ценности</b>\nСвобода и забота о близких.";

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_phases(PhaseCatalog::parse("a:Смысл;b:Ценности;c:Шаги").unwrap())
        .with_foundation_phases(1)
        .with_generation_timeout(Duration::from_millis(100))
}

fn engine(config: EngineConfig, generator: &Arc<FakeGenerator>) -> (DialogueEngine, MemoryStorage) {
    let memory = MemoryStorage::new();
    let generator: Arc<dyn Generator> = generator.clone();
    let engine =
        DialogueEngine::new(config, Arc::new(StorageBackend::Memory(memory.clone())), generator);
    (engine, memory)
}

/// Replies, classifies every phase as complete, and answers the summary
/// passes.
fn completing(pass: Pass, _messages: &[Message]) -> Scripted {
    match pass {
        Pass::Reply => Scripted::text("Что тебе в этом дорого?"),
        Pass::Classify => Scripted::Text(all_phases_json(&["a", "b", "c"])),
        Pass::Extract => Scripted::text(r#"{"values": ["свобода"], "quotes": ["люблю рисовать"]}"#),
        Pass::Merge => Scripted::text(r#"{"values": ["свобода"]}"#),
        Pass::Synthesize => Scripted::text(PORTRAIT),
    }
}

fn user() -> UserId {
    UserId::from("100")
}

#[tokio::test]
async fn begin_keyword_onboards_without_generation() {
    let generator = FakeGenerator::chatty("...");
    let (engine, _) = engine(config(), &generator);

    let reply = engine.respond(&user(), "Начинаем").await;
    assert_eq!(reply.messages, [ONBOARDING]);
    assert_eq!(generator.total(), 0);
    assert_eq!(engine.phases().state(&user()).await.current_phase_index, 0);

    let turns = engine.history().full(&user()).await;
    assert_eq!(turns.len(), 2);
    assert_eq!((turns[0].role, turns[0].content.as_str()), (Role::User, "Начинаем"));
    assert_eq!((turns[1].role, turns[1].content.as_str()), (Role::Assistant, ONBOARDING));
}

#[tokio::test]
async fn begin_keyword_resets_progress_and_history() {
    let generator = FakeGenerator::chatty("Расскажи подробнее.");
    let (engine, _) = engine(config().with_phase_mode(PhaseMode::Linear), &generator);
    engine.respond(&user(), "я люблю рисовать").await;
    engine.respond(&user(), "и гулять у моря").await;
    assert_eq!(engine.phases().state(&user()).await.current_phase_index, 2);

    engine.respond(&user(), "начинаем заново").await;
    let state = engine.phases().state(&user()).await;
    assert_eq!(state.current_phase_index, 0);
    assert!(state.completed_phases.is_empty());
    assert_eq!(engine.history().len(&user()).await, 2);
}

#[tokio::test]
async fn history_follows_arrival_order() {
    let generator = FakeGenerator::chatty("Я слышу тебя.");
    let (engine, _) = engine(config(), &generator);
    let inputs = [
        "привет",
        "я устал от работы",
        "кто тебя создал?",
        "сколько денег мне нужно?",
        "мне нравится рисовать",
        "да",
        "нет",
    ];
    for input in inputs {
        engine.respond(&user(), input).await;
    }

    let turns = engine.history().full(&user()).await;
    assert_eq!(turns.len(), inputs.len() * 2);
    for (pair, input) in turns.chunks(2).zip(inputs) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[0].content, input);
        assert_eq!(pair[1].role, Role::Assistant);
    }
    assert_eq!(turns[5].content, IDENTITY_REPLY);
    assert_eq!(turns[7].content, BRIDGE_MESSAGE);
}

#[tokio::test]
async fn completion_offers_summary_once() {
    let generator = FakeGenerator::new(completing);
    let (engine, _) = engine(config(), &generator);

    let first = engine.respond(&user(), "я люблю рисовать").await;
    assert_eq!(first.messages, ["Что тебе в этом дорого?", SUMMARY_OFFER]);
    assert!(engine.phases().state(&user()).await.offered_summary);

    for input in ["спасибо", "мне тепло от этого"] {
        let next = engine.respond(&user(), input).await;
        assert_eq!(next.messages, ["Что тебе в этом дорого?"]);
    }
    let offers = engine
        .history()
        .full(&user())
        .await
        .into_iter()
        .filter(|t| t.content == SUMMARY_OFFER)
        .count();
    assert_eq!(offers, 1);
}

#[tokio::test]
async fn accepting_the_offer_delivers_a_summary() {
    let generator = FakeGenerator::new(completing);
    let (engine, memory) = engine(config(), &generator);
    engine.respond(&user(), "я люблю рисовать").await;

    let reply = engine.respond(&user(), "да").await;
    assert_eq!(reply.messages, [SUMMARY_PREPARING, PORTRAIT]);
    let state = engine.phases().state(&user()).await;
    assert!(state.offered_summary && state.summary_delivered);
    assert_eq!(memory.get_summaries(&user()).await.unwrap().len(), 1);
    assert_eq!(engine.history().full(&user()).await.last().unwrap().content, PORTRAIT);

    // A second "yes" is ordinary conversation now.
    let again = engine.respond(&user(), "да").await;
    assert_eq!(again.messages, ["Что тебе в этом дорого?"]);
    assert_eq!(memory.get_summaries(&user()).await.unwrap().len(), 1);
    let state = engine.phases().state(&user()).await;
    assert!(state.offered_summary && state.summary_delivered);
}

#[tokio::test]
async fn declining_keeps_the_offer_open() {
    let generator = FakeGenerator::new(completing);
    let (engine, memory) = engine(config(), &generator);
    engine.respond(&user(), "я люблю рисовать").await;

    assert_eq!(engine.respond(&user(), "позже").await.messages, [OFFER_DECLINED]);
    assert!(engine.phases().state(&user()).await.offer_pending());
    assert!(memory.get_summaries(&user()).await.unwrap().is_empty());

    assert_eq!(engine.respond(&user(), "/summary").await.messages, [SUMMARY_PREPARING, PORTRAIT]);
    assert!(engine.phases().state(&user()).await.summary_delivered);
}

#[tokio::test]
async fn summary_command_is_gated() {
    let generator = FakeGenerator::chatty("...");
    let (engine, memory) = engine(config(), &generator);

    assert_eq!(engine.respond(&user(), "/summary").await.messages, [SUMMARY_NOT_READY]);
    assert!(memory.get_summaries(&user()).await.unwrap().is_empty());
    assert_eq!(generator.total(), 0);
    assert!(engine.summarize(&user()).await.is_err());
}

#[tokio::test]
async fn generation_timeout_becomes_apology_turn() {
    let generator = FakeGenerator::new(|pass, _| match pass {
        Pass::Reply => Scripted::Hang,
        _ => Scripted::text(r#"{"phases": {}}"#),
    });
    let (engine, _) = engine(config(), &generator);

    let reply = engine.respond(&user(), "мне грустно").await;
    assert_eq!(reply.messages, [APOLOGY]);
    let turns = engine.history().full(&user()).await;
    assert_eq!(turns.last().unwrap().content, APOLOGY);
    assert_eq!(generator.count(Pass::Classify), 0);

    engine.respond(&user(), "ты тут?").await;
    let request = generator.last_request(Pass::Reply).unwrap();
    assert!(request.contains(&Message::assistant(APOLOGY)));
    assert_eq!(request.last().unwrap(), &Message::user("ты тут?"));
}

#[tokio::test]
async fn upstream_error_becomes_apology_turn() {
    let generator = FakeGenerator::new(|_, _| Scripted::Fail(503));
    let (engine, _) = engine(config(), &generator);
    assert_eq!(engine.respond(&user(), "привет").await.messages, [APOLOGY]);
}

#[tokio::test]
async fn deny_listed_output_is_replaced() {
    let generator = FakeGenerator::chatty("Честно говоря, я работаю на ChatGPT от OpenAI.");
    let (engine, _) = engine(config(), &generator);

    let reply = engine.respond(&user(), "как дела?").await;
    assert_eq!(reply.messages, [SAFE_REDIRECT]);
    assert_eq!(engine.history().full(&user()).await[1].content, SAFE_REDIRECT);
}

#[tokio::test]
async fn identity_question_uses_fixed_reply() {
    let generator = FakeGenerator::chatty("...");
    let (engine, _) = engine(config(), &generator);
    assert_eq!(engine.respond(&user(), "Кто тебя создал?").await.messages, [IDENTITY_REPLY]);
    assert_eq!(generator.total(), 0);
}

#[tokio::test]
async fn premature_topic_waits_for_foundation() {
    let generator = FakeGenerator::new(|pass, _| match pass {
        Pass::Classify => Scripted::text(r#"{"phases": {"a": true}}"#),
        _ => Scripted::text("Давай посмотрим, что для тебя важно."),
    });
    let (engine, _) = engine(config(), &generator);

    let early = engine.respond(&user(), "как мне заработать денег?").await;
    assert_eq!(early.messages, [BRIDGE_MESSAGE]);
    assert_eq!(generator.total(), 0);

    engine.respond(&user(), "я хочу найти своё").await;
    let later = engine.respond(&user(), "как мне заработать денег?").await;
    assert_eq!(later.messages, ["Давай посмотрим, что для тебя важно."]);
    assert_eq!(generator.count(Pass::Reply), 2);
}

#[tokio::test]
async fn paywall_replaces_generation_with_upsell() {
    let generator = FakeGenerator::chatty("Расскажи ещё.");
    let (engine, _) = engine(config().with_free_message_limit(2, &["vip"]), &generator);

    for _ in 0..2 {
        assert_eq!(engine.respond(&user(), "привет").await.messages, ["Расскажи ещё."]);
    }
    let before = engine.phases().state(&user()).await;
    assert_eq!(engine.respond(&user(), "привет").await.messages, [UPSELL]);
    assert_eq!(engine.phases().state(&user()).await, before);
    assert_eq!(generator.count(Pass::Reply), 2);

    let vip = UserId::from("vip");
    for _ in 0..3 {
        assert_eq!(engine.respond(&vip, "привет").await.messages, ["Расскажи ещё."]);
    }
}

#[tokio::test]
async fn linear_mode_offers_after_last_phase() {
    let generator = FakeGenerator::new(completing);
    let (engine, _) = engine(config().with_phase_mode(PhaseMode::Linear), &generator);

    for _ in 0..2 {
        assert_eq!(engine.respond(&user(), "я здесь").await.messages.len(), 1);
    }
    let third = engine.respond(&user(), "я здесь").await;
    assert_eq!(third.messages.last().map(String::as_str), Some(SUMMARY_OFFER));
    assert_eq!(generator.count(Pass::Classify), 0);
}

#[tokio::test]
async fn start_and_health_commands() {
    let generator = FakeGenerator::chatty("Я слышу тебя.");
    let (engine, _) = engine(config().with_phase_mode(PhaseMode::Linear), &generator);
    engine.respond(&user(), "привет").await;

    assert_eq!(engine.respond(&user(), "/health").await.messages, [HEALTH_OK]);
    assert_eq!(engine.history().len(&user()).await, 2);

    assert_eq!(engine.respond(&user(), "/start").await.messages, [START_TEXT]);
    assert_eq!(engine.history().len(&user()).await, 0);
    assert_eq!(engine.phases().state(&user()).await.current_phase_index, 0);
}

#[tokio::test]
async fn long_replies_are_split_but_stored_whole() {
    let long = "слово ".repeat(30);
    let generator = FakeGenerator::new(move |pass, _| match pass {
        Pass::Classify => Scripted::text(r#"{"phases": {}}"#),
        _ => Scripted::Text(long.clone()),
    });
    let config = EngineConfig { max_message_chars: 40, ..config() };
    let (engine, _) = engine(config, &generator);

    let reply = engine.respond(&user(), "привет").await;
    assert!(reply.messages.len() > 1);
    assert!(reply.messages.iter().all(|m| m.chars().count() <= 40));
    assert!(reply.messages.iter().all(|m| !m.ends_with("сло")));
    assert_eq!(engine.history().full(&user()).await[1].content, "слово ".repeat(30).trim());
}

#[tokio::test]
async fn handle_message_delivers_and_audits() {
    let generator = FakeGenerator::new(completing);
    let (engine, memory) = engine(config(), &generator);
    let outbox = RecordingOutbox::default();

    engine.handle_message(&user(), Some("tester"), "я люблю рисовать", &outbox).await;
    engine.handle_message(&user(), Some("tester"), "да", &outbox).await;
    assert_eq!(
        outbox.texts(),
        ["Что тебе в этом дорого?", SUMMARY_OFFER, SUMMARY_PREPARING, PORTRAIT]
    );

    let log = memory.recent_messages(&user(), 10).await.unwrap();
    let directions: Vec<Direction> = log.iter().map(|e| e.direction).collect();
    assert_eq!(
        directions,
        [Direction::In, Direction::Out, Direction::Out, Direction::In, Direction::Out, Direction::Out]
    );
    assert_eq!(log[0].username.as_deref(), Some("tester"));
    assert_eq!(log[3].text, "да");
}

#[tokio::test]
async fn storage_outage_does_not_block_replies() {
    let generator = FakeGenerator::chatty("Я рядом.");
    let (engine, memory) = engine(config(), &generator);
    memory.set_unavailable(true);

    assert_eq!(engine.respond(&user(), "привет").await.messages, ["Я рядом."]);
    assert_eq!(engine.respond(&user(), "ещё").await.messages, ["Я рядом."]);
    assert!(engine.is_degraded());
    assert_eq!(engine.history().len(&user()).await, 4);
}

#[tokio::test]
async fn concurrent_messages_from_one_user_do_not_interleave() {
    let generator = FakeGenerator::new(|pass, messages| match pass {
        Pass::Classify => Scripted::text(r#"{"phases": {}}"#),
        _ => {
            let last = messages.last().map_or("", |m| m.content.as_str());
            Scripted::Text(format!("эхо: {last}"))
        },
    });
    let (engine, _) = engine(config(), &generator);

    let u = user();
    tokio::join!(engine.respond(&u, "первое"), engine.respond(&u, "второе"));

    let turns = engine.history().full(&user()).await;
    assert_eq!(turns.len(), 4);
    for pair in turns.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].content, format!("эхо: {}", pair[0].content));
    }
}

#[tokio::test]
async fn leading_yes_no_words_do_not_bypass_fixed_replies() {
    let generator = FakeGenerator::chatty("свободный ответ");
    let (engine, _) = engine(config(), &generator);

    for (input, expected) in [
        ("Хочу больше зарабатывать", BRIDGE_MESSAGE),
        ("Да, но как мне заработать денег?", BRIDGE_MESSAGE),
        ("нет денег, как быть с карьерой?", BRIDGE_MESSAGE),
        ("Да, кто тебя создал?", IDENTITY_REPLY),
        ("ок, ты ChatGPT?", IDENTITY_REPLY),
    ] {
        assert_eq!(engine.respond(&user(), input).await.messages, [expected], "{input}");
    }
    assert_eq!(generator.total(), 0);

    assert_eq!(engine.respond(&user(), "да").await.messages, ["свободный ответ"]);
}

#[tokio::test]
async fn inbound_audit_follows_processing_order() {
    let generator = FakeGenerator::new(|pass, messages| match pass {
        Pass::Classify => Scripted::text(r#"{"phases": {}}"#),
        _ => {
            let last = messages.last().map_or("", |m| m.content.as_str());
            Scripted::Delayed(Duration::from_millis(20), format!("эхо: {last}"))
        },
    });
    let (engine, memory) = engine(config(), &generator);
    let outbox = RecordingOutbox::default();
    let u = user();

    tokio::join!(
        engine.handle_message(&u, None, "первое", &outbox),
        engine.handle_message(&u, None, "второе", &outbox),
    );

    let log = memory.recent_messages(&u, 10).await.unwrap();
    let rows: Vec<(Direction, &str)> = log.iter().map(|e| (e.direction, e.text.as_str())).collect();
    assert_eq!(
        rows,
        [
            (Direction::In, "первое"),
            (Direction::Out, "эхо: первое"),
            (Direction::In, "второе"),
            (Direction::Out, "эхо: второе"),
        ]
    );
}

#[tokio::test]
async fn released_session_is_rebuilt_from_storage() {
    let generator = FakeGenerator::new(|pass, _| match pass {
        Pass::Classify => Scripted::text(r#"{"phases": {"a": true}}"#),
        _ => Scripted::text("Слышу."),
    });
    let (engine, _) = engine(config(), &generator);

    engine.respond(&user(), "я люблю горы").await;
    engine.release_session(&user()).await;
    assert_eq!(engine.history().cached_users(), 0);
    assert_eq!(engine.phases().cached_users(), 0);

    engine.respond(&user(), "и море").await;
    let request = generator.last_request(Pass::Reply).unwrap();
    assert!(request.iter().any(|m| m.content == "я люблю горы"));
    assert!(engine.phases().state(&user()).await.completed_phases.contains("a"));
}

#[tokio::test]
async fn degraded_sessions_are_kept_in_memory() {
    let generator = FakeGenerator::chatty("Я рядом.");
    let (engine, memory) = engine(config(), &generator);
    memory.set_unavailable(true);

    engine.respond(&user(), "привет").await;
    engine.release_session(&user()).await;
    assert_eq!(engine.history().len(&user()).await, 2);
}
