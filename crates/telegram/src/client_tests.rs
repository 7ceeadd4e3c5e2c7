#![expect(clippy::unwrap_used, reason = "test code")]

use std::sync::Arc;
use std::time::Duration;

use ailvi_core::{EngineConfig, Outbox, UserId};
use ailvi_llm::{GenerationParams, Generator, LlmError, Message};
use ailvi_service::DialogueEngine;
use ailvi_storage::StorageBackend;
use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::TelegramClient;
use crate::dispatcher::Dispatcher;
use crate::error::TelegramError;
use crate::polling::run_polling;

const TOKEN: &str = "123:abc";

fn client(server: &MockServer) -> TelegramClient {
    TelegramClient::with_base_url(TOKEN.to_owned(), server.uri()).unwrap()
}

fn api_path(method: &str) -> String {
    format!("/bot{TOKEN}/{method}")
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result }))
}

fn text_update(update_id: i64, chat_id: i64, text: &str) -> serde_json::Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "chat": { "id": chat_id, "type": "private" },
            "from": { "id": chat_id, "is_bot": false, "first_name": "T" },
            "text": text
        }
    })
}

#[tokio::test]
async fn get_updates_sends_offset_and_parses_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .and(body_partial_json(json!({ "offset": 11, "timeout": 0 })))
        .respond_with(ok(json!([text_update(11, 5, "привет")])))
        .expect(1)
        .mount(&server)
        .await;

    let updates = client(&server).get_updates(Some(11), 0).await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].update_id, 11);
    assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("привет"));
}

#[tokio::test]
async fn send_message_uses_html() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 5, "text": "<b>Привет</b>", "parse_mode": "HTML" })))
        .respond_with(ok(json!({ "message_id": 1 })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).send_message(5, "<b>Привет</b>").await.unwrap();
}

#[tokio::test]
async fn rejected_markup_is_resent_as_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({ "parse_mode": "HTML" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: can't parse entities: Unsupported start tag \"br\""
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(ok(json!({ "message_id": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).send_message(5, "a <br> b").await.unwrap();
}

#[tokio::test]
async fn api_errors_are_typed_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).send_message(5, "hi").await.unwrap_err();
    assert!(matches!(err, TelegramError::Api { code: 403, .. }));
}

#[tokio::test]
async fn outbox_rejects_non_numeric_ids() {
    let server = MockServer::start().await;
    let err = client(&server).send_text(&UserId::from("anna"), "hi").await.unwrap_err();
    assert!(err.to_string().contains("anna"));
}

#[tokio::test]
async fn webhook_registration() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("setWebhook")))
        .and(body_partial_json(json!({ "url": "https://bot.example/botsecret", "secret_token": "secret" })))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("deleteWebhook")))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let telegram = client(&server);
    telegram.set_webhook("https://bot.example/botsecret", "secret").await.unwrap();
    telegram.delete_webhook().await.unwrap();
}

struct Parrot;

#[async_trait]
impl Generator for Parrot {
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<String, LlmError> {
        if params.json {
            return Ok(r#"{"phases": {}}"#.to_owned());
        }
        Ok(format!("ты сказал: {}", messages.last().map_or("", |m| m.content.as_str())))
    }
}

#[tokio::test]
async fn polling_feeds_updates_to_the_engine_and_replies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("deleteWebhook")))
        .respond_with(ok(json!(true)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .respond_with(ok(json!([text_update(1, 77, "я здесь")])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .and(body_partial_json(json!({ "offset": 2 })))
        .respond_with(ok(json!([])).set_delay(Duration::from_millis(50)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({ "chat_id": 77, "text": "ты сказал: я здесь" })))
        .respond_with(ok(json!({ "message_id": 9 })))
        .expect(1)
        .mount(&server)
        .await;

    let telegram = Arc::new(client(&server));
    let engine = DialogueEngine::new(
        EngineConfig::default(),
        Arc::new(StorageBackend::new_memory()),
        Arc::new(Parrot),
    );
    let outbox: Arc<dyn Outbox> = Arc::clone(&telegram) as Arc<dyn Outbox>;
    let dispatcher = Dispatcher::new(Arc::new(engine), outbox);

    run_polling(&telegram, &dispatcher, tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();
}
