//! Scripted fakes shared by the service tests.

use std::sync::Arc;
use std::time::Duration;

use ailvi_core::{CoreError, Outbox, UserId};
use ailvi_llm::{GenerationParams, Generator, LlmError, Message};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Which pass a request belongs to, recognised from its system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Reply,
    Classify,
    Extract,
    Merge,
    Synthesize,
}

impl Pass {
    fn of(messages: &[Message]) -> Self {
        let system = messages.first().map_or("", |m| m.content.as_str());
        if system.contains("Для каждой темы") {
            Self::Classify
        } else if system.contains("выписываешь") {
            Self::Extract
        } else if system.contains("Объедини") {
            Self::Merge
        } else if system.contains("Твои ценности") {
            Self::Synthesize
        } else {
            Self::Reply
        }
    }
}

pub enum Scripted {
    Text(String),
    /// Answers after a pause, letting other tasks run meanwhile.
    Delayed(Duration, String),
    Fail(u16),
    Hang,
}

impl Scripted {
    pub fn text(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

type Script = dyn Fn(Pass, &[Message]) -> Scripted + Send + Sync;

/// Generator whose answers come from a closure; records every call.
pub struct FakeGenerator {
    script: Box<Script>,
    calls: Mutex<Vec<(Pass, Vec<Message>)>>,
}

impl FakeGenerator {
    pub fn new(script: impl Fn(Pass, &[Message]) -> Scripted + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { script: Box::new(script), calls: Mutex::new(Vec::new()) })
    }

    /// Replies with `reply` and classifies nothing as complete.
    pub fn chatty(reply: &'static str) -> Arc<Self> {
        Self::new(move |pass, _| match pass {
            Pass::Classify => Scripted::text(r#"{"phases": {}}"#),
            _ => Scripted::text(reply),
        })
    }

    pub fn count(&self, pass: Pass) -> usize {
        self.calls.lock().iter().filter(|(p, _)| *p == pass).count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_request(&self, pass: Pass) -> Option<Vec<Message>> {
        self.calls.lock().iter().rev().find(|(p, _)| *p == pass).map(|(_, m)| m.clone())
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(
        &self,
        messages: &[Message],
        _params: &GenerationParams,
    ) -> Result<String, LlmError> {
        let pass = Pass::of(messages);
        self.calls.lock().push((pass, messages.to_vec()));
        match (self.script)(pass, messages) {
            Scripted::Text(text) => Ok(text),
            Scripted::Delayed(pause, text) => {
                tokio::time::sleep(pause).await;
                Ok(text)
            },
            Scripted::Fail(code) => Err(LlmError::HttpStatus { code, body: String::new() }),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(LlmError::EmptyResponse)
            },
        }
    }
}

/// Every phase of the catalogue marked complete.
pub fn all_phases_json(ids: &[&str]) -> String {
    let flags = ids.iter().map(|id| format!("\"{id}\": true")).collect::<Vec<_>>().join(", ");
    format!(r#"{{"phases": {{{flags}}}, "note": "любит горы"}}"#)
}

#[derive(Default)]
pub struct RecordingOutbox {
    pub sent: Mutex<Vec<(UserId, String)>>,
}

impl RecordingOutbox {
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<(), CoreError> {
        self.sent.lock().push((user_id.clone(), text.to_owned()));
        Ok(())
    }
}
