//! The dialogue engine: one inbound text in, zero or more outbound texts out.

use std::sync::Arc;

use ailvi_core::persona::{
    APOLOGY, BRIDGE_MESSAGE, HEALTH_OK, IDENTITY_REPLY, OFFER_DECLINED, ONBOARDING,
    PERSONA_SYSTEM_PROMPT, START_TEXT, SUMMARY_NOT_READY, SUMMARY_OFFER, SUMMARY_PREPARING,
    SUMMARY_RETRY_LATER, UPSELL,
};
use ailvi_core::{
    Direction, EngineConfig, Intent, IntentClassifier, MessageLogEntry, Outbox, PhaseState, Role,
    Turn, UserId, split_message,
};
use ailvi_llm::{GenerationParams, Generator, Message, run_generation};
use ailvi_storage::StorageBackend;
use ailvi_storage::traits::MessageLogStore;

use crate::command::Command;
use crate::error::ServiceError;
use crate::history::HistoryStore;
use crate::locks::SessionLocks;
use crate::paywall::Paywall;
use crate::phase_tracker::PhaseTracker;
use crate::summary_builder::{SummaryBuilder, SummaryOutcome};

/// Outbound texts for one inbound message, already split to transport size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub messages: Vec<String>,
}

/// Where outbound texts go while a message is processed.
enum Sink<'a> {
    Collect(Vec<String>),
    Deliver(&'a dyn Outbox),
}

pub struct DialogueEngine {
    config: Arc<EngineConfig>,
    storage: Arc<StorageBackend>,
    generator: Arc<dyn Generator>,
    history: Arc<HistoryStore>,
    tracker: Arc<PhaseTracker>,
    summaries: SummaryBuilder,
    locks: SessionLocks,
    intents: IntentClassifier,
    paywall: Paywall,
}

impl DialogueEngine {
    #[must_use]
    pub fn new(
        config: EngineConfig,
        storage: Arc<StorageBackend>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let config = Arc::new(config);
        let history = Arc::new(HistoryStore::new(Arc::clone(&storage)));
        let tracker = Arc::new(PhaseTracker::new(
            Arc::clone(&storage),
            Arc::clone(&generator),
            Arc::clone(&config),
        ));
        let summaries = SummaryBuilder::new(
            Arc::clone(&storage),
            Arc::clone(&generator),
            Arc::clone(&history),
            Arc::clone(&tracker),
            Arc::clone(&config),
        );
        Self {
            intents: IntentClassifier::new(&config.begin_keyword),
            paywall: Paywall::new(Arc::clone(&config)),
            config,
            storage,
            generator,
            history,
            tracker,
            summaries,
            locks: SessionLocks::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    #[must_use]
    pub fn phases(&self) -> &PhaseTracker {
        &self.tracker
    }

    /// Whether any part of the engine has fallen back to cache-only state.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.history.is_degraded() || self.tracker.is_degraded()
    }

    /// Processes one inbound text and returns everything that should be sent.
    pub async fn respond(&self, user_id: &UserId, input: &str) -> Reply {
        let mut sink = Sink::Collect(Vec::new());
        self.process(user_id, None, input, &mut sink).await;
        match sink {
            Sink::Collect(messages) => Reply { messages },
            Sink::Deliver(_) => Reply::default(),
        }
    }

    /// Same flow as [`Self::respond`], but every text is sent through
    /// `outbox` as soon as it is ready, so placeholders arrive before long
    /// work finishes. Delivery failures are logged and do not stop the flow.
    pub async fn handle_message(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        input: &str,
        outbox: &dyn Outbox,
    ) {
        let mut sink = Sink::Deliver(outbox);
        self.process(user_id, username, input, &mut sink).await;
    }

    /// Runs the summary pipeline outside of a conversation.
    ///
    /// # Errors
    /// [`ServiceError::SummaryNotOffered`] if the user has not been offered
    /// a summary yet.
    pub async fn summarize(&self, user_id: &UserId) -> Result<SummaryOutcome, ServiceError> {
        let _guard = self.locks.lock(user_id).await;
        self.summaries.summarize(user_id).await
    }

    /// Drops the user's cached history and phase state once their session
    /// has gone idle. The next message rehydrates both from the durable
    /// store. Nothing is dropped while storage is unavailable, since the
    /// cache is then the only copy.
    pub async fn release_session(&self, user_id: &UserId) {
        let _guard = self.locks.lock(user_id).await;
        let history = self.history.evict(user_id);
        let phases = self.tracker.evict(user_id);
        tracing::debug!(user_id = %user_id, history, phases, "session released");
    }

    async fn process(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        input: &str,
        sink: &mut Sink<'_>,
    ) {
        let command = Command::parse(input);
        if command == Some(Command::Health) {
            self.audit(user_id, username, Direction::In, input).await;
            self.emit(sink, user_id, HEALTH_OK).await;
            return;
        }

        let _guard = self.locks.lock(user_id).await;
        self.audit(user_id, username, Direction::In, input).await;
        match command {
            Some(command) => {
                tracing::debug!(user_id = %user_id, ?command, "command");
                self.run_command(command, user_id, sink).await;
            },
            None => self.converse(user_id, input, sink).await,
        }
    }

    /// Runs a command. The caller holds the user's lock.
    async fn run_command(&self, command: Command, user_id: &UserId, sink: &mut Sink<'_>) {
        match command {
            Command::Health => self.emit(sink, user_id, HEALTH_OK).await,
            Command::Start => {
                self.tracker.reset(user_id).await;
                self.history.clear(user_id).await;
                self.emit(sink, user_id, START_TEXT).await;
            },
            Command::Summary => self.summary_flow(user_id, sink, false).await,
        }
    }

    async fn converse(&self, user_id: &UserId, input: &str, sink: &mut Sink<'_>) {
        let intent = self.intents.classify(input);
        let state = self.tracker.state(user_id).await;

        if intent == Intent::Begin {
            self.tracker.reset(user_id).await;
            self.history.clear(user_id).await;
            self.history.append(user_id, Role::User, input).await;
            self.say(sink, user_id, ONBOARDING).await;
            return;
        }

        if state.offer_pending() && intent.is_reply_to_offer() {
            self.history.append(user_id, Role::User, input).await;
            if intent == Intent::Affirmative {
                self.summary_flow(user_id, sink, true).await;
            } else {
                self.say(sink, user_id, OFFER_DECLINED).await;
            }
            return;
        }

        // Yes/no words only matter as offer answers. Past this point the
        // topic decides, even after a leading "да" or "хочу".
        let intent = Intent::classify_topic(input);
        let foundation =
            state.foundation_complete(&self.config.phases, self.config.foundation_phases);
        let fixed = match intent {
            Intent::IdentityQuestion => Some(IDENTITY_REPLY),
            Intent::PrematureTopic if !foundation => Some(BRIDGE_MESSAGE),
            _ if !self.paywall.admits(user_id, state.messages_used) => {
                tracing::info!(user_id = %user_id, used = state.messages_used, "free message limit reached");
                Some(UPSELL)
            },
            _ => None,
        };

        self.history.append(user_id, Role::User, input).await;
        if let Some(text) = fixed {
            self.say(sink, user_id, text).await;
            return;
        }
        self.generate_reply(user_id, input, sink).await;
    }

    async fn generate_reply(&self, user_id: &UserId, input: &str, sink: &mut Sink<'_>) {
        let state = self.tracker.record_usage(user_id).await;
        let window = self.history.window(user_id, self.config.history_window).await;
        let messages = self.build_messages(&state, &window, input);
        let params = GenerationParams {
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            json: false,
        };

        let outcome = run_generation(
            self.generator.as_ref(),
            &messages,
            &params,
            self.config.generation_timeout,
        )
        .await;

        let Some(text) = outcome.text.filter(|_| outcome.success) else {
            self.say(sink, user_id, APOLOGY).await;
            return;
        };

        let foundation =
            state.foundation_complete(&self.config.phases, self.config.foundation_phases);
        let verdict = self.config.guard.inspect_for_stage(&text, foundation);
        if verdict.flagged {
            tracing::info!(
                user_id = %user_id,
                matched = verdict.matched.as_deref().unwrap_or_default(),
                "generated reply replaced by content guard"
            );
        }
        self.say(sink, user_id, &verdict.safe_text).await;

        let recent = self.history.window(user_id, self.config.classify_window).await;
        self.tracker.update(user_id, &recent).await;
        if self.tracker.try_offer(user_id).await {
            self.say(sink, user_id, SUMMARY_OFFER).await;
        }
    }

    /// Persona prompt, note and current phase, then the window. The input is
    /// appended when the window does not already end with it.
    fn build_messages(&self, state: &PhaseState, window: &[Turn], input: &str) -> Vec<Message> {
        let mut system = PERSONA_SYSTEM_PROMPT.to_owned();
        if !state.free_text_note.is_empty() {
            system.push_str("\n\nЧто ты уже знаешь о человеке: ");
            system.push_str(&state.free_text_note);
        }
        if let Some(phase) = state.current_phase(&self.config.phases) {
            system.push_str(&format!("\n\nТекущая тема: {}. {}", phase.title, phase.instruction));
        }

        let mut messages = Vec::with_capacity(window.len().saturating_add(2));
        messages.push(Message::system(system));
        messages.extend(window.iter().map(Message::from));
        if window.last().is_none_or(|t| t.role != Role::User || t.content != input) {
            messages.push(Message::user(input));
        }
        messages
    }

    /// Sends the placeholder, runs the pipeline and sends its result. With
    /// `remember` the texts are also appended to history.
    async fn summary_flow(&self, user_id: &UserId, sink: &mut Sink<'_>, remember: bool) {
        let state = self.tracker.state(user_id).await;
        if !state.offered_summary {
            self.reply(sink, user_id, SUMMARY_NOT_READY, remember).await;
            return;
        }

        self.reply(sink, user_id, SUMMARY_PREPARING, remember).await;
        let text = match self.summaries.summarize(user_id).await {
            Ok(SummaryOutcome::Delivered(summary)) => summary.text,
            Ok(SummaryOutcome::RetryLater) => SUMMARY_RETRY_LATER.to_owned(),
            Err(e) if e.is_transient() => {
                tracing::warn!(user_id = %user_id, error = %e, "summary failed");
                SUMMARY_RETRY_LATER.to_owned()
            },
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "summary refused");
                SUMMARY_NOT_READY.to_owned()
            },
        };
        self.reply(sink, user_id, &text, remember).await;
    }

    async fn reply(&self, sink: &mut Sink<'_>, user_id: &UserId, text: &str, remember: bool) {
        if remember {
            self.say(sink, user_id, text).await;
        } else {
            self.emit(sink, user_id, text).await;
        }
    }

    /// Appends an assistant turn and sends it.
    async fn say(&self, sink: &mut Sink<'_>, user_id: &UserId, text: &str) {
        self.history.append(user_id, Role::Assistant, text).await;
        self.emit(sink, user_id, text).await;
    }

    async fn emit(&self, sink: &mut Sink<'_>, user_id: &UserId, text: &str) {
        for part in split_message(text, self.config.max_message_chars) {
            self.audit(user_id, None, Direction::Out, &part).await;
            match sink {
                Sink::Collect(parts) => parts.push(part),
                Sink::Deliver(outbox) => {
                    if let Err(e) = outbox.send_text(user_id, &part).await {
                        tracing::warn!(user_id = %user_id, error = %e, "delivery failed");
                    }
                },
            }
        }
    }

    async fn audit(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        direction: Direction,
        text: &str,
    ) {
        let entry =
            MessageLogEntry::new(user_id.clone(), username.map(str::to_owned), direction, text);
        if let Err(e) = self.storage.log_message(&entry).await {
            if self.is_degraded() {
                tracing::debug!(user_id = %user_id, error = %e, "audit log skipped");
            } else {
                tracing::warn!(user_id = %user_id, error = %e, "audit log write failed");
            }
        }
    }
}
