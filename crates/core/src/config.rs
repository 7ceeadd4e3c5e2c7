//! Dialogue engine configuration loaded from the environment.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BEGIN_KEYWORD, DEFAULT_CLASSIFY_WINDOW, DEFAULT_FOUNDATION_PHASES,
    DEFAULT_GENERATION_TIMEOUT_SECS, DEFAULT_HISTORY_WINDOW, DEFAULT_MAX_MESSAGE_CHARS,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SUMMARY_CHUNK_TURNS, DEFAULT_TEMPERATURE,
};
use crate::env_config::{env_list, env_non_empty, env_parse_optional, env_parse_with_default};
use crate::error::ConfigError;
use crate::guard::ContentGuard;
use crate::phase::{PhaseCatalog, PhaseMode};
use crate::session::UserId;

/// Everything the engine needs besides its collaborators. Read-only after
/// startup and shared across sessions.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_window: usize,
    pub classify_window: usize,
    pub summary_chunk_turns: usize,
    pub generation_timeout: Duration,
    pub phases: PhaseCatalog,
    pub phase_mode: PhaseMode,
    pub foundation_phases: usize,
    pub begin_keyword: String,
    pub free_message_limit: Option<u32>,
    pub allowlist: BTreeSet<UserId>,
    pub max_message_chars: usize,
    pub guard: ContentGuard,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            history_window: DEFAULT_HISTORY_WINDOW,
            classify_window: DEFAULT_CLASSIFY_WINDOW,
            summary_chunk_turns: DEFAULT_SUMMARY_CHUNK_TURNS,
            generation_timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
            phases: PhaseCatalog::default(),
            phase_mode: PhaseMode::default(),
            foundation_phases: DEFAULT_FOUNDATION_PHASES,
            begin_keyword: DEFAULT_BEGIN_KEYWORD.to_owned(),
            free_message_limit: None,
            allowlist: BTreeSet::new(),
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            guard: ContentGuard::default(),
        }
    }
}

impl EngineConfig {
    /// Reads every `AILVI_*` tunable. Numeric values that fail to parse fall
    /// back to defaults with a warning; structural values (phase list, phase
    /// mode) are errors.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a malformed `AILVI_PHASES` or
    /// `AILVI_PHASE_MODE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let phases = match env_non_empty("AILVI_PHASES") {
            Some(raw) => PhaseCatalog::parse(&raw)?,
            None => PhaseCatalog::default(),
        };
        let phase_mode = match env_non_empty("AILVI_PHASE_MODE") {
            Some(raw) => raw.parse()?,
            None => PhaseMode::default(),
        };

        let config = Self {
            model: env_non_empty("AILVI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            temperature: env_parse_with_default("AILVI_TEMPERATURE", DEFAULT_TEMPERATURE),
            max_tokens: env_parse_with_default("AILVI_MAX_TOKENS", DEFAULT_MAX_TOKENS),
            history_window: env_parse_with_default("AILVI_HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW),
            classify_window: env_parse_with_default(
                "AILVI_CLASSIFY_WINDOW",
                DEFAULT_CLASSIFY_WINDOW,
            ),
            summary_chunk_turns: env_parse_with_default(
                "AILVI_SUMMARY_CHUNK_TURNS",
                DEFAULT_SUMMARY_CHUNK_TURNS,
            )
            .max(1),
            generation_timeout: Duration::from_secs(env_parse_with_default(
                "AILVI_GENERATION_TIMEOUT_SECS",
                DEFAULT_GENERATION_TIMEOUT_SECS,
            )),
            phases,
            phase_mode,
            foundation_phases: env_parse_with_default(
                "AILVI_FOUNDATION_PHASES",
                DEFAULT_FOUNDATION_PHASES,
            ),
            begin_keyword: env_non_empty("AILVI_BEGIN_KEYWORD")
                .unwrap_or_else(|| DEFAULT_BEGIN_KEYWORD.to_owned()),
            free_message_limit: env_parse_optional("AILVI_FREE_MESSAGE_LIMIT"),
            allowlist: env_list("AILVI_ALLOWLIST").into_iter().map(UserId::new).collect(),
            max_message_chars: env_parse_with_default(
                "AILVI_MAX_MESSAGE_CHARS",
                DEFAULT_MAX_MESSAGE_CHARS,
            )
            .max(1),
            guard: ContentGuard::new(&env_list("AILVI_DENY_TERMS"), &[]),
        };

        tracing::debug!(
            model = %config.model,
            phases = config.phases.len(),
            phase_mode = ?config.phase_mode,
            free_message_limit = ?config.free_message_limit,
            "engine config loaded"
        );
        Ok(config)
    }

    #[must_use]
    pub fn with_phases(mut self, phases: PhaseCatalog) -> Self {
        self.phases = phases;
        self
    }

    #[must_use]
    pub const fn with_phase_mode(mut self, mode: PhaseMode) -> Self {
        self.phase_mode = mode;
        self
    }

    #[must_use]
    pub fn with_free_message_limit(mut self, limit: u32, allowlist: &[&str]) -> Self {
        self.free_message_limit = Some(limit);
        self.allowlist = allowlist.iter().map(|id| UserId::from(*id)).collect();
        self
    }

    #[must_use]
    pub const fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_guard(mut self, guard: ContentGuard) -> Self {
        self.guard = guard;
        self
    }

    #[must_use]
    pub const fn with_foundation_phases(mut self, count: usize) -> Self {
        self.foundation_phases = count;
        self
    }

    #[must_use]
    pub const fn with_summary_chunk_turns(mut self, turns: usize) -> Self {
        self.summary_chunk_turns = if turns == 0 { 1 } else { turns };
        self
    }

    #[must_use]
    pub fn is_allowlisted(&self, user_id: &UserId) -> bool {
        self.allowlist.contains(user_id)
    }
}
