//! Shared defaults for AILVI.
//!
//! Every value here is a tunable; the matching environment variable is named
//! next to it.

/// Default chat model (`AILVI_MODEL`).
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default API base URL (`OPENAI_BASE_URL`).
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Sampling temperature for conversational replies (`AILVI_TEMPERATURE`).
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Output token cap for conversational replies (`AILVI_MAX_TOKENS`).
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// Turns sent to the model with every reply (`AILVI_HISTORY_WINDOW`).
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Turns inspected by a classification pass (`AILVI_CLASSIFY_WINDOW`).
pub const DEFAULT_CLASSIFY_WINDOW: usize = 8;

/// Turns per summary extraction chunk (`AILVI_SUMMARY_CHUNK_TURNS`).
pub const DEFAULT_SUMMARY_CHUNK_TURNS: usize = 60;

/// Upper bound for one generation call (`AILVI_GENERATION_TIMEOUT_SECS`).
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

/// Leading phases that must be complete before money/career talk
/// (`AILVI_FOUNDATION_PHASES`).
pub const DEFAULT_FOUNDATION_PHASES: usize = 3;

/// Keyword that starts the guided flow (`AILVI_BEGIN_KEYWORD`).
pub const DEFAULT_BEGIN_KEYWORD: &str = "начинаем";

/// Telegram rejects messages above 4096 chars; stay well below
/// (`AILVI_MAX_MESSAGE_CHARS`).
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 3800;

/// Stored free-text note is cut to this many bytes.
pub const MAX_NOTE_BYTES: usize = 600;

/// Health server port (`PORT`).
pub const DEFAULT_PORT: u16 = 10000;
