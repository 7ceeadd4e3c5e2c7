//! The generation seam and its single typed-result adapter.
//!
//! Everything in the engine that talks to the model goes through
//! [`Generator`]. Conversational replies are additionally funnelled through
//! [`run_generation`], which turns every possible failure into one
//! [`GenerationOutcome`] shape.

use std::time::Duration;

use ailvi_core::constants::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use async_trait::async_trait;

use crate::ai_types::Message;
use crate::error::LlmError;

/// Sampling parameters for one call. Tunables, not protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the API for a JSON object response.
    pub json: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: DEFAULT_TEMPERATURE, max_tokens: DEFAULT_MAX_TOKENS, json: false }
    }
}

impl GenerationParams {
    /// Low-temperature JSON mode for structured passes.
    #[must_use]
    pub const fn structured(max_tokens: u32) -> Self {
        Self { temperature: 0.2, max_tokens, json: true }
    }
}

/// Anything that can turn an ordered message list into text.
#[async_trait]
pub trait Generator: Send + Sync {
    /// # Errors
    /// Returns [`LlmError`] on transport, status or parse failure.
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    Timeout,
    RateLimited,
    /// 5xx or other non-success status from the API.
    Upstream,
    /// Connection or TLS failure.
    Transport,
    /// Body could not be parsed.
    Malformed,
    /// Parsed, but no usable text.
    Empty,
    /// Auth or configuration problem (4xx other than 429).
    Rejected,
}

impl GenerationErrorKind {
    #[must_use]
    pub fn from_error(err: &LlmError) -> Self {
        match err.root() {
            LlmError::HttpStatus { code: 429, .. } => Self::RateLimited,
            LlmError::HttpStatus { code, .. } if *code >= 500 => Self::Upstream,
            LlmError::HttpStatus { .. } | LlmError::ClientInit(_) => Self::Rejected,
            LlmError::HttpRequest(e) if e.is_timeout() => Self::Timeout,
            LlmError::HttpRequest(_) => Self::Transport,
            LlmError::JsonParse { .. } | LlmError::MissingField(_) => Self::Malformed,
            LlmError::EmptyResponse | LlmError::RetriesExhausted(_) => Self::Empty,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Upstream => "upstream",
            Self::Transport => "transport",
            Self::Malformed => "malformed",
            Self::Empty => "empty",
            Self::Rejected => "rejected",
        }
    }
}

/// Uniform result of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub success: bool,
    pub text: Option<String>,
    pub error: Option<GenerationErrorKind>,
}

impl GenerationOutcome {
    #[must_use]
    pub const fn ok(text: String) -> Self {
        Self { success: true, text: Some(text), error: None }
    }

    #[must_use]
    pub const fn failed(kind: GenerationErrorKind) -> Self {
        Self { success: false, text: None, error: Some(kind) }
    }
}

/// Calls `generator` under `timeout` and folds the result into a
/// [`GenerationOutcome`]. A timeout is a failure and is not retried here.
pub async fn run_generation(
    generator: &dyn Generator,
    messages: &[Message],
    params: &GenerationParams,
    timeout: Duration,
) -> GenerationOutcome {
    match tokio::time::timeout(timeout, generator.generate(messages, params)).await {
        Ok(Ok(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                GenerationOutcome::failed(GenerationErrorKind::Empty)
            } else {
                GenerationOutcome::ok(trimmed.to_owned())
            }
        },
        Ok(Err(e)) => {
            let kind = GenerationErrorKind::from_error(&e);
            tracing::warn!(error = %e, kind = kind.as_str(), "generation failed");
            GenerationOutcome::failed(kind)
        },
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "generation timed out");
            GenerationOutcome::failed(GenerationErrorKind::Timeout)
        },
    }
}
