//! Typed error enum for the service layer.
//!
//! Most engine failures never surface: generation, classification and
//! persistence problems are absorbed into fixed persona replies or
//! cache-only operation. What remains is reported here.

use ailvi_core::UserId;
use ailvi_llm::LlmError;
use ailvi_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage operation failed.
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// LLM API call failed.
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    /// A summary was requested before the user accepted an offer.
    #[error("no summary offer was made to user {0}")]
    SummaryNotOffered(UserId),

    /// A summary step produced nothing usable.
    #[error("summary pipeline: {0}")]
    Pipeline(String),
}

impl ServiceError {
    /// Whether this error is likely transient (worth retrying).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Llm(e) => e.is_transient(),
            Self::SummaryNotOffered(_) | Self::Pipeline(_) => false,
        }
    }
}
