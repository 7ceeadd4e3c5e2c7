//! LLM integration for AILVI
//!
//! OpenAI-compatible chat-completion client, the [`Generator`] seam, the
//! typed [`GenerationOutcome`] adapter, and the prompts for phase
//! classification and the summary pipeline.

pub mod ai_types;
pub mod classification;
mod client;
pub mod error;
mod generator;
pub mod summary;


pub use ai_types::{ChatRequest, Message, ResponseFormat};
pub use classification::{PhaseClassification, classify_phases};
pub use client::LlmClient;
pub use error::LlmError;
pub use generator::{
    GenerationErrorKind, GenerationOutcome, GenerationParams, Generator, run_generation,
};
pub use summary::SummaryFacts;
