//! Service layer for AILVI
//!
//! The session and dialogue-state engine: history, phase tracking, content
//! guard, generation orchestration and the summary pipeline, between the
//! chat transport and storage/llm.

#![allow(missing_docs, reason = "Internal crate with self-explanatory API")]
#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(missing_debug_implementations, reason = "Internal types")]
#![allow(clippy::implicit_return, reason = "Implicit return is idiomatic Rust")]
#![allow(clippy::question_mark_used, reason = "? operator is idiomatic Rust")]
#![allow(clippy::cognitive_complexity, reason = "Complex async flows are inherent")]
#![allow(clippy::min_ident_chars, reason = "Short error vars are idiomatic")]

mod command;
mod engine;
mod error;
mod history;
mod locks;
mod paywall;
mod phase_tracker;
mod summary_builder;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod test_support;

pub use command::Command;
pub use engine::{DialogueEngine, Reply};
pub use error::ServiceError;
pub use history::HistoryStore;
pub use locks::{SessionGuard, SessionLocks};
pub use paywall::Paywall;
pub use phase_tracker::PhaseTracker;
pub use summary_builder::{SummaryBuilder, SummaryOutcome};
