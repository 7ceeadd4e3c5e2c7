//! Core types for AILVI
//!
//! Domain types, the phase state machine, intent classification and the
//! content guard. Everything here is pure; I/O lives in the other crates.

mod config;
pub mod constants;
mod env_config;
mod error;
mod guard;
mod intent;
mod json_utils;
mod outbox;
pub mod persona;
mod phase;
mod session;
mod text;

pub use config::EngineConfig;
pub use env_config::{
    env_list, env_non_empty, env_parse_optional, env_parse_with_default, env_required,
};
pub use error::*;
pub use guard::{ContentGuard, GuardVerdict};
pub use intent::{Intent, IntentClassifier};
pub use json_utils::{extract_json_object, parse_model_json, strip_markdown_json};
pub use outbox::Outbox;
pub use phase::{Phase, PhaseCatalog, PhaseMode, PhaseState};
pub use session::*;
pub use text::{split_message, truncate_bytes};
