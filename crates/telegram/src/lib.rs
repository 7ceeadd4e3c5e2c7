//! Telegram transport for AILVI
//!
//! Bot API client, update types, the per-user FIFO dispatcher and the
//! long-polling loop. The webhook endpoint lives in `ailvi-http`.

#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(missing_debug_implementations, reason = "Internal types")]

mod client;
mod dispatcher;
pub mod error;
mod polling;
pub mod types;

#[cfg(test)]
mod client_tests;

pub use client::{DEFAULT_API_BASE, POLL_TIMEOUT_SECS, TelegramClient};
pub use dispatcher::Dispatcher;
pub use error::TelegramError;
pub use polling::run_polling;
pub use types::{Inbound, Update};
