//! Storage layer for AILVI
//!
//! Per-user history, phase state, summaries and the message audit log behind
//! keyed async traits. SQLite is the default durable backend; PostgreSQL is
//! available behind the `postgres` feature.

mod backend;
pub mod error;
mod memory;
#[cfg(feature = "sqlite")]
mod migrations;
#[cfg(feature = "postgres")]
mod pg_migrations;
#[cfg(feature = "postgres")]
pub mod pg_storage;
#[cfg(feature = "sqlite")]
mod sqlite_async;
#[cfg(feature = "sqlite")]
mod storage;
#[cfg(test)]
mod tests;
pub mod traits;

pub use backend::StorageBackend;
pub use error::StorageError;
pub use memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use storage::Storage;
