//! SQLite backend for the Strata analytics store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Each ingestion run executes
//! inside a single SQLite transaction.

mod encode;
mod schema;
mod store;
mod ops;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
