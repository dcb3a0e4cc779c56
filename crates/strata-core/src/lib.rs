//! Core types and pure pipeline logic for the Strata analytics store.
//!
//! This crate is deliberately free of file-format and database dependencies.
//! It owns the data model, the calendar generator, the snapshot validator,
//! the merge planner and the aggregation engine. Loaders (`strata-csv`) and
//! storage backends (`strata-store-sqlite`) depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod calendar;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod key;
pub mod merge;
pub mod report;
pub mod snapshot;
pub mod store;
pub mod table;
pub mod validate;

pub use error::{Error, Result};
