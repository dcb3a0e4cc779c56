//! CSV snapshot loading and table export for Strata.
//!
//! The loader maps the analytics export's inconsistent headers onto the
//! canonical columns of [`strata_core`] rows through a static alias table,
//! and reports what it could not map instead of failing on it. The exporter
//! writes persisted tables and aggregates back out as flat CSV files.

mod alias;

pub mod error;
pub mod export;
pub mod load;

pub use error::{Error, Result};
pub use export::{export_aggregates, export_store_tables};
pub use load::{load_facts, load_pages, load_people};
