//! Error type for `strata-csv`.

use std::path::PathBuf;

use strata_core::table::Table;
use thiserror::Error;

/// A structural failure. Data-quality findings are never errors; they are
/// counted in the loaded table instead.
#[derive(Debug, Error)]
pub enum Error {
  #[error("cannot open {}: {source}", path.display())]
  Open {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed csv: {0}")]
  Csv(#[from] csv::Error),

  #[error("{table} snapshot has no {column} column")]
  MissingColumn { table: Table, column: &'static str },

  #[error("{table} snapshot line {line}: {value:?} is not a valid {column}")]
  InvalidValue {
    table:  Table,
    line:   u64,
    column: &'static str,
    value:  String,
  },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
