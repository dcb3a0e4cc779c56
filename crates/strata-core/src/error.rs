//! Error types for `strata-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid date key: {0:?}")]
  InvalidDateKey(String),

  #[error("invalid year-month key: {0}")]
  InvalidYearMonth(i64),

  #[error("nothing to ingest: the fact snapshot is empty and the store holds no facts")]
  NothingToIngest,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
