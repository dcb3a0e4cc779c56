//! A table as produced by a snapshot loader.

/// Typed rows read from one snapshot file, plus what the loader had to set
/// aside while reading it.
#[derive(Debug, Clone)]
pub struct LoadedTable<R> {
  pub rows:             Vec<R>,
  /// Rows dropped because a column they cannot exist without (the fact date,
  /// a dimension's primary key) was empty.
  pub rejected_rows:    usize,
  /// Source headers that matched no canonical column. Their values are
  /// ignored.
  pub unmapped_columns: Vec<String>,
}

impl<R> LoadedTable<R> {
  /// Wrap rows that did not come from a file (tests, post-merge checks).
  pub fn from_rows(rows: Vec<R>) -> Self {
    Self { rows, rejected_rows: 0, unmapped_columns: Vec::new() }
  }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}
