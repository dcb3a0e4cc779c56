//! Schema validation for loaded tables.
//!
//! Validation never fails: duplicate keys and null required columns are
//! counted and surfaced in a [`TableReport`], and ingestion proceeds.
//! Structural problems (a required column missing from the header, an
//! unreadable file) are the loader's to raise.

use std::{
  cmp::Reverse,
  collections::{HashMap, HashSet},
  hash::Hash,
};

use serde::{Deserialize, Serialize};

use crate::{
  dimension::{Dimension, PageRow, PersonRow, join_index},
  fact::{FactKey, FactRow},
  snapshot::LoadedTable,
  table::Table,
};

/// How many duplicated keys a report lists for review.
pub const DUPLICATE_SAMPLE_LIMIT: usize = 10;

// ─── Reports ─────────────────────────────────────────────────────────────────

/// A key value that occurs more than once, and how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateKey {
  pub key:   String,
  pub count: usize,
}

/// Data-quality findings for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
  pub table:            Table,
  pub rows:             usize,
  /// Number of distinct key values that occur more than once. Sentinel keys
  /// are not counted.
  pub duplicate_keys:   usize,
  /// The most repeated keys, most frequent first, at most
  /// [`DUPLICATE_SAMPLE_LIMIT`] of them.
  #[serde(default)]
  pub duplicate_samples: Vec<DuplicateKey>,
  /// Rows with a null required column, including rows the loader rejected.
  pub null_violations:  usize,
  pub rejected_rows:    usize,
  pub unmapped_columns: Vec<String>,
}

impl TableReport {
  pub fn is_clean(&self) -> bool {
    self.duplicate_keys == 0
      && self.null_violations == 0
      && self.unmapped_columns.is_empty()
  }

  /// Emit one warning per finding.
  pub fn log(&self) {
    if self.duplicate_keys > 0 {
      tracing::warn!(
        table = %self.table,
        duplicate_keys = self.duplicate_keys,
        samples = ?self.duplicate_samples,
        "duplicate primary keys"
      );
    }
    if self.null_violations > 0 {
      tracing::warn!(
        table = %self.table,
        null_violations = self.null_violations,
        rejected_rows = self.rejected_rows,
        "null values in required columns"
      );
    }
    if !self.unmapped_columns.is_empty() {
      tracing::warn!(
        table = %self.table,
        columns = ?self.unmapped_columns,
        "unmapped source columns ignored"
      );
    }
    if self.is_clean() {
      tracing::debug!(table = %self.table, rows = self.rows, "table is clean");
    }
  }
}

/// Fact rows that reference a page with no dimension row.
///
/// Informational: left joins keep these rows, so they are not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanReport {
  pub orphan_rows:  usize,
  pub orphan_pages: usize,
}

// ─── Validators ──────────────────────────────────────────────────────────────

/// Validate a fact table against its soft composite key
/// (`visit_date_key`, `page_id`, `viewer_id`).
pub fn validate_facts(table: &LoadedTable<FactRow>) -> TableReport {
  fact_report(&table.rows, table.rejected_rows, &table.unmapped_columns)
}

pub(crate) fn fact_report(
  rows: &[FactRow],
  rejected_rows: usize,
  unmapped_columns: &[String],
) -> TableReport {
  let nulls = rows.iter().filter(|row| row.has_null_key_part()).count();
  let (duplicate_keys, duplicate_samples) =
    find_duplicates(rows.iter().map(FactRow::key), describe_fact_key);

  TableReport {
    table: Table::Fact,
    rows: rows.len(),
    duplicate_keys,
    duplicate_samples,
    null_violations: nulls + rejected_rows,
    rejected_rows,
    unmapped_columns: unmapped_columns.to_vec(),
  }
}

/// Validate a dimension table against its primary key, skipping sentinel
/// keys in the uniqueness check.
pub fn validate_dimension<D: Dimension>(table: &LoadedTable<D>) -> TableReport {
  dimension_report(&table.rows, table.rejected_rows, &table.unmapped_columns)
}

pub(crate) fn dimension_report<D: Dimension>(
  rows: &[D],
  rejected_rows: usize,
  unmapped_columns: &[String],
) -> TableReport {
  let keys = rows.iter().filter(|row| !row.is_sentinel()).map(Dimension::key);
  let (duplicate_keys, duplicate_samples) = find_duplicates(keys, |key| (*key).to_owned());

  TableReport {
    table: D::TABLE,
    rows: rows.len(),
    duplicate_keys,
    duplicate_samples,
    null_violations: rejected_rows,
    rejected_rows,
    unmapped_columns: unmapped_columns.to_vec(),
  }
}

pub fn validate_pages(table: &LoadedTable<PageRow>) -> TableReport {
  validate_dimension(table)
}

pub fn validate_people(table: &LoadedTable<PersonRow>) -> TableReport {
  validate_dimension(table)
}

/// Count fact rows (and distinct page ids) with no matching page row.
pub fn orphan_report(facts: &[FactRow], pages: &[PageRow]) -> OrphanReport {
  let index = join_index(pages);
  let mut orphan_pages = HashSet::new();
  let mut orphan_rows = 0;

  for row in facts {
    let Some(page_id) = row.page_id.as_deref() else { continue };
    if !index.contains_key(page_id) {
      orphan_rows += 1;
      orphan_pages.insert(page_id);
    }
  }

  OrphanReport { orphan_rows, orphan_pages: orphan_pages.len() }
}

/// The number of distinct keys seen more than once, and the most repeated
/// of them. Ties are broken by key order.
fn find_duplicates<K: Hash + Ord>(
  keys: impl Iterator<Item = K>,
  describe: impl Fn(&K) -> String,
) -> (usize, Vec<DuplicateKey>) {
  let mut seen: HashMap<K, usize> = HashMap::new();
  for key in keys {
    *seen.entry(key).or_default() += 1;
  }

  let mut duplicates: Vec<(K, usize)> = seen.into_iter().filter(|(_, n)| *n > 1).collect();
  let total = duplicates.len();
  duplicates.sort_by(|(a, na), (b, nb)| (Reverse(na), a).cmp(&(Reverse(nb), b)));

  let samples = duplicates
    .iter()
    .take(DUPLICATE_SAMPLE_LIMIT)
    .map(|(key, count)| DuplicateKey { key: describe(key), count: *count })
    .collect();
  (total, samples)
}

/// `20250101/p1/v1`, with `null` standing in for a missing part.
fn describe_fact_key(key: &FactKey<'_>) -> String {
  format!(
    "{}/{}/{}",
    key.visit_date_key,
    key.page_id.unwrap_or("null"),
    key.viewer_id.unwrap_or("null")
  )
}
