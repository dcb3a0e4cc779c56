//! The incremental merge engine.
//!
//! A merge is planned from the incoming snapshot alone, then executed either
//! in memory ([`FactMerge::apply`], [`DimensionMerge::apply`]) or by a storage
//! backend translating the plan into its own statements. Both paths must
//! produce the same table.
//!
//! - Facts are replaced by date range: every persisted row whose day falls
//!   inside the snapshot's `[min, max]` range is dropped, then the snapshot is
//!   appended. The replace is all-or-nothing per day, never per row.
//! - Dimensions are upserted by key: persisted rows whose key appears in the
//!   snapshot are dropped (and so wholly overwritten), the rest are retained.
//!
//! Both operations are idempotent: merging the same snapshot twice leaves the
//! same table as merging it once.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{dimension::Dimension, fact::FactRow, key::DateKey, table::Table};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How a snapshot is reconciled with the persisted store.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
  /// Replace-by-range for facts, upsert-by-key for dimensions; history
  /// outside the snapshot is retained.
  #[default]
  Incremental,
  /// Discard all persisted state in favour of the snapshot.
  FullRefresh,
}

/// Inclusive range of date keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
  pub start: DateKey,
  pub end:   DateKey,
}

impl DateRange {
  /// The smallest range covering every key, or `None` for no keys.
  pub fn covering(keys: impl IntoIterator<Item = DateKey>) -> Option<Self> {
    keys.into_iter().fold(None, |range, key| {
      Some(match range {
        None => Self { start: key, end: key },
        Some(Self { start, end }) => Self { start: start.min(key), end: end.max(key) },
      })
    })
  }

  pub fn contains(&self, key: DateKey) -> bool { self.start <= key && key <= self.end }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Row accounting for one table's merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
  pub table:          Table,
  pub policy:         MergePolicy,
  pub rows_before:    usize,
  pub rows_incoming:  usize,
  pub rows_removed:   usize,
  pub rows_after:     usize,
  /// The day range that was replaced, for an incremental fact merge.
  pub replaced_range: Option<DateRange>,
}

impl MergeOutcome {
  pub fn log(&self) {
    tracing::info!(
      table = %self.table,
      policy = ?self.policy,
      before = self.rows_before,
      incoming = self.rows_incoming,
      removed = self.rows_removed,
      after = self.rows_after,
      range = ?self.replaced_range.map(|r| (r.start.get(), r.end.get())),
      "merged"
    );
  }
}

// ─── Fact merge ──────────────────────────────────────────────────────────────

/// What a fact merge does to the persisted rows before the snapshot is
/// appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactMerge {
  /// Drop every persisted row.
  Truncate,
  /// Drop persisted rows dated inside the range.
  ReplaceRange(DateRange),
  /// The snapshot is empty; nothing is replaced.
  Retain,
}

impl FactMerge {
  pub fn plan(incoming: &[FactRow], policy: MergePolicy) -> Self {
    match policy {
      MergePolicy::FullRefresh => Self::Truncate,
      MergePolicy::Incremental => {
        DateRange::covering(incoming.iter().map(|row| row.visit_date_key))
          .map_or(Self::Retain, Self::ReplaceRange)
      }
    }
  }

  /// Whether a persisted row survives the merge.
  pub fn retains(&self, row: &FactRow) -> bool {
    match self {
      Self::Truncate => false,
      Self::ReplaceRange(range) => !range.contains(row.visit_date_key),
      Self::Retain => true,
    }
  }

  pub fn replaced_range(&self) -> Option<DateRange> {
    match self {
      Self::ReplaceRange(range) => Some(*range),
      Self::Truncate | Self::Retain => None,
    }
  }

  /// Execute the plan in memory: retained persisted rows, then the snapshot.
  pub fn apply(
    &self,
    persisted: Vec<FactRow>,
    incoming: Vec<FactRow>,
    policy: MergePolicy,
  ) -> (Vec<FactRow>, MergeOutcome) {
    let rows_before = persisted.len();
    let rows_incoming = incoming.len();

    let mut merged: Vec<FactRow> =
      persisted.into_iter().filter(|row| self.retains(row)).collect();
    let rows_removed = rows_before - merged.len();
    merged.extend(incoming);

    let outcome = MergeOutcome {
      table: Table::Fact,
      policy,
      rows_before,
      rows_incoming,
      rows_removed,
      rows_after: merged.len(),
      replaced_range: self.replaced_range(),
    };
    (merged, outcome)
  }
}

// ─── Dimension merge ─────────────────────────────────────────────────────────

/// What a dimension merge does to the persisted rows before the snapshot is
/// appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionMerge {
  /// Drop every persisted row.
  Truncate,
  /// Drop persisted rows whose key appears in the snapshot.
  ReplaceKeys(BTreeSet<String>),
}

impl DimensionMerge {
  pub fn plan<D: Dimension>(incoming: &[D], policy: MergePolicy) -> Self {
    match policy {
      MergePolicy::FullRefresh => Self::Truncate,
      MergePolicy::Incremental => {
        Self::ReplaceKeys(incoming.iter().map(|row| row.key().to_owned()).collect())
      }
    }
  }

  /// Whether a persisted row with `key` survives the merge.
  pub fn retains(&self, key: &str) -> bool {
    match self {
      Self::Truncate => false,
      Self::ReplaceKeys(keys) => !keys.contains(key),
    }
  }

  /// Execute the plan in memory: retained persisted rows, then the snapshot.
  pub fn apply<D: Dimension>(
    &self,
    persisted: Vec<D>,
    incoming: Vec<D>,
    policy: MergePolicy,
  ) -> (Vec<D>, MergeOutcome) {
    let rows_before = persisted.len();
    let rows_incoming = incoming.len();

    let mut merged: Vec<D> =
      persisted.into_iter().filter(|row| self.retains(row.key())).collect();
    let rows_removed = rows_before - merged.len();
    merged.extend(incoming);

    let outcome = MergeOutcome {
      table: D::TABLE,
      policy,
      rows_before,
      rows_incoming,
      rows_removed,
      rows_after: merged.len(),
      replaced_range: None,
    };
    (merged, outcome)
  }
}
