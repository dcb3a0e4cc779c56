//! The `AnalyticsStore` trait and the ingestion run types.
//!
//! The trait is implemented by storage backends (e.g. `strata-store-sqlite`).
//! The runner (`strata-cli`) depends on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  aggregate::{AggregateSet, AggregateSummary, DistinctCount, ViewerQuery},
  calendar::{CalendarRange, CalendarRow},
  dimension::{PageRow, PersonRow},
  fact::FactRow,
  merge::{MergeOutcome, MergePolicy},
  report::ValidationReport,
  snapshot::LoadedTable,
};

// ─── Run input ───────────────────────────────────────────────────────────────

/// One ingestion run's loaded snapshot and settings.
#[derive(Debug, Clone)]
pub struct IngestRun {
  pub facts:     LoadedTable<FactRow>,
  pub pages:     LoadedTable<PageRow>,
  /// `None` when no person snapshot was supplied; the persisted person table
  /// is then left as it is.
  pub people:    Option<LoadedTable<PersonRow>>,
  pub calendar:  CalendarRange,
  pub policy:    MergePolicy,
  /// Rebuild the aggregate tables after the merge.
  pub aggregate: bool,
}

impl IngestRun {
  /// A run with the default calendar, incremental policy and aggregation on.
  pub fn new(facts: LoadedTable<FactRow>, pages: LoadedTable<PageRow>) -> Self {
    Self {
      facts,
      pages,
      people: None,
      calendar: CalendarRange::default(),
      policy: MergePolicy::default(),
      aggregate: true,
    }
  }

  /// Validate the snapshot as loaded. The store adds the post-merge section.
  pub fn validate(&self) -> ValidationReport {
    ValidationReport::for_snapshot(&self.facts, &self.pages, self.people.as_ref())
  }
}

// ─── Run output ──────────────────────────────────────────────────────────────

/// The outcome of one committed ingestion run. Also the audit record kept
/// by the store for every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
  pub run_id:        Uuid,
  pub recorded_at:   DateTime<Utc>,
  pub policy:        MergePolicy,
  pub merges:        Vec<MergeOutcome>,
  pub calendar_rows: usize,
  pub report:        ValidationReport,
  /// `None` when aggregation was disabled for the run.
  pub aggregates:    Option<AggregateSummary>,
}

impl IngestSummary {
  pub fn log(&self) {
    for merge in &self.merges {
      merge.log();
    }
    self.report.log();
    match &self.aggregates {
      Some(summary) => tracing::info!(
        daily_page = summary.daily_page,
        daily_website = summary.daily_website,
        daily_page_person = ?summary.daily_page_person,
        monthly_page = summary.monthly_page,
        "aggregates rebuilt"
      ),
      None => tracing::info!("aggregation skipped"),
    }
    tracing::info!(
      run_id = %self.run_id,
      calendar_rows = self.calendar_rows,
      findings = self.report.findings(),
      "ingest committed"
    );
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Strata analytics store backend.
///
/// A store holds the merged fact and dimension tables, the generated
/// calendar, the derived aggregates and an audit log of ingestion runs.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait AnalyticsStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Merge a snapshot into the store as a single atomic unit.
  ///
  /// Merges facts and pages, merges people if a person snapshot is present,
  /// regenerates the calendar, validates the merged tables, optionally
  /// rebuilds aggregates and records the run. Any error rolls the whole run
  /// back.
  ///
  /// Fails with [`crate::Error::NothingToIngest`] when the fact snapshot is
  /// empty and the store holds no facts.
  fn ingest(
    &self,
    run: IngestRun,
  ) -> impl Future<Output = Result<IngestSummary, Self::Error>> + Send + '_;

  /// Recompute every aggregate grain from the persisted tables.
  fn rebuild_aggregates(
    &self,
  ) -> impl Future<Output = Result<AggregateSummary, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn facts(&self) -> impl Future<Output = Result<Vec<FactRow>, Self::Error>> + Send + '_;

  fn pages(&self) -> impl Future<Output = Result<Vec<PageRow>, Self::Error>> + Send + '_;

  fn people(
    &self,
  ) -> impl Future<Output = Result<Vec<PersonRow>, Self::Error>> + Send + '_;

  fn calendar(
    &self,
  ) -> impl Future<Output = Result<Vec<CalendarRow>, Self::Error>> + Send + '_;

  /// The persisted aggregate tables, sorted by group key.
  fn aggregates(
    &self,
  ) -> impl Future<Output = Result<AggregateSet, Self::Error>> + Send + '_;

  /// Distinct viewers re-derived from raw facts. Use this, never a sum of
  /// aggregate rows, for any period or slice wider than one aggregate row.
  fn distinct_viewers<'a>(
    &'a self,
    query: &'a ViewerQuery,
  ) -> impl Future<Output = Result<DistinctCount, Self::Error>> + Send + 'a;

  /// Audit records of every committed run, oldest first.
  fn ingest_runs(
    &self,
  ) -> impl Future<Output = Result<Vec<IngestSummary>, Self::Error>> + Send + '_;
}
