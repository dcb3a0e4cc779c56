//! [`SqliteStore`], the SQLite implementation of [`AnalyticsStore`].

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use strata_core::{
  aggregate::{AggregateSet, AggregateSummary, DistinctCount, ViewerQuery},
  calendar::CalendarRow,
  dimension::{PageRow, PersonRow},
  fact::FactRow,
  snapshot::LoadedTable,
  store::{AnalyticsStore, IngestRun, IngestSummary},
};

use crate::{Result, encode::select_all, ops, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Strata analytics store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  ///
  /// Fails if the file exists but is not a SQLite database.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread.
  async fn with_conn<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }
}

// ─── AnalyticsStore impl ─────────────────────────────────────────────────────

impl AnalyticsStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn ingest(&self, run: IngestRun) -> Result<IngestSummary> {
    let run_id = Uuid::new_v4();
    let recorded_at = Utc::now();

    tracing::info!(
      run_id = %run_id,
      policy = ?run.policy,
      facts = run.facts.len(),
      pages = run.pages.len(),
      people = ?run.people.as_ref().map(LoadedTable::len),
      "ingest started"
    );

    let report = run.validate();
    let summary = self
      .with_conn(move |conn| ops::ingest(conn, run, report, run_id, recorded_at))
      .await?;

    summary.log();
    Ok(summary)
  }

  async fn rebuild_aggregates(&self) -> Result<AggregateSummary> {
    let summary = self.with_conn(ops::rebuild_aggregates).await?;
    tracing::info!(
      daily_page = summary.daily_page,
      daily_website = summary.daily_website,
      daily_page_person = ?summary.daily_page_person,
      monthly_page = summary.monthly_page,
      "aggregates rebuilt"
    );
    Ok(summary)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn facts(&self) -> Result<Vec<FactRow>> {
    self.with_conn(|conn| select_all(conn)).await
  }

  async fn pages(&self) -> Result<Vec<PageRow>> {
    self.with_conn(|conn| select_all(conn)).await
  }

  async fn people(&self) -> Result<Vec<PersonRow>> {
    self.with_conn(|conn| select_all(conn)).await
  }

  async fn calendar(&self) -> Result<Vec<CalendarRow>> {
    self.with_conn(|conn| select_all(conn)).await
  }

  async fn aggregates(&self) -> Result<AggregateSet> {
    self.with_conn(|conn| ops::read_aggregates(conn)).await
  }

  async fn distinct_viewers<'a>(&'a self, query: &'a ViewerQuery) -> Result<DistinctCount> {
    let query = query.clone();
    self
      .with_conn(move |conn| ops::distinct_viewers(conn, &query))
      .await
  }

  async fn ingest_runs(&self) -> Result<Vec<IngestSummary>> {
    self.with_conn(|conn| ops::read_runs(conn)).await
  }
}
