//! Synchronous store operations. Everything here runs on the connection
//! thread; writes run inside a transaction they open themselves.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, Transaction};
use strata_core::{
  aggregate::{
    AggregateSet, AggregateSummary, Aggregator, DailyPagePersonRow, DailyPageRow,
    DailyWebsiteRow, DistinctCount, MonthlyPageRow, ViewerQuery,
  },
  calendar::CalendarRow,
  dimension::{Dimension, PageRow, PersonRow},
  fact::FactRow,
  merge::{DimensionMerge, FactMerge, MergeOutcome, MergePolicy},
  report::ValidationReport,
  store::{IngestRun, IngestSummary},
  table::Table,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    DimensionRecord, count, delete_all, encode_dt, encode_policy, encode_uuid,
    insert_all, select_all,
  },
};

const PERSON_GRAIN: &str = "person_grain";

// ─── Merges ──────────────────────────────────────────────────────────────────

/// Execute a [`FactMerge`] plan: one range delete, then a bulk insert.
pub fn merge_facts(
  tx: &Transaction<'_>,
  incoming: &[FactRow],
  policy: MergePolicy,
) -> Result<MergeOutcome> {
  let rows_before = count::<FactRow>(tx)?;
  let plan = FactMerge::plan(incoming, policy);

  let rows_removed = match plan {
    FactMerge::Truncate => delete_all::<FactRow>(tx)?,
    FactMerge::ReplaceRange(range) => tx.execute(
      "DELETE FROM fact WHERE visit_date_key BETWEEN ?1 AND ?2",
      rusqlite::params![range.start.get(), range.end.get()],
    )?,
    FactMerge::Retain => 0,
  };
  insert_all(tx, incoming)?;

  Ok(MergeOutcome {
    table: Table::Fact,
    policy,
    rows_before,
    rows_incoming: incoming.len(),
    rows_removed,
    rows_after: rows_before - rows_removed + incoming.len(),
    replaced_range: plan.replaced_range(),
  })
}

/// Execute a [`DimensionMerge`] plan: delete every persisted row whose key
/// is being replaced, then insert the snapshot.
pub fn merge_dimension<D: Dimension + DimensionRecord>(
  tx: &Transaction<'_>,
  incoming: &[D],
  policy: MergePolicy,
) -> Result<MergeOutcome> {
  let rows_before = count::<D>(tx)?;

  let rows_removed = match DimensionMerge::plan(incoming, policy) {
    DimensionMerge::Truncate => delete_all::<D>(tx)?,
    DimensionMerge::ReplaceKeys(keys) => {
      let mut stmt = tx.prepare_cached(&format!(
        "DELETE FROM {} WHERE {} = ?1",
        D::TABLE_NAME,
        D::KEY_COLUMN
      ))?;
      let mut removed = 0;
      for key in &keys {
        removed += stmt.execute([key])?;
      }
      removed
    }
  };
  insert_all(tx, incoming)?;

  Ok(MergeOutcome {
    table: <D as Dimension>::TABLE,
    policy,
    rows_before,
    rows_incoming: incoming.len(),
    rows_removed,
    rows_after: rows_before - rows_removed + incoming.len(),
    replaced_range: None,
  })
}

pub fn replace_calendar(tx: &Transaction<'_>, rows: &[CalendarRow]) -> Result<usize> {
  delete_all::<CalendarRow>(tx)?;
  insert_all(tx, rows)
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

fn build_aggregates(
  facts: &[FactRow],
  pages: &[PageRow],
  people: &[PersonRow],
  calendar: &[CalendarRow],
) -> AggregateSet {
  let people = (!people.is_empty()).then_some(people);
  Aggregator::new(facts, pages, people, calendar).build_all()
}

fn write_aggregates(tx: &Transaction<'_>, set: &AggregateSet) -> Result<AggregateSummary> {
  delete_all::<DailyPageRow>(tx)?;
  delete_all::<DailyWebsiteRow>(tx)?;
  delete_all::<DailyPagePersonRow>(tx)?;
  delete_all::<MonthlyPageRow>(tx)?;

  insert_all(tx, &set.daily_page)?;
  insert_all(tx, &set.daily_website)?;
  insert_all(tx, &set.monthly_page)?;
  let person_grain = match &set.daily_page_person {
    Some(rows) => {
      insert_all(tx, rows)?;
      "built"
    }
    None => {
      tracing::info!("person dimension is empty; skipping the person grain");
      "skipped"
    }
  };
  tx.execute(
    "INSERT INTO aggregate_meta (name, value) VALUES (?1, ?2)
     ON CONFLICT(name) DO UPDATE SET value = excluded.value",
    rusqlite::params![PERSON_GRAIN, person_grain],
  )?;

  Ok(set.summary())
}

/// Recompute every grain from the persisted tables.
pub fn rebuild_aggregates(conn: &mut Connection) -> Result<AggregateSummary> {
  let tx = conn.transaction()?;
  let facts = select_all::<FactRow>(&tx)?;
  let pages = select_all::<PageRow>(&tx)?;
  let people = select_all::<PersonRow>(&tx)?;
  let calendar = select_all::<CalendarRow>(&tx)?;

  let summary = write_aggregates(&tx, &build_aggregates(&facts, &pages, &people, &calendar))?;
  tx.commit()?;
  Ok(summary)
}

pub fn read_aggregates(conn: &Connection) -> Result<AggregateSet> {
  let person_grain: Option<String> = conn
    .query_row(
      "SELECT value FROM aggregate_meta WHERE name = ?1",
      [PERSON_GRAIN],
      |r| r.get(0),
    )
    .optional()?;

  let daily_page_person = match person_grain.as_deref() {
    Some("built") => Some(select_all(conn)?),
    _ => None,
  };

  Ok(AggregateSet {
    daily_page: select_all(conn)?,
    daily_website: select_all(conn)?,
    daily_page_person,
    monthly_page: select_all(conn)?,
  })
}

pub fn distinct_viewers(conn: &Connection, query: &ViewerQuery) -> Result<DistinctCount> {
  let n: i64 = conn.query_row(
    "SELECT COUNT(DISTINCT viewer_id) FROM fact
     WHERE viewer_id IS NOT NULL
       AND (?1 IS NULL OR visit_date_key >= ?1)
       AND (?2 IS NULL OR visit_date_key <= ?2)
       AND (?3 IS NULL OR page_id = ?3)",
    rusqlite::params![
      query.from.map(|k| k.get()),
      query.to.map(|k| k.get()),
      query.page_id,
    ],
    |r| r.get(0),
  )?;
  Ok(DistinctCount::from_stored(n as u64))
}

// ─── Ingest ──────────────────────────────────────────────────────────────────

/// Run one ingestion as a single transaction. Returning early with an error
/// drops the transaction, which rolls every step back.
pub fn ingest(
  conn: &mut Connection,
  run: IngestRun,
  mut report: ValidationReport,
  run_id: Uuid,
  recorded_at: DateTime<Utc>,
) -> Result<IngestSummary> {
  let tx = conn.transaction()?;

  let facts_before = count::<FactRow>(&tx)?;
  if run.facts.is_empty() && facts_before == 0 {
    return Err(strata_core::Error::NothingToIngest.into());
  }

  let mut merges = vec![
    merge_facts(&tx, &run.facts.rows, run.policy)?,
    merge_dimension(&tx, &run.pages.rows, run.policy)?,
  ];
  if let Some(people) = &run.people {
    merges.push(merge_dimension(&tx, &people.rows, run.policy)?);
  }

  let calendar = run.calendar.generate();
  let calendar_rows = replace_calendar(&tx, &calendar)?;
  tracing::debug!(calendar_rows, "calendar regenerated");

  let facts = select_all::<FactRow>(&tx)?;
  let pages = select_all::<PageRow>(&tx)?;
  let people = select_all::<PersonRow>(&tx)?;
  report.record_post_merge(&facts, &pages, &people);

  let aggregates = if run.aggregate {
    let set = build_aggregates(&facts, &pages, &people, &calendar);
    Some(write_aggregates(&tx, &set)?)
  } else {
    None
  };

  let summary = IngestSummary {
    run_id,
    recorded_at,
    policy: run.policy,
    merges,
    calendar_rows,
    report,
    aggregates,
  };
  record_run(&tx, &summary, facts.len())?;

  tx.commit()?;
  Ok(summary)
}

fn record_run(tx: &Transaction<'_>, summary: &IngestSummary, fact_rows: usize) -> Result<()> {
  tx.execute(
    "INSERT INTO ingest_runs (
       run_id, recorded_at, policy, fact_rows, findings, summary_json
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      encode_uuid(summary.run_id),
      encode_dt(summary.recorded_at),
      encode_policy(summary.policy),
      fact_rows as i64,
      summary.report.findings() as i64,
      serde_json::to_string(summary)?,
    ],
  )?;
  Ok(())
}

pub fn read_runs(conn: &Connection) -> Result<Vec<IngestSummary>> {
  let mut stmt =
    conn.prepare("SELECT summary_json FROM ingest_runs ORDER BY recorded_at, rowid")?;
  let raws = stmt
    .query_map([], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws
    .iter()
    .map(|raw| serde_json::from_str(raw).map_err(Error::from))
    .collect()
}
