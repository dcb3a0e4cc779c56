//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use strata_core::{
  Error as CoreError,
  aggregate::{Aggregator, ViewerQuery, distinct_viewers},
  calendar::CalendarRange,
  dimension::{PageRow, PersonRow, SENTINEL_KEY},
  fact::FactRow,
  key::DateKey,
  merge::{FactMerge, MergePolicy},
  snapshot::LoadedTable,
  store::{AnalyticsStore, IngestRun},
  table::Table,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn day(raw: i64) -> DateKey { DateKey::from_int(raw).unwrap() }

fn fact(raw: i64, page: &str, viewer: &str, views: i64) -> FactRow {
  let mut row = FactRow::new(day(raw), page, viewer);
  row.views = Some(views);
  row.visits = Some(1);
  row
}

fn days(range: std::ops::RangeInclusive<i64>, views: i64) -> Vec<FactRow> {
  range.map(|d| fact(d, "p1", "v1", views)).collect()
}

fn page(id: &str, name: &str) -> PageRow {
  PageRow {
    page_name: Some(name.into()),
    website_name: Some("News".into()),
    ..PageRow::new(id)
  }
}

fn january() -> CalendarRange {
  CalendarRange {
    start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    end:   NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
  }
}

fn run(facts: Vec<FactRow>, pages: Vec<PageRow>) -> IngestRun {
  IngestRun {
    calendar: january(),
    ..IngestRun::new(LoadedTable::from_rows(facts), LoadedTable::from_rows(pages))
  }
}

fn with_people(mut run: IngestRun, people: Vec<PersonRow>) -> IngestRun {
  run.people = Some(LoadedTable::from_rows(people));
  run
}

fn full_refresh(mut run: IngestRun) -> IngestRun {
  run.policy = MergePolicy::FullRefresh;
  run
}

// ─── Fact merge ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn incremental_reingest_is_idempotent() {
  let s = store().await;
  s.ingest(run(days(20250101..=20250105, 1), vec![page("p1", "Front")]))
    .await
    .unwrap();

  let snapshot = || run(days(20250104..=20250106, 7), vec![page("p1", "Front")]);
  s.ingest(snapshot()).await.unwrap();
  let once = s.facts().await.unwrap();
  let once_aggs = s.aggregates().await.unwrap();

  s.ingest(snapshot()).await.unwrap();
  assert_eq!(s.facts().await.unwrap(), once);
  assert_eq!(s.aggregates().await.unwrap(), once_aggs);
}

#[tokio::test]
async fn incremental_retains_days_outside_the_snapshot() {
  let s = store().await;
  s.ingest(run(days(20250101..=20250105, 1), vec![])).await.unwrap();
  let summary = s
    .ingest(run(days(20250103..=20250104, 9), vec![]))
    .await
    .unwrap();

  let facts = s.facts().await.unwrap();
  let by_day: Vec<_> = facts
    .iter()
    .map(|f| (f.visit_date_key.get(), f.views.unwrap()))
    .collect();
  assert_eq!(
    by_day,
    vec![
      (20250101, 1),
      (20250102, 1),
      (20250105, 1),
      (20250103, 9),
      (20250104, 9),
    ]
  );

  let fact_merge = &summary.merges[0];
  assert_eq!(fact_merge.table, Table::Fact);
  assert_eq!(fact_merge.rows_before, 5);
  assert_eq!(fact_merge.rows_removed, 2);
  assert_eq!(fact_merge.rows_after, 5);
  let range = fact_merge.replaced_range.unwrap();
  assert_eq!((range.start.get(), range.end.get()), (20250103, 20250104));
}

#[tokio::test]
async fn sparse_snapshot_clears_missing_days_inside_its_range() {
  let s = store().await;
  s.ingest(run(days(20250101..=20250105, 1), vec![])).await.unwrap();
  s.ingest(run(
    vec![fact(20250101, "p1", "v1", 2), fact(20250105, "p1", "v1", 2)],
    vec![],
  ))
  .await
  .unwrap();

  let keys: Vec<_> = s
    .facts()
    .await
    .unwrap()
    .iter()
    .map(|f| f.visit_date_key.get())
    .collect();
  assert_eq!(keys, vec![20250101, 20250105]);
}

#[tokio::test]
async fn full_refresh_keeps_only_the_snapshot() {
  let s = store().await;
  s.ingest(run(days(20250101..=20250105, 1), vec![page("p1", "Front")]))
    .await
    .unwrap();

  let incoming = days(20250110..=20250111, 3);
  s.ingest(full_refresh(run(incoming.clone(), vec![page("p2", "Other")])))
    .await
    .unwrap();

  assert_eq!(s.facts().await.unwrap(), incoming);
  assert_eq!(s.pages().await.unwrap(), vec![page("p2", "Other")]);
}

#[tokio::test]
async fn sql_merge_matches_in_memory_merge() {
  let s = store().await;
  let persisted = days(20250101..=20250105, 1);
  s.ingest(run(persisted.clone(), vec![])).await.unwrap();

  let incoming = vec![
    fact(20250103, "p2", "v2", 4),
    fact(20250106, "p1", "v3", 5),
  ];
  s.ingest(run(incoming.clone(), vec![])).await.unwrap();

  let policy = MergePolicy::Incremental;
  let (expected, _) = FactMerge::plan(&incoming, policy).apply(persisted, incoming, policy);
  assert_eq!(s.facts().await.unwrap(), expected);
}

#[tokio::test]
async fn first_run_policies_agree() {
  let snapshot = || run(days(20250101..=20250103, 1), vec![page("p1", "Front")]);

  let incremental = store().await;
  incremental.ingest(snapshot()).await.unwrap();
  let refreshed = store().await;
  refreshed.ingest(full_refresh(snapshot())).await.unwrap();

  assert_eq!(incremental.facts().await.unwrap(), refreshed.facts().await.unwrap());
  assert_eq!(incremental.pages().await.unwrap(), refreshed.pages().await.unwrap());
  assert_eq!(
    incremental.aggregates().await.unwrap(),
    refreshed.aggregates().await.unwrap()
  );
}

// ─── Empty snapshots ─────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_snapshot_on_empty_store_is_fatal_and_rolls_back() {
  let s = store().await;
  let err = s
    .ingest(run(vec![], vec![page("p1", "Front")]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::NothingToIngest)), "{err}");

  assert!(s.pages().await.unwrap().is_empty());
  assert!(s.calendar().await.unwrap().is_empty());
  assert!(s.ingest_runs().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_incremental_snapshot_retains_facts() {
  let s = store().await;
  let persisted = days(20250101..=20250102, 1);
  s.ingest(run(persisted.clone(), vec![])).await.unwrap();

  let summary = s.ingest(run(vec![], vec![page("p1", "Front")])).await.unwrap();
  assert_eq!(s.facts().await.unwrap(), persisted);
  assert_eq!(summary.merges[0].rows_removed, 0);
  assert_eq!(summary.merges[0].replaced_range, None);
}

#[tokio::test]
async fn empty_full_refresh_empties_the_store() {
  let s = store().await;
  let persisted = days(20250101..=20250103, 1);
  s.ingest(run(persisted.clone(), vec![page("p1", "Front")]))
    .await
    .unwrap();

  let summary = s
    .ingest(full_refresh(run(vec![], vec![page("p2", "Other")])))
    .await
    .unwrap();
  assert!(s.facts().await.unwrap().is_empty());
  assert_eq!(s.pages().await.unwrap(), vec![page("p2", "Other")]);
  assert_eq!(summary.merges[0].rows_removed, 3);
  assert_eq!(summary.merges[0].rows_after, 0);

  // The store and the in-memory plan agree.
  let (in_memory, _) = FactMerge::plan(&[], MergePolicy::FullRefresh).apply(
    persisted,
    vec![],
    MergePolicy::FullRefresh,
  );
  assert_eq!(s.facts().await.unwrap(), in_memory);
}

// ─── Dimension merge ─────────────────────────────────────────────────────────

#[tokio::test]
async fn page_upsert_overwrites_and_retains() {
  let s = store().await;
  s.ingest(run(
    days(20250101..=20250101, 1),
    vec![page("p1", "Old"), page("p2", "Kept")],
  ))
  .await
  .unwrap();

  let summary = s
    .ingest(run(
      days(20250102..=20250102, 1),
      vec![page("p1", "New"), page("p3", "Added")],
    ))
    .await
    .unwrap();

  let pages = s.pages().await.unwrap();
  let names: Vec<_> = pages
    .iter()
    .map(|p| (p.page_id.as_str(), p.page_name.as_deref().unwrap()))
    .collect();
  assert_eq!(names, vec![("p2", "Kept"), ("p1", "New"), ("p3", "Added")]);

  let page_merge = &summary.merges[1];
  assert_eq!(page_merge.table, Table::Page);
  assert_eq!(page_merge.rows_removed, 1);
  assert_eq!(page_merge.rows_after, 3);
}

#[tokio::test]
async fn sentinel_pages_merge_like_any_other() {
  let s = store().await;
  s.ingest(run(days(20250101..=20250101, 1), vec![page(SENTINEL_KEY, "first")]))
    .await
    .unwrap();
  s.ingest(run(days(20250101..=20250101, 1), vec![page(SENTINEL_KEY, "second")]))
    .await
    .unwrap();

  let pages = s.pages().await.unwrap();
  assert_eq!(pages.len(), 1);
  assert_eq!(pages[0].page_name.as_deref(), Some("second"));
}

#[tokio::test]
async fn absent_person_snapshot_leaves_people_untouched() {
  let s = store().await;
  let people = vec![PersonRow::new("v1"), PersonRow::new("v2")];
  s.ingest(with_people(run(days(20250101..=20250101, 1), vec![]), people.clone()))
    .await
    .unwrap();

  let summary = s
    .ingest(full_refresh(run(days(20250102..=20250102, 1), vec![])))
    .await
    .unwrap();

  assert_eq!(s.people().await.unwrap(), people);
  assert_eq!(summary.merges.len(), 2);
  assert!(!summary.report.person_snapshot_present);
}

// ─── Calendar & aggregates ───────────────────────────────────────────────────

#[tokio::test]
async fn calendar_is_regenerated_from_the_configured_range() {
  let s = store().await;
  let summary = s.ingest(run(days(20250101..=20250101, 1), vec![])).await.unwrap();
  assert_eq!(summary.calendar_rows, 31);

  let calendar = s.calendar().await.unwrap();
  assert_eq!(calendar, january().generate());
}

#[tokio::test]
async fn persisted_aggregates_match_the_engine() {
  let s = store().await;
  let mut liked = fact(20250102, "p1", "v2", 3);
  liked.liked_page_id = Some("p1".into());
  liked.comments = Some(1);
  let facts = vec![
    fact(20250101, "p1", "v1", 2),
    liked,
    fact(20250102, "ext", "v3", 1),
    fact(20250301, "p1", "v1", 1),
  ];
  let pages = vec![page("p1", "Front")];
  let people = vec![PersonRow {
    business_division: Some("Finance".into()),
    region: Some("EMEA".into()),
    ..PersonRow::new("v1")
  }];

  let summary = s
    .ingest(with_people(run(facts.clone(), pages.clone()), people.clone()))
    .await
    .unwrap();

  let calendar = january().generate();
  let expected = Aggregator::new(&facts, &pages, Some(&people), &calendar).build_all();
  let stored = s.aggregates().await.unwrap();
  assert_eq!(stored, expected);
  assert_eq!(summary.aggregates, Some(expected.summary()));

  let march = stored
    .daily_page
    .iter()
    .find(|r| r.date_key == day(20250301))
    .unwrap();
  assert!(march.calendar.is_none());
}

#[tokio::test]
async fn person_grain_is_skipped_without_people() {
  let s = store().await;
  let summary = s.ingest(run(days(20250101..=20250102, 1), vec![])).await.unwrap();

  assert_eq!(summary.aggregates.unwrap().daily_page_person, None);
  let stored = s.aggregates().await.unwrap();
  assert!(stored.daily_page_person.is_none());
  assert_eq!(stored.daily_page.len(), 2);
}

#[tokio::test]
async fn aggregation_can_be_deferred_and_rebuilt() {
  let s = store().await;
  let mut deferred = run(days(20250101..=20250103, 1), vec![]);
  deferred.aggregate = false;

  let summary = s.ingest(deferred).await.unwrap();
  assert!(summary.aggregates.is_none());
  assert!(s.aggregates().await.unwrap().daily_page.is_empty());

  let rebuilt = s.rebuild_aggregates().await.unwrap();
  assert_eq!(rebuilt.daily_page, 3);
  assert_eq!(rebuilt.monthly_page, 1);
  assert_eq!(s.aggregates().await.unwrap().daily_page.len(), 3);
}

#[tokio::test]
async fn store_distinct_viewers_match_raw_facts() {
  let s = store().await;
  let facts = vec![
    fact(20250101, "p1", "v1", 1),
    fact(20250102, "p1", "v1", 1),
    fact(20250102, "p2", "v2", 1),
    fact(20250103, "p1", "v3", 1),
  ];
  s.ingest(run(facts.clone(), vec![])).await.unwrap();

  let queries = [
    ViewerQuery::default(),
    ViewerQuery { page_id: Some("p1".into()), ..ViewerQuery::default() },
    ViewerQuery {
      from: Some(day(20250102)),
      to: Some(day(20250102)),
      ..ViewerQuery::default()
    },
  ];
  for query in &queries {
    assert_eq!(
      s.distinct_viewers(query).await.unwrap(),
      distinct_viewers(&facts, query),
      "{query:?}"
    );
  }
  assert_eq!(s.distinct_viewers(&queries[0]).await.unwrap().get(), 3);

  let daily_sum: u64 = s
    .aggregates()
    .await
    .unwrap()
    .daily_page
    .iter()
    .filter(|r| r.page_id.as_deref() == Some("p1"))
    .map(|r| r.metrics.unique_viewers.get())
    .sum();
  assert_eq!(daily_sum, 3);
  assert_eq!(s.distinct_viewers(&queries[1]).await.unwrap().get(), 2);
}

// ─── Audit & files ───────────────────────────────────────────────────────────

#[tokio::test]
async fn every_committed_run_is_recorded() {
  let s = store().await;
  let first = s.ingest(run(days(20250101..=20250102, 1), vec![])).await.unwrap();
  let second = s
    .ingest(full_refresh(run(days(20250103..=20250103, 1), vec![])))
    .await
    .unwrap();

  let runs = s.ingest_runs().await.unwrap();
  assert_eq!(runs, vec![first, second]);
  assert_eq!(runs[1].policy, MergePolicy::FullRefresh);
  assert_ne!(runs[0].run_id, runs[1].run_id);
}

#[tokio::test]
async fn file_store_persists_across_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("analytics.sqlite");

  let facts = days(20250101..=20250102, 1);
  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.ingest(run(facts.clone(), vec![page("p1", "Front")]))
      .await
      .unwrap();
  }

  let reopened = SqliteStore::open(&path).await.unwrap();
  assert_eq!(reopened.facts().await.unwrap(), facts);
  assert_eq!(reopened.ingest_runs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn opening_a_non_database_file_fails() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("garbage.sqlite");
  std::fs::write(&path, vec![0x42_u8; 4096]).unwrap();

  assert!(SqliteStore::open(&path).await.is_err());
}
