//! The runner's steps: load, ingest, aggregate, export.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use strata_core::{
  aggregate::{AggregateSummary, DistinctCount, ViewerQuery},
  store::{AnalyticsStore, IngestRun, IngestSummary},
};
use strata_csv::{export_aggregates, export_store_tables, load_facts, load_pages, load_people};
use strata_store_sqlite::SqliteStore;

use crate::settings::Settings;

/// Open the store, creating its parent directory if needed.
pub async fn open_store(path: &Path) -> anyhow::Result<SqliteStore> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  SqliteStore::open(path)
    .await
    .with_context(|| format!("failed to open store at {path:?}"))
}

/// Load every snapshot named in `settings`.
pub fn load_run(settings: &Settings) -> anyhow::Result<IngestRun> {
  let facts = load_facts(&settings.fact_path)
    .with_context(|| format!("failed to load facts from {}", settings.fact_path.display()))?;
  let pages = load_pages(&settings.page_path)
    .with_context(|| format!("failed to load pages from {}", settings.page_path.display()))?;
  let people = settings
    .person_path
    .as_deref()
    .map(|path| {
      load_people(path)
        .with_context(|| format!("failed to load people from {}", path.display()))
    })
    .transpose()?;

  Ok(IngestRun {
    facts,
    pages,
    people,
    calendar: settings.calendar()?,
    policy: settings.policy(),
    aggregate: settings.aggregate,
  })
}

/// Load the snapshots, then open the store and ingest them. Nothing touches
/// the store until every snapshot has loaded.
pub async fn run_ingest(settings: &Settings) -> anyhow::Result<IngestSummary> {
  let run = load_run(settings)?;
  let store = open_store(&settings.store_path).await?;
  ingest(&store, run, settings.export_dir.as_deref()).await
}

pub async fn ingest(
  store: &SqliteStore,
  run: IngestRun,
  export_dir: Option<&Path>,
) -> anyhow::Result<IngestSummary> {
  let summary = store.ingest(run).await.context("ingest failed")?;

  if let Some(dir) = export_dir {
    export_store(store, dir).await?;
    if summary.aggregates.is_some() {
      export_aggregate_tables(store, dir).await?;
    }
  }
  Ok(summary)
}

pub async fn aggregate(
  store: &SqliteStore,
  export_dir: Option<&Path>,
) -> anyhow::Result<AggregateSummary> {
  let summary = store
    .rebuild_aggregates()
    .await
    .context("aggregate rebuild failed")?;
  if let Some(dir) = export_dir {
    export_aggregate_tables(store, dir).await?;
  }
  Ok(summary)
}

pub async fn viewers(store: &SqliteStore, query: &ViewerQuery) -> anyhow::Result<DistinctCount> {
  store
    .distinct_viewers(query)
    .await
    .context("distinct viewer count failed")
}

// ─── Export ──────────────────────────────────────────────────────────────────

async fn export_store(store: &SqliteStore, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
  let facts = store.facts().await?;
  let pages = store.pages().await?;
  let people = store.people().await?;
  let calendar = store.calendar().await?;

  let paths = export_store_tables(dir, &facts, &pages, &people, &calendar)
    .with_context(|| format!("failed to export tables to {}", dir.display()))?;
  tracing::info!(dir = %dir.display(), files = paths.len(), "store tables exported");
  Ok(paths)
}

async fn export_aggregate_tables(store: &SqliteStore, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
  let set = store.aggregates().await?;
  let paths = export_aggregates(dir, &set)
    .with_context(|| format!("failed to export aggregates to {}", dir.display()))?;
  tracing::info!(dir = %dir.display(), files = paths.len(), "aggregates exported");
  Ok(paths)
}
