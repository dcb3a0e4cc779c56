//! `strata` runner binary.
//!
//! Reads `strata.toml` (or the path given with `--config`) and `STRATA_*`
//! environment variables, then runs one step against the SQLite store.
//!
//! # Usage
//!
//! ```
//! strata ingest --people input/employee_contact.csv --json
//! strata ingest --full-refresh --export-dir output/csv
//! strata aggregate --export-dir output/csv
//! strata viewers --from 20250101 --to 20250131 --page p1
//! ```

mod pipeline;
mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use settings::Settings;
use strata_core::{aggregate::ViewerQuery, key::DateKey};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Strata analytics ingestion and aggregation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "strata.toml", global = true)]
  config: PathBuf,

  /// Path to the SQLite store.
  #[arg(long, global = true)]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Load the snapshots, merge them into the store and rebuild aggregates.
  Ingest(IngestArgs),
  /// Rebuild every aggregate table from the persisted store.
  Aggregate {
    /// Write the aggregate tables as CSV files to this directory.
    #[arg(long, value_name = "DIR")]
    export_dir: Option<PathBuf>,
  },
  /// Count distinct viewers in the raw facts.
  Viewers {
    /// First visit date, inclusive (`20250101` or `2025-01-01`).
    #[arg(long)]
    from: Option<DateKey>,
    /// Last visit date, inclusive.
    #[arg(long)]
    to:   Option<DateKey>,
    #[arg(long, value_name = "ID")]
    page: Option<String>,
  },
}

#[derive(Args)]
struct IngestArgs {
  /// Replace the whole store with the snapshot.
  #[arg(long)]
  full_refresh: bool,

  /// Skip the aggregate rebuild; run `strata aggregate` later.
  #[arg(long)]
  no_aggregate: bool,

  #[arg(long, value_name = "P")]
  fact: Option<PathBuf>,

  #[arg(long, value_name = "P")]
  pages: Option<PathBuf>,

  #[arg(long, value_name = "P")]
  people: Option<PathBuf>,

  #[arg(long, value_name = "DIR")]
  export_dir: Option<PathBuf>,

  /// Print the validation report as JSON.
  #[arg(long)]
  json: bool,
}

impl IngestArgs {
  /// Flags win over the config file and environment.
  fn apply(&self, settings: &mut Settings) {
    if self.full_refresh {
      settings.full_refresh = true;
    }
    if self.no_aggregate {
      settings.aggregate = false;
    }
    if let Some(path) = &self.fact {
      settings.fact_path = path.clone();
    }
    if let Some(path) = &self.pages {
      settings.page_path = path.clone();
    }
    if let Some(path) = &self.people {
      settings.person_path = Some(path.clone());
    }
    if let Some(dir) = &self.export_dir {
      settings.export_dir = Some(dir.clone());
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut settings = Settings::load(&cli.config)?;
  if let Some(path) = cli.store {
    settings.store_path = path;
  }
  match &cli.command {
    Command::Ingest(args) => args.apply(&mut settings),
    Command::Aggregate { export_dir: Some(dir) } => settings.export_dir = Some(dir.clone()),
    _ => {}
  }
  settings.expand_paths();

  match cli.command {
    Command::Ingest(args) => {
      let summary = pipeline::run_ingest(&settings).await?;
      if args.json {
        let json = serde_json::to_string_pretty(&summary.report)
          .context("failed to serialise the validation report")?;
        println!("{json}");
      }
    }
    Command::Aggregate { .. } => {
      let store = pipeline::open_store(&settings.store_path).await?;
      pipeline::aggregate(&store, settings.export_dir.as_deref()).await?;
    }
    Command::Viewers { from, to, page } => {
      let store = pipeline::open_store(&settings.store_path).await?;
      let query = ViewerQuery { from, to, page_id: page };
      let count = pipeline::viewers(&store, &query).await?;
      println!("{}", count.get());
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn ingest_flags_override_settings() {
    let cli = Cli::parse_from([
      "strata",
      "ingest",
      "--full-refresh",
      "--no-aggregate",
      "--people",
      "in/people.csv",
    ]);
    let Command::Ingest(args) = cli.command else { panic!("expected ingest") };

    let mut settings = Settings::load(&cli.config).unwrap();
    args.apply(&mut settings);
    assert!(settings.full_refresh);
    assert!(!settings.aggregate);
    assert_eq!(settings.person_path, Some(PathBuf::from("in/people.csv")));
    assert_eq!(settings.fact_path, PathBuf::from("input/fact.csv"));
  }

  #[test]
  fn viewer_dates_accept_both_forms() {
    let cli = Cli::parse_from(["strata", "viewers", "--from", "2025-01-01", "--to", "20250131"]);
    let Command::Viewers { from, to, page } = cli.command else { panic!("expected viewers") };
    assert_eq!(from, Some(DateKey::from_int(20250101).unwrap()));
    assert_eq!(to, Some(DateKey::from_int(20250131).unwrap()));
    assert_eq!(page, None);
  }
}
