//! Runner settings: built-in defaults, then an optional TOML file, then
//! `STRATA_*` environment variables. Command-line flags are applied last by
//! the caller.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use strata_core::{calendar::CalendarRange, merge::MergePolicy};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
  pub fact_path:      PathBuf,
  pub page_path:      PathBuf,
  /// No person snapshot is ingested when unset.
  pub person_path:    Option<PathBuf>,
  pub store_path:     PathBuf,
  /// No CSV export when unset.
  pub export_dir:     Option<PathBuf>,
  pub full_refresh:   bool,
  pub aggregate:      bool,
  pub calendar_start: NaiveDate,
  pub calendar_end:   NaiveDate,
}

impl Settings {
  /// Load settings, reading `file` when it exists.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("fact_path", "input/fact.csv")?
      .set_default("page_path", "input/page_inventory.csv")?
      .set_default("store_path", "output/db/analytics.sqlite")?
      .set_default("full_refresh", false)?
      .set_default("aggregate", true)?
      .set_default("calendar_start", "2022-01-01")?
      .set_default("calendar_end", "2040-12-31")?
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("STRATA"))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  /// Expand a leading `~` in every path setting.
  pub fn expand_paths(&mut self) {
    for path in [&mut self.fact_path, &mut self.page_path, &mut self.store_path] {
      *path = expand_tilde(path);
    }
    for path in [&mut self.person_path, &mut self.export_dir].into_iter().flatten() {
      *path = expand_tilde(path);
    }
  }

  pub fn policy(&self) -> MergePolicy {
    if self.full_refresh {
      MergePolicy::FullRefresh
    } else {
      MergePolicy::Incremental
    }
  }

  pub fn calendar(&self) -> anyhow::Result<CalendarRange> {
    if self.calendar_start > self.calendar_end {
      bail!(
        "calendar_start {} is after calendar_end {}",
        self.calendar_start,
        self.calendar_end
      );
    }
    Ok(CalendarRange { start: self.calendar_start, end: self.calendar_end })
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn defaults_apply_without_a_file() {
    let settings = Settings::load(Path::new("does-not-exist.toml")).unwrap();
    assert_eq!(settings.page_path, PathBuf::from("input/page_inventory.csv"));
    assert_eq!(settings.person_path, None);
    assert_eq!(settings.export_dir, None);
    assert!(settings.aggregate);
    assert_eq!(settings.calendar().unwrap(), CalendarRange::default());
  }

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
      file,
      "person_path = \"input/employee_contact.csv\"\n\
       full_refresh = true\n\
       calendar_end = \"2030-06-30\"\n"
    )
    .unwrap();

    let settings = Settings::load(file.path()).unwrap();
    assert_eq!(
      settings.person_path,
      Some(PathBuf::from("input/employee_contact.csv"))
    );
    assert_eq!(settings.policy(), MergePolicy::FullRefresh);
    assert_eq!(settings.calendar_end, NaiveDate::from_ymd_opt(2030, 6, 30).unwrap());
    assert_eq!(settings.calendar_start, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
  }

  #[test]
  fn inverted_calendar_is_rejected() {
    let mut settings = Settings::load(Path::new("does-not-exist.toml")).unwrap();
    settings.calendar_start = NaiveDate::from_ymd_opt(2041, 1, 1).unwrap();
    assert!(settings.calendar().is_err());
  }

  #[test]
  fn every_path_setting_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    let home = PathBuf::from(home);
    let mut settings = Settings::load(Path::new("does-not-exist.toml")).unwrap();
    settings.fact_path = PathBuf::from("~/in/fact.csv");
    settings.page_path = PathBuf::from("~/in/pages.csv");
    settings.person_path = Some(PathBuf::from("~/in/people.csv"));
    settings.store_path = PathBuf::from("~/db/analytics.sqlite");
    settings.export_dir = Some(PathBuf::from("~/out"));

    settings.expand_paths();
    assert_eq!(settings.fact_path, home.join("in/fact.csv"));
    assert_eq!(settings.page_path, home.join("in/pages.csv"));
    assert_eq!(settings.person_path, Some(home.join("in/people.csv")));
    assert_eq!(settings.store_path, home.join("db/analytics.sqlite"));
    assert_eq!(settings.export_dir, Some(home.join("out")));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/db/analytics.sqlite")),
      PathBuf::from(home).join("db/analytics.sqlite")
    );
    assert_eq!(expand_tilde(Path::new("db/x")), PathBuf::from("db/x"));
  }
}
