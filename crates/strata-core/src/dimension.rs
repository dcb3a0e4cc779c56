//! Slowly-changing dimension tables: pages and people.
//!
//! Both are keyed by a single string column and follow the same
//! upsert-with-retention lifecycle. Attributes are descriptive free text and
//! are never interpreted; fields whose meaning is undocumented in the source
//! export (`exclude`, `cnt`, the sparse person fields) are carried through
//! unmodified.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::table::Table;

/// The reserved page key that stands for "no page".
pub const SENTINEL_KEY: &str = "Unknown";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A dimension table row with a single-column primary key.
pub trait Dimension {
  const TABLE: Table;

  /// A key value excluded from uniqueness checks and joins, if the table has
  /// one. Sentinel rows are otherwise stored and merged like any other.
  const SENTINEL: Option<&'static str> = None;

  fn key(&self) -> &str;

  fn is_sentinel(&self) -> bool {
    Self::SENTINEL.is_some_and(|sentinel| sentinel == self.key())
  }

  /// The key to join facts on, or `None` for sentinel rows.
  fn join_key(&self) -> Option<&str> {
    (!self.is_sentinel()).then(|| self.key())
  }
}

/// Build a left-join lookup over `rows`, skipping sentinel rows.
///
/// When a key is duplicated the row that appears last wins, so a join never
/// fans a fact row out over several dimension rows.
pub fn join_index<D: Dimension>(rows: &[D]) -> HashMap<&str, &D> {
  rows
    .iter()
    .filter_map(|row| row.join_key().map(|key| (key, row)))
    .collect()
}

// ─── Page ────────────────────────────────────────────────────────────────────

/// Descriptive metadata for one page of the intranet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRow {
  pub page_id:               String,
  pub website_name:          Option<String>,
  pub website_url:           Option<String>,
  pub owning_business_unit:  Option<String>,
  pub page_name:             Option<String>,
  pub full_page_url:         Option<String>,
  pub source_system_page_id: Option<String>,
  pub theme:                 Option<String>,
  pub topic:                 Option<String>,
  pub page_url:              Option<String>,
  pub exclude:               Option<String>,
  pub site_name:             Option<String>,
  pub theme_normalized:      Option<String>,
  pub topic_normalized:      Option<String>,
  pub template:              Option<String>,
  pub content_type:          Option<String>,
  pub page_language:         Option<String>,
  pub news_category:         Option<String>,
  pub target_region:         Option<String>,
  pub target_organization:   Option<String>,
  pub cnt:                   Option<i64>,
}

impl PageRow {
  pub fn new(page_id: impl Into<String>) -> Self {
    Self { page_id: page_id.into(), ..Self::default() }
  }
}

impl Dimension for PageRow {
  const SENTINEL: Option<&'static str> = Some(SENTINEL_KEY);
  const TABLE: Table = Table::Page;

  fn key(&self) -> &str { &self.page_id }
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// An employee/visitor profile. Most attributes are sparse in practice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRow {
  pub contact_id:        String,
  pub business_division: Option<String>,
  pub region:            Option<String>,
  pub work_country:      Option<String>,
  pub employment_class:  Option<String>,
  pub org_level_1:       Option<String>,
  pub org_level_2:       Option<String>,
  pub org_level_3:       Option<String>,
  pub org_level_4:       Option<String>,
  pub org_level_5:       Option<String>,
  pub job_role:          Option<String>,
  pub job_family:        Option<String>,
  pub job_category:      Option<String>,
}

impl PersonRow {
  pub fn new(contact_id: impl Into<String>) -> Self {
    Self { contact_id: contact_id.into(), ..Self::default() }
  }
}

impl Dimension for PersonRow {
  const TABLE: Table = Table::Person;

  fn key(&self) -> &str { &self.contact_id }
}
