//! Fact rows: one (visit date, page, viewer) observation each, from the
//! web-analytics export.
//!
//! Rows are never mutated individually. An ingestion run either replaces a
//! whole range of days or leaves a row untouched (see [`crate::merge`]).

use serde::{Deserialize, Serialize};

use crate::key::DateKey;

/// One row of the fact table.
///
/// Every measure is nullable because the source export leaves cells empty;
/// aggregation treats a null measure as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
  pub visit_date_key:   DateKey,
  /// Free-text traffic source category.
  pub referrer_channel: Option<String>,
  pub page_id:          Option<String>,
  pub views:            Option<i64>,
  pub viewer_id:        Option<String>,
  /// Opaque flag carried through unmodified.
  pub status_flag:      Option<String>,
  pub visits:           Option<i64>,
  pub duration_sum:     Option<f64>,
  pub duration_avg:     Option<f64>,
  pub comments:         Option<i64>,
  /// Set to the liked page's id when this observation carries a like.
  pub liked_page_id:    Option<String>,
}

/// The soft composite key of a fact row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactKey<'a> {
  pub visit_date_key: DateKey,
  pub page_id:        Option<&'a str>,
  pub viewer_id:      Option<&'a str>,
}

impl FactRow {
  /// A row with the key columns set and every other column null.
  pub fn new(
    visit_date_key: DateKey,
    page_id: impl Into<String>,
    viewer_id: impl Into<String>,
  ) -> Self {
    Self {
      visit_date_key,
      referrer_channel: None,
      page_id: Some(page_id.into()),
      views: None,
      viewer_id: Some(viewer_id.into()),
      status_flag: None,
      visits: None,
      duration_sum: None,
      duration_avg: None,
      comments: None,
      liked_page_id: None,
    }
  }

  pub fn key(&self) -> FactKey<'_> {
    FactKey {
      visit_date_key: self.visit_date_key,
      page_id:        self.page_id.as_deref(),
      viewer_id:      self.viewer_id.as_deref(),
    }
  }

  /// `true` when the row records a like. A row is at most one like, however
  /// many views or visits it carries.
  pub fn is_like(&self) -> bool {
    self.liked_page_id.as_deref().is_some_and(|id| !id.is_empty())
  }

  /// `true` when a required column (page or viewer) is null.
  pub fn has_null_key_part(&self) -> bool {
    self.page_id.is_none() || self.viewer_id.is_none()
  }
}
