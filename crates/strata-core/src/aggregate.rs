//! The aggregation engine: pre-computed rollups over the merged store.
//!
//! Each grain is a deterministic group-by over the fact table, left-joined to
//! the page, person and calendar dimensions. Fact rows are never dropped by a
//! join; unmatched pages fall into `"Unknown"` groups where the grain groups
//! on a dimension attribute.
//!
//! # Distinct viewers do not telescope
//!
//! `unique_viewers` is a distinct count over the rows of one group. A viewer
//! who appears on three days is counted once on each of three daily rows, so
//! summing the column over those rows yields 3, not 1. [`DistinctCount`]
//! therefore implements no arithmetic, and nothing in this module adds one
//! to another. Any distinct count for a wider period or a different
//! dimension must be re-derived from raw facts with [`distinct_viewers`].
//! Every other metric is a plain sum and may be re-summed freely.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{
  calendar::CalendarRow,
  dimension::{PageRow, PersonRow, SENTINEL_KEY, join_index},
  fact::FactRow,
  key::{DateKey, YearMonth},
};

// ─── Metrics ─────────────────────────────────────────────────────────────────

/// A count of distinct identifiers within one aggregate row's grain.
///
/// Not summable: see the module documentation.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DistinctCount(u64);

impl DistinctCount {
  /// Rebuild a count read back from storage.
  pub fn from_stored(count: u64) -> Self { Self(count) }

  pub fn get(self) -> u64 { self.0 }
}

/// The metric columns shared by every grain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
  /// Distinct viewers in this row's group. Not summable across rows.
  pub unique_viewers: DistinctCount,
  pub views:          i64,
  pub visits:         i64,
  /// Fact rows carrying a like; one per row regardless of views.
  pub likes:          i64,
  pub comments:       i64,
  pub duration_sum:   f64,
  /// Fact rows folded into this group.
  pub row_count:      i64,
}

impl Metrics {
  /// Likes plus comments.
  pub fn engagements(&self) -> i64 { self.likes + self.comments }

  /// Engagements per view; `0.0` when there are no views.
  pub fn engagement_rate(&self) -> f64 {
    if self.views == 0 {
      0.0
    } else {
      self.engagements() as f64 / self.views as f64
    }
  }
}

#[derive(Default)]
struct Accumulator<'a> {
  viewers:      HashSet<&'a str>,
  pages:        HashSet<&'a str>,
  days:         HashSet<DateKey>,
  views:        i64,
  visits:       i64,
  likes:        i64,
  comments:     i64,
  duration_sum: f64,
  rows:         i64,
}

impl<'a> Accumulator<'a> {
  fn add(&mut self, row: &'a FactRow) {
    if let Some(viewer) = row.viewer_id.as_deref() {
      self.viewers.insert(viewer);
    }
    if let Some(page) = row.page_id.as_deref() {
      self.pages.insert(page);
    }
    self.days.insert(row.visit_date_key);
    self.views += row.views.unwrap_or(0);
    self.visits += row.visits.unwrap_or(0);
    self.likes += i64::from(row.is_like());
    self.comments += row.comments.unwrap_or(0);
    self.duration_sum += row.duration_sum.unwrap_or(0.0);
    self.rows += 1;
  }

  fn metrics(&self) -> Metrics {
    Metrics {
      unique_viewers: DistinctCount(self.viewers.len() as u64),
      views:          self.views,
      visits:         self.visits,
      likes:          self.likes,
      comments:       self.comments,
      duration_sum:   self.duration_sum,
      row_count:      self.rows,
    }
  }
}

fn group<'a, K: Ord>(
  facts: &'a [FactRow],
  mut key: impl FnMut(&'a FactRow) -> K,
) -> BTreeMap<K, Accumulator<'a>> {
  let mut groups: BTreeMap<K, Accumulator<'a>> = BTreeMap::new();
  for row in facts {
    groups.entry(key(row)).or_default().add(row);
  }
  groups
}

// ─── Joined attributes ───────────────────────────────────────────────────────

/// Calendar columns denormalised onto daily rows. `None` on a row whose date
/// lies outside the generated calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarAttributes {
  pub year:        i32,
  pub quarter:     u32,
  pub month:       u32,
  pub year_month:  String,
  pub year_week:   String,
  pub day_of_week: u32,
  pub is_weekend:  bool,
}

impl From<&CalendarRow> for CalendarAttributes {
  fn from(row: &CalendarRow) -> Self {
    Self {
      year:        row.year,
      quarter:     row.quarter,
      month:       row.month,
      year_month:  row.year_month.clone(),
      year_week:   row.year_week.clone(),
      day_of_week: row.day_of_week,
      is_weekend:  row.is_weekend,
    }
  }
}

/// Page columns denormalised onto page-grain rows. All `None` when the page
/// has no dimension row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAttributes {
  pub page_name:    Option<String>,
  pub website_name: Option<String>,
  pub theme:        Option<String>,
  pub topic:        Option<String>,
  pub content_type: Option<String>,
  pub template:     Option<String>,
}

impl From<&PageRow> for PageAttributes {
  fn from(row: &PageRow) -> Self {
    Self {
      page_name:    row.page_name.clone(),
      website_name: row.website_name.clone(),
      theme:        row.theme.clone(),
      topic:        row.topic.clone(),
      content_type: row.content_type.clone(),
      template:     row.template.clone(),
    }
  }
}

// ─── Grains ──────────────────────────────────────────────────────────────────

/// Daily metrics per page. Grain: (`date_key`, `page_id`).
///
/// `metrics.unique_viewers` counts distinct viewers of one page on one day
/// and must not be summed across days or pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPageRow {
  pub date_key: DateKey,
  pub calendar: Option<CalendarAttributes>,
  pub page_id:  Option<String>,
  pub page:     PageAttributes,
  pub metrics:  Metrics,
}

/// Daily metrics per website. Grain: (`date_key`, `website_name`).
///
/// The website comes from the page join; pages without a dimension row (or
/// without a website) are grouped under `"Unknown"`. `unique_viewers` and
/// `pages_viewed` are distinct counts for one website on one day and must not
/// be summed across rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWebsiteRow {
  pub date_key:     DateKey,
  pub calendar:     Option<CalendarAttributes>,
  pub website_name: String,
  pub pages_viewed: DistinctCount,
  pub metrics:      Metrics,
}

/// Daily metrics per page and viewer attributes. Grain: (`date_key`,
/// `page_id`, `business_division`, `region`).
///
/// Viewers with no person row (external visitors) are grouped under
/// `"Unknown"`. `unique_viewers` must not be summed across rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPagePersonRow {
  pub date_key:          DateKey,
  pub calendar:          Option<CalendarAttributes>,
  pub page_id:           Option<String>,
  pub business_division: String,
  pub region:            String,
  pub metrics:           Metrics,
}

/// Monthly metrics per page. Grain: (`year_month`, `page_id`).
///
/// `unique_viewers` counts distinct viewers over the whole month; it is not
/// the sum of the daily counts and must not be summed across months.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPageRow {
  pub year_month:     YearMonth,
  pub page_id:        Option<String>,
  pub page:           PageAttributes,
  /// Distinct days with at least one fact row.
  pub days_in_period: u32,
  pub metrics:        Metrics,
}

/// Every grain produced by one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSet {
  pub daily_page:        Vec<DailyPageRow>,
  pub daily_website:     Vec<DailyWebsiteRow>,
  /// `None` when the person dimension was absent and the grain was skipped.
  pub daily_page_person: Option<Vec<DailyPagePersonRow>>,
  pub monthly_page:      Vec<MonthlyPageRow>,
}

/// Row counts per grain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSummary {
  pub daily_page:        usize,
  pub daily_website:     usize,
  pub daily_page_person: Option<usize>,
  pub monthly_page:      usize,
}

impl AggregateSet {
  pub fn summary(&self) -> AggregateSummary {
    AggregateSummary {
      daily_page:        self.daily_page.len(),
      daily_website:     self.daily_website.len(),
      daily_page_person: self.daily_page_person.as_ref().map(Vec::len),
      monthly_page:      self.monthly_page.len(),
    }
  }
}

// ─── Aggregator ──────────────────────────────────────────────────────────────

/// Joins the fact table to its dimensions and computes each grain.
pub struct Aggregator<'a> {
  facts:    &'a [FactRow],
  pages:    HashMap<&'a str, &'a PageRow>,
  people:   Option<HashMap<&'a str, &'a PersonRow>>,
  calendar: HashMap<DateKey, &'a CalendarRow>,
}

impl<'a> Aggregator<'a> {
  /// `people` is `None` when no person dimension is available; the
  /// person-attribute grain is then skipped.
  pub fn new(
    facts: &'a [FactRow],
    pages: &'a [PageRow],
    people: Option<&'a [PersonRow]>,
    calendar: &'a [CalendarRow],
  ) -> Self {
    Self {
      facts,
      pages: join_index(pages),
      people: people.map(join_index),
      calendar: calendar.iter().map(|row| (row.date_key, row)).collect(),
    }
  }

  fn page(&self, page_id: Option<&str>) -> Option<&'a PageRow> {
    page_id.and_then(|id| self.pages.get(id).copied())
  }

  fn page_attributes(&self, page_id: Option<&str>) -> PageAttributes {
    self.page(page_id).map(PageAttributes::from).unwrap_or_default()
  }

  fn calendar_attributes(&self, key: DateKey) -> Option<CalendarAttributes> {
    self.calendar.get(&key).map(|row| CalendarAttributes::from(*row))
  }

  pub fn daily_by_page(&self) -> Vec<DailyPageRow> {
    group(self.facts, |row| (row.visit_date_key, row.page_id.as_deref()))
      .into_iter()
      .map(|((date_key, page_id), acc)| DailyPageRow {
        date_key,
        calendar: self.calendar_attributes(date_key),
        page_id: page_id.map(str::to_owned),
        page: self.page_attributes(page_id),
        metrics: acc.metrics(),
      })
      .collect()
  }

  pub fn daily_by_website(&self) -> Vec<DailyWebsiteRow> {
    group(self.facts, |row| {
      let website = self
        .page(row.page_id.as_deref())
        .and_then(|page| page.website_name.as_deref())
        .unwrap_or(SENTINEL_KEY);
      (row.visit_date_key, website)
    })
    .into_iter()
    .map(|((date_key, website), acc)| DailyWebsiteRow {
      date_key,
      calendar: self.calendar_attributes(date_key),
      website_name: website.to_owned(),
      pages_viewed: DistinctCount(acc.pages.len() as u64),
      metrics: acc.metrics(),
    })
    .collect()
  }

  /// `None` when the person dimension is absent.
  pub fn daily_by_page_person(&self) -> Option<Vec<DailyPagePersonRow>> {
    let people = self.people.as_ref()?;

    let groups = group(self.facts, |row| {
      let person = row.viewer_id.as_deref().and_then(|id| people.get(id));
      let division = person
        .and_then(|p| p.business_division.as_deref())
        .unwrap_or(SENTINEL_KEY);
      let region = person.and_then(|p| p.region.as_deref()).unwrap_or(SENTINEL_KEY);
      (row.visit_date_key, row.page_id.as_deref(), division, region)
    });

    Some(
      groups
        .into_iter()
        .map(|((date_key, page_id, division, region), acc)| DailyPagePersonRow {
          date_key,
          calendar: self.calendar_attributes(date_key),
          page_id: page_id.map(str::to_owned),
          business_division: division.to_owned(),
          region: region.to_owned(),
          metrics: acc.metrics(),
        })
        .collect(),
    )
  }

  pub fn monthly_by_page(&self) -> Vec<MonthlyPageRow> {
    group(self.facts, |row| (row.visit_date_key.year_month(), row.page_id.as_deref()))
      .into_iter()
      .map(|((year_month, page_id), acc)| MonthlyPageRow {
        year_month,
        page_id: page_id.map(str::to_owned),
        page: self.page_attributes(page_id),
        days_in_period: acc.days.len() as u32,
        metrics: acc.metrics(),
      })
      .collect()
  }

  pub fn build_all(&self) -> AggregateSet {
    AggregateSet {
      daily_page:        self.daily_by_page(),
      daily_website:     self.daily_by_website(),
      daily_page_person: self.daily_by_page_person(),
      monthly_page:      self.monthly_by_page(),
    }
  }
}

// ─── Re-derived distinct counts ──────────────────────────────────────────────

/// Filter for a distinct-viewer count computed from raw facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerQuery {
  /// Inclusive lower bound on the visit date.
  pub from:    Option<DateKey>,
  /// Inclusive upper bound on the visit date.
  pub to:      Option<DateKey>,
  pub page_id: Option<String>,
}

impl ViewerQuery {
  pub fn matches(&self, row: &FactRow) -> bool {
    self.from.is_none_or(|from| row.visit_date_key >= from)
      && self.to.is_none_or(|to| row.visit_date_key <= to)
      && self
        .page_id
        .as_deref()
        .is_none_or(|page| row.page_id.as_deref() == Some(page))
  }
}

/// Distinct non-null viewers among the fact rows matching `query`.
pub fn distinct_viewers(facts: &[FactRow], query: &ViewerQuery) -> DistinctCount {
  let viewers: HashSet<&str> = facts
    .iter()
    .filter(|row| query.matches(row))
    .filter_map(|row| row.viewer_id.as_deref())
    .collect();
  DistinctCount(viewers.len() as u64)
}
