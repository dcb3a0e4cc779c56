//! The date dimension.
//!
//! Generated, never ingested: [`generate_calendar`] is a pure function of its
//! range, so regenerating the table on every run is idempotent.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::key::DateKey;

// ─── Range ───────────────────────────────────────────────────────────────────

/// Inclusive span of days covered by the calendar table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl Default for CalendarRange {
  /// 2022-01-01 through 2040-12-31.
  fn default() -> Self {
    Self {
      start: NaiveDate::from_ymd_opt(2022, 1, 1).expect("valid default start"),
      end:   NaiveDate::from_ymd_opt(2040, 12, 31).expect("valid default end"),
    }
  }
}

// ─── Row ─────────────────────────────────────────────────────────────────────

/// One calendar day with its derived attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRow {
  pub date_key:         DateKey,
  pub date:             NaiveDate,
  pub year:             i32,
  pub quarter:          u32,
  /// `Q1`..`Q4`.
  pub quarter_name:     String,
  /// `Q1 2022`.
  pub year_quarter:     String,
  pub month:            u32,
  pub month_name:       String,
  pub month_short:      String,
  /// `2022-01`.
  pub year_month:       String,
  /// ISO 8601 week number.
  pub week_number:      u32,
  /// `2021-W52`; the year is the ISO week-numbering year.
  pub year_week:        String,
  pub day_of_month:     u32,
  pub day_of_year:      u32,
  /// ISO day of week, Monday = 1 … Sunday = 7.
  pub day_of_week:      u32,
  pub day_name:         String,
  pub day_short:        String,
  pub is_weekend:       bool,
  pub is_month_start:   bool,
  pub is_month_end:     bool,
  pub is_quarter_start: bool,
  pub is_quarter_end:   bool,
  pub is_year_start:    bool,
  pub is_year_end:      bool,
}

impl CalendarRow {
  pub fn for_date(date: NaiveDate) -> Self {
    let year = date.year();
    let month = date.month();
    let day = date.day();
    let quarter = (month - 1) / 3 + 1;
    let iso = date.iso_week();
    let day_of_week = date.weekday().number_from_monday();
    let is_month_end = date.succ_opt().is_none_or(|next| next.month() != month);

    Self {
      date_key: DateKey::from_date(date),
      date,
      year,
      quarter,
      quarter_name: format!("Q{quarter}"),
      year_quarter: format!("Q{quarter} {year}"),
      month,
      month_name: date.format("%B").to_string(),
      month_short: date.format("%b").to_string(),
      year_month: format!("{year}-{month:02}"),
      week_number: iso.week(),
      year_week: format!("{}-W{:02}", iso.year(), iso.week()),
      day_of_month: day,
      day_of_year: date.ordinal(),
      day_of_week,
      day_name: date.format("%A").to_string(),
      day_short: date.format("%a").to_string(),
      is_weekend: matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
      is_month_start: day == 1,
      is_month_end,
      is_quarter_start: day == 1 && matches!(month, 1 | 4 | 7 | 10),
      is_quarter_end: is_month_end && matches!(month, 3 | 6 | 9 | 12),
      is_year_start: month == 1 && day == 1,
      is_year_end: month == 12 && day == 31,
    }
  }
}

// ─── Generator ───────────────────────────────────────────────────────────────

/// Every day from `start` to `end` inclusive, in order. Empty when
/// `start > end`.
pub fn generate_calendar(start: NaiveDate, end: NaiveDate) -> Vec<CalendarRow> {
  start
    .iter_days()
    .take_while(|date| *date <= end)
    .map(CalendarRow::for_date)
    .collect()
}

impl CalendarRange {
  pub fn generate(&self) -> Vec<CalendarRow> { generate_calendar(self.start, self.end) }
}
