//! Date keys: the integer `YYYYMMDD` join key shared by facts and the
//! calendar, and the `YYYYMM` month key used by monthly rollups.

use std::{fmt, str::FromStr};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── DateKey ─────────────────────────────────────────────────────────────────

/// A calendar day, encoded on the wire and in storage as `YYYYMMDD`.
///
/// Wraps a [`NaiveDate`], so every key names a real day. Ordering agrees with
/// the numeric ordering of the encoded form.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u32", try_from = "u32")]
pub struct DateKey(NaiveDate);

impl DateKey {
  pub fn from_date(date: NaiveDate) -> Self { Self(date) }

  /// Decode a `YYYYMMDD` integer, rejecting anything that is not a real day.
  pub fn from_int(raw: i64) -> Result<Self> {
    let invalid = || Error::InvalidDateKey(raw.to_string());
    if !(10_000_101..=99_991_231).contains(&raw) {
      return Err(invalid());
    }
    let year = (raw / 10_000) as i32;
    let month = (raw / 100 % 100) as u32;
    let day = (raw % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
      .map(Self)
      .ok_or_else(invalid)
  }

  /// The `YYYYMMDD` encoding.
  pub fn get(self) -> u32 {
    self.0.year() as u32 * 10_000 + self.0.month() * 100 + self.0.day()
  }

  pub fn date(self) -> NaiveDate { self.0 }

  pub fn year_month(self) -> YearMonth {
    YearMonth { year: self.0.year(), month: self.0.month() }
  }
}

impl From<DateKey> for u32 {
  fn from(key: DateKey) -> Self { key.get() }
}

impl TryFrom<u32> for DateKey {
  type Error = Error;

  fn try_from(raw: u32) -> Result<Self> { Self::from_int(raw.into()) }
}

impl FromStr for DateKey {
  type Err = Error;

  /// Accepts `20250103` and, for hand-edited snapshots, `2025-01-03`.
  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    if let Ok(raw) = s.parse::<i64>() {
      return Self::from_int(raw);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
      .map(Self)
      .map_err(|_| Error::InvalidDateKey(s.to_owned()))
  }
}

impl fmt::Display for DateKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.get())
  }
}

// ─── YearMonth ───────────────────────────────────────────────────────────────

/// A calendar month; the group key of the monthly grain.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct YearMonth {
  pub year:  i32,
  pub month: u32,
}

impl YearMonth {
  /// The `YYYYMM` encoding.
  pub fn key(self) -> i64 { i64::from(self.year) * 100 + i64::from(self.month) }

  pub fn from_key(raw: i64) -> Result<Self> {
    let month = (raw % 100) as u32;
    if raw < 100 || !(1..=12).contains(&month) {
      return Err(Error::InvalidYearMonth(raw));
    }
    Ok(Self { year: (raw / 100) as i32, month })
  }
}

impl fmt::Display for YearMonth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{:02}", self.year, self.month)
  }
}
