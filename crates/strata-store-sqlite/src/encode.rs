//! Mapping between domain rows and SQLite rows.
//!
//! Every persisted row type implements [`Record`]: its table, its column list
//! in storage order, and a conversion each way. Date keys are stored as
//! `YYYYMMDD` integers, month keys as `YYYYMM`, flags as 0/1 and distinct
//! counts as plain integers.

use chrono::{DateTime, Utc};
use rusqlite::{
  Connection, Row,
  types::{Type, Value},
};
use strata_core::{
  aggregate::{
    CalendarAttributes, DailyPagePersonRow, DailyPageRow, DailyWebsiteRow,
    DistinctCount, Metrics, MonthlyPageRow, PageAttributes,
  },
  calendar::CalendarRow,
  dimension::{PageRow, PersonRow},
  fact::FactRow,
  key::{DateKey, YearMonth},
  merge::MergePolicy,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn encode_policy(policy: MergePolicy) -> &'static str {
  match policy {
    MergePolicy::Incremental => "incremental",
    MergePolicy::FullRefresh => "full_refresh",
  }
}

fn conversion_error(
  idx: usize,
  ty: Type,
  err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn date_key(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateKey> {
  let raw: u32 = row.get(idx)?;
  DateKey::try_from(raw).map_err(|e| conversion_error(idx, Type::Integer, e))
}

fn year_month(row: &Row<'_>, idx: usize) -> rusqlite::Result<YearMonth> {
  let raw: i64 = row.get(idx)?;
  YearMonth::from_key(raw).map_err(|e| conversion_error(idx, Type::Integer, e))
}

fn distinct(row: &Row<'_>, idx: usize) -> rusqlite::Result<DistinctCount> {
  let raw: i64 = row.get(idx)?;
  Ok(DistinctCount::from_stored(raw as u64))
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A row type persisted one-to-one in a table.
pub trait Record: Sized {
  const TABLE_NAME: &'static str;
  /// Column names, in the order of [`Record::values`] and
  /// [`Record::from_row`].
  const COLUMNS: &'static [&'static str];

  fn values(&self) -> Vec<Value>;

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Append `rows` to the record's table.
pub fn insert_all<R: Record>(conn: &Connection, rows: &[R]) -> Result<usize> {
  let placeholders = (1..=R::COLUMNS.len())
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");
  let sql = format!(
    "INSERT INTO {} ({}) VALUES ({placeholders})",
    R::TABLE_NAME,
    R::COLUMNS.join(", ")
  );

  let mut stmt = conn.prepare_cached(&sql)?;
  for row in rows {
    stmt.execute(rusqlite::params_from_iter(row.values()))?;
  }
  Ok(rows.len())
}

/// Every row of the record's table, in insertion order.
pub fn select_all<R: Record>(conn: &Connection) -> Result<Vec<R>> {
  let sql =
    format!("SELECT {} FROM {} ORDER BY rowid", R::COLUMNS.join(", "), R::TABLE_NAME);
  let mut stmt = conn.prepare(&sql)?;
  let rows = stmt
    .query_map([], |row| R::from_row(row))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn delete_all<R: Record>(conn: &Connection) -> Result<usize> {
  Ok(conn.execute(&format!("DELETE FROM {}", R::TABLE_NAME), [])?)
}

pub fn count<R: Record>(conn: &Connection) -> Result<usize> {
  let n: i64 =
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", R::TABLE_NAME), [], |r| r.get(0))?;
  usize::try_from(n)
    .map_err(|_| Error::Corrupt(format!("negative row count in {}", R::TABLE_NAME)))
}

// ─── Fact ────────────────────────────────────────────────────────────────────

impl Record for FactRow {
  const COLUMNS: &'static [&'static str] = &[
    "visit_date_key",
    "referrer_channel",
    "page_id",
    "views",
    "viewer_id",
    "status_flag",
    "visits",
    "duration_sum",
    "duration_avg",
    "comments",
    "liked_page_id",
  ];
  const TABLE_NAME: &'static str = "fact";

  fn values(&self) -> Vec<Value> {
    vec![
      self.visit_date_key.get().into(),
      self.referrer_channel.clone().into(),
      self.page_id.clone().into(),
      self.views.into(),
      self.viewer_id.clone().into(),
      self.status_flag.clone().into(),
      self.visits.into(),
      self.duration_sum.into(),
      self.duration_avg.into(),
      self.comments.into(),
      self.liked_page_id.clone().into(),
    ]
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      visit_date_key:   date_key(row, 0)?,
      referrer_channel: row.get(1)?,
      page_id:          row.get(2)?,
      views:            row.get(3)?,
      viewer_id:        row.get(4)?,
      status_flag:      row.get(5)?,
      visits:           row.get(6)?,
      duration_sum:     row.get(7)?,
      duration_avg:     row.get(8)?,
      comments:         row.get(9)?,
      liked_page_id:    row.get(10)?,
    })
  }
}

// ─── Dimensions ──────────────────────────────────────────────────────────────

/// A dimension table: a [`Record`] keyed by one text column.
pub trait DimensionRecord: Record {
  const KEY_COLUMN: &'static str;
}

impl Record for PageRow {
  const COLUMNS: &'static [&'static str] = &[
    "page_id",
    "website_name",
    "website_url",
    "owning_business_unit",
    "page_name",
    "full_page_url",
    "source_system_page_id",
    "theme",
    "topic",
    "page_url",
    "exclude",
    "site_name",
    "theme_normalized",
    "topic_normalized",
    "template",
    "content_type",
    "page_language",
    "news_category",
    "target_region",
    "target_organization",
    "cnt",
  ];
  const TABLE_NAME: &'static str = "page_inventory";

  fn values(&self) -> Vec<Value> {
    vec![
      self.page_id.clone().into(),
      self.website_name.clone().into(),
      self.website_url.clone().into(),
      self.owning_business_unit.clone().into(),
      self.page_name.clone().into(),
      self.full_page_url.clone().into(),
      self.source_system_page_id.clone().into(),
      self.theme.clone().into(),
      self.topic.clone().into(),
      self.page_url.clone().into(),
      self.exclude.clone().into(),
      self.site_name.clone().into(),
      self.theme_normalized.clone().into(),
      self.topic_normalized.clone().into(),
      self.template.clone().into(),
      self.content_type.clone().into(),
      self.page_language.clone().into(),
      self.news_category.clone().into(),
      self.target_region.clone().into(),
      self.target_organization.clone().into(),
      self.cnt.into(),
    ]
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      page_id:               row.get(0)?,
      website_name:          row.get(1)?,
      website_url:           row.get(2)?,
      owning_business_unit:  row.get(3)?,
      page_name:             row.get(4)?,
      full_page_url:         row.get(5)?,
      source_system_page_id: row.get(6)?,
      theme:                 row.get(7)?,
      topic:                 row.get(8)?,
      page_url:              row.get(9)?,
      exclude:               row.get(10)?,
      site_name:             row.get(11)?,
      theme_normalized:      row.get(12)?,
      topic_normalized:      row.get(13)?,
      template:              row.get(14)?,
      content_type:          row.get(15)?,
      page_language:         row.get(16)?,
      news_category:         row.get(17)?,
      target_region:         row.get(18)?,
      target_organization:   row.get(19)?,
      cnt:                   row.get(20)?,
    })
  }
}

impl DimensionRecord for PageRow {
  const KEY_COLUMN: &'static str = "page_id";
}

impl Record for PersonRow {
  const COLUMNS: &'static [&'static str] = &[
    "contact_id",
    "business_division",
    "region",
    "work_country",
    "employment_class",
    "org_level_1",
    "org_level_2",
    "org_level_3",
    "org_level_4",
    "org_level_5",
    "job_role",
    "job_family",
    "job_category",
  ];
  const TABLE_NAME: &'static str = "employee_contact";

  fn values(&self) -> Vec<Value> {
    vec![
      self.contact_id.clone().into(),
      self.business_division.clone().into(),
      self.region.clone().into(),
      self.work_country.clone().into(),
      self.employment_class.clone().into(),
      self.org_level_1.clone().into(),
      self.org_level_2.clone().into(),
      self.org_level_3.clone().into(),
      self.org_level_4.clone().into(),
      self.org_level_5.clone().into(),
      self.job_role.clone().into(),
      self.job_family.clone().into(),
      self.job_category.clone().into(),
    ]
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:        row.get(0)?,
      business_division: row.get(1)?,
      region:            row.get(2)?,
      work_country:      row.get(3)?,
      employment_class:  row.get(4)?,
      org_level_1:       row.get(5)?,
      org_level_2:       row.get(6)?,
      org_level_3:       row.get(7)?,
      org_level_4:       row.get(8)?,
      org_level_5:       row.get(9)?,
      job_role:          row.get(10)?,
      job_family:        row.get(11)?,
      job_category:      row.get(12)?,
    })
  }
}

impl DimensionRecord for PersonRow {
  const KEY_COLUMN: &'static str = "contact_id";
}

// ─── Calendar ────────────────────────────────────────────────────────────────

impl Record for CalendarRow {
  const COLUMNS: &'static [&'static str] = &[
    "date_key",
    "date",
    "year",
    "quarter",
    "quarter_name",
    "year_quarter",
    "month",
    "month_name",
    "month_short",
    "year_month",
    "week_number",
    "year_week",
    "day_of_month",
    "day_of_year",
    "day_of_week",
    "day_name",
    "day_short",
    "is_weekend",
    "is_month_start",
    "is_month_end",
    "is_quarter_start",
    "is_quarter_end",
    "is_year_start",
    "is_year_end",
  ];
  const TABLE_NAME: &'static str = "dim_date";

  fn values(&self) -> Vec<Value> {
    vec![
      self.date_key.get().into(),
      self.date.to_string().into(),
      i64::from(self.year).into(),
      self.quarter.into(),
      self.quarter_name.clone().into(),
      self.year_quarter.clone().into(),
      self.month.into(),
      self.month_name.clone().into(),
      self.month_short.clone().into(),
      self.year_month.clone().into(),
      self.week_number.into(),
      self.year_week.clone().into(),
      self.day_of_month.into(),
      self.day_of_year.into(),
      self.day_of_week.into(),
      self.day_name.clone().into(),
      self.day_short.clone().into(),
      self.is_weekend.into(),
      self.is_month_start.into(),
      self.is_month_end.into(),
      self.is_quarter_start.into(),
      self.is_quarter_end.into(),
      self.is_year_start.into(),
      self.is_year_end.into(),
    ]
  }

  /// The calendar is a pure function of the date, so the row is regenerated
  /// from its key rather than decoded column by column.
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(CalendarRow::for_date(date_key(row, 0)?.date()))
  }
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

const CALENDAR_COLUMNS: usize = 7;
const PAGE_COLUMNS: usize = 6;
const METRIC_COLUMNS: usize = 7;

fn calendar_values(calendar: Option<&CalendarAttributes>) -> [Value; CALENDAR_COLUMNS] {
  match calendar {
    None => std::array::from_fn(|_| Value::Null),
    Some(cal) => [
      i64::from(cal.year).into(),
      cal.quarter.into(),
      cal.month.into(),
      cal.year_month.clone().into(),
      cal.year_week.clone().into(),
      cal.day_of_week.into(),
      cal.is_weekend.into(),
    ],
  }
}

fn read_calendar(row: &Row<'_>, at: usize) -> rusqlite::Result<Option<CalendarAttributes>> {
  let Some(year) = row.get::<_, Option<i32>>(at)? else {
    return Ok(None);
  };
  Ok(Some(CalendarAttributes {
    year,
    quarter: row.get(at + 1)?,
    month: row.get(at + 2)?,
    year_month: row.get(at + 3)?,
    year_week: row.get(at + 4)?,
    day_of_week: row.get(at + 5)?,
    is_weekend: row.get(at + 6)?,
  }))
}

fn page_values(page: &PageAttributes) -> [Value; PAGE_COLUMNS] {
  [
    page.page_name.clone().into(),
    page.website_name.clone().into(),
    page.theme.clone().into(),
    page.topic.clone().into(),
    page.content_type.clone().into(),
    page.template.clone().into(),
  ]
}

fn read_page(row: &Row<'_>, at: usize) -> rusqlite::Result<PageAttributes> {
  Ok(PageAttributes {
    page_name:    row.get(at)?,
    website_name: row.get(at + 1)?,
    theme:        row.get(at + 2)?,
    topic:        row.get(at + 3)?,
    content_type: row.get(at + 4)?,
    template:     row.get(at + 5)?,
  })
}

fn metric_values(m: &Metrics) -> [Value; METRIC_COLUMNS] {
  [
    (m.unique_viewers.get() as i64).into(),
    m.views.into(),
    m.visits.into(),
    m.likes.into(),
    m.comments.into(),
    m.duration_sum.into(),
    m.row_count.into(),
  ]
}

fn read_metrics(row: &Row<'_>, at: usize) -> rusqlite::Result<Metrics> {
  Ok(Metrics {
    unique_viewers: distinct(row, at)?,
    views:          row.get(at + 1)?,
    visits:         row.get(at + 2)?,
    likes:          row.get(at + 3)?,
    comments:       row.get(at + 4)?,
    duration_sum:   row.get(at + 5)?,
    row_count:      row.get(at + 6)?,
  })
}

impl Record for DailyPageRow {
  const COLUMNS: &'static [&'static str] = &[
    "date_key",
    "year",
    "quarter",
    "month",
    "year_month",
    "year_week",
    "day_of_week",
    "is_weekend",
    "page_id",
    "page_name",
    "website_name",
    "theme",
    "topic",
    "content_type",
    "template",
    "unique_viewers",
    "views",
    "visits",
    "likes",
    "comments",
    "duration_sum",
    "row_count",
  ];
  const TABLE_NAME: &'static str = "agg_daily_page";

  fn values(&self) -> Vec<Value> {
    let mut values = vec![self.date_key.get().into()];
    values.extend(calendar_values(self.calendar.as_ref()));
    values.push(self.page_id.clone().into());
    values.extend(page_values(&self.page));
    values.extend(metric_values(&self.metrics));
    values
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      date_key: date_key(row, 0)?,
      calendar: read_calendar(row, 1)?,
      page_id:  row.get(8)?,
      page:     read_page(row, 9)?,
      metrics:  read_metrics(row, 15)?,
    })
  }
}

impl Record for DailyWebsiteRow {
  const COLUMNS: &'static [&'static str] = &[
    "date_key",
    "year",
    "quarter",
    "month",
    "year_month",
    "year_week",
    "day_of_week",
    "is_weekend",
    "website_name",
    "pages_viewed",
    "unique_viewers",
    "views",
    "visits",
    "likes",
    "comments",
    "duration_sum",
    "row_count",
  ];
  const TABLE_NAME: &'static str = "agg_daily_website";

  fn values(&self) -> Vec<Value> {
    let mut values = vec![self.date_key.get().into()];
    values.extend(calendar_values(self.calendar.as_ref()));
    values.push(self.website_name.clone().into());
    values.push((self.pages_viewed.get() as i64).into());
    values.extend(metric_values(&self.metrics));
    values
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      date_key:     date_key(row, 0)?,
      calendar:     read_calendar(row, 1)?,
      website_name: row.get(8)?,
      pages_viewed: distinct(row, 9)?,
      metrics:      read_metrics(row, 10)?,
    })
  }
}

impl Record for DailyPagePersonRow {
  const COLUMNS: &'static [&'static str] = &[
    "date_key",
    "year",
    "quarter",
    "month",
    "year_month",
    "year_week",
    "day_of_week",
    "is_weekend",
    "page_id",
    "business_division",
    "region",
    "unique_viewers",
    "views",
    "visits",
    "likes",
    "comments",
    "duration_sum",
    "row_count",
  ];
  const TABLE_NAME: &'static str = "agg_daily_page_person";

  fn values(&self) -> Vec<Value> {
    let mut values = vec![self.date_key.get().into()];
    values.extend(calendar_values(self.calendar.as_ref()));
    values.push(self.page_id.clone().into());
    values.push(self.business_division.clone().into());
    values.push(self.region.clone().into());
    values.extend(metric_values(&self.metrics));
    values
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      date_key:          date_key(row, 0)?,
      calendar:          read_calendar(row, 1)?,
      page_id:           row.get(8)?,
      business_division: row.get(9)?,
      region:            row.get(10)?,
      metrics:           read_metrics(row, 11)?,
    })
  }
}

impl Record for MonthlyPageRow {
  const COLUMNS: &'static [&'static str] = &[
    "year_month",
    "page_id",
    "page_name",
    "website_name",
    "theme",
    "topic",
    "content_type",
    "template",
    "days_in_period",
    "unique_viewers",
    "views",
    "visits",
    "likes",
    "comments",
    "duration_sum",
    "row_count",
  ];
  const TABLE_NAME: &'static str = "agg_monthly_page";

  fn values(&self) -> Vec<Value> {
    let mut values = vec![self.year_month.key().into(), self.page_id.clone().into()];
    values.extend(page_values(&self.page));
    values.push(self.days_in_period.into());
    values.extend(metric_values(&self.metrics));
    values
  }

  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      year_month:     year_month(row, 0)?,
      page_id:        row.get(1)?,
      page:           read_page(row, 2)?,
      days_in_period: row.get(8)?,
      metrics:        read_metrics(row, 9)?,
    })
  }
}
