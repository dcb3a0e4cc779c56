//! Flat CSV export of the persisted tables and aggregates, one file per
//! table, each with a fixed header (written even when the table is empty).
//!
//! Aggregate files carry their distinct counts as-is. Like the aggregate
//! rows they come from, `unique_viewers` and `pages_viewed` columns must not
//! be summed across rows by downstream tools.

use std::{
  fs::{self, File},
  io,
  path::{Path, PathBuf},
};

use strata_core::{
  aggregate::{
    AggregateSet, CalendarAttributes, DailyPagePersonRow, DailyPageRow, DailyWebsiteRow,
    Metrics, MonthlyPageRow, PageAttributes,
  },
  calendar::CalendarRow,
  dimension::{PageRow, PersonRow},
  fact::FactRow,
};

use crate::{Error, Result};

/// A row type that exports to its own CSV file.
pub trait ExportTable {
  const FILE: &'static str;
  const HEADER: &'static [&'static str];

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()>;
}

// ─── Writers ─────────────────────────────────────────────────────────────────

/// Write the header and every row of `rows` to `writer`.
pub fn write_table<T: ExportTable, W: io::Write>(writer: W, rows: &[T]) -> Result<()> {
  let mut out = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
  out.write_record(T::HEADER)?;
  for row in rows {
    row.write_row(&mut out)?;
  }
  out.flush()?;
  Ok(())
}

/// Write `rows` to `<dir>/<T::FILE>`, replacing any previous export.
pub fn export_table<T: ExportTable>(dir: &Path, rows: &[T]) -> Result<PathBuf> {
  let path = dir.join(T::FILE);
  let file =
    File::create(&path).map_err(|source| Error::Open { path: path.clone(), source })?;
  write_table(io::BufWriter::new(file), rows)?;
  tracing::debug!(path = %path.display(), rows = rows.len(), "table exported");
  Ok(path)
}

/// Export the merged fact and dimension tables and the calendar.
pub fn export_store_tables(
  dir: &Path,
  facts: &[FactRow],
  pages: &[PageRow],
  people: &[PersonRow],
  calendar: &[CalendarRow],
) -> Result<Vec<PathBuf>> {
  fs::create_dir_all(dir)?;
  Ok(vec![
    export_table(dir, facts)?,
    export_table(dir, pages)?,
    export_table(dir, people)?,
    export_table(dir, calendar)?,
  ])
}

/// Export every aggregate grain. The person grain is written only when it
/// was built; otherwise any earlier export of it is removed.
pub fn export_aggregates(dir: &Path, set: &AggregateSet) -> Result<Vec<PathBuf>> {
  fs::create_dir_all(dir)?;
  let mut paths = vec![
    export_table(dir, &set.daily_page)?,
    export_table(dir, &set.daily_website)?,
    export_table(dir, &set.monthly_page)?,
  ];
  match &set.daily_page_person {
    Some(rows) => paths.push(export_table(dir, rows)?),
    None => remove_stale::<DailyPagePersonRow>(dir)?,
  }
  Ok(paths)
}

fn remove_stale<T: ExportTable>(dir: &Path) -> Result<()> {
  let path = dir.join(T::FILE);
  match fs::remove_file(&path) {
    Ok(()) => {
      tracing::debug!(path = %path.display(), "stale export removed");
      Ok(())
    }
    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(err) => Err(err.into()),
  }
}

// ─── Flat tables ─────────────────────────────────────────────────────────────

impl ExportTable for FactRow {
  const FILE: &'static str = "fact.csv";
  const HEADER: &'static [&'static str] = &[
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

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
    out.serialize(self)
  }
}

impl ExportTable for PageRow {
  const FILE: &'static str = "page_inventory.csv";
  const HEADER: &'static [&'static str] = &[
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

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
    out.serialize(self)
  }
}

impl ExportTable for PersonRow {
  const FILE: &'static str = "employee_contact.csv";
  const HEADER: &'static [&'static str] = &[
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

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
    out.serialize(self)
  }
}

impl ExportTable for CalendarRow {
  const FILE: &'static str = "dim_date.csv";
  const HEADER: &'static [&'static str] = &[
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

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
    out.serialize(self)
  }
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

fn opt<T: ToString>(value: Option<T>) -> String {
  value.map(|v| v.to_string()).unwrap_or_default()
}

fn calendar_fields(calendar: Option<&CalendarAttributes>) -> [String; 7] {
  [
    opt(calendar.map(|c| c.year)),
    opt(calendar.map(|c| c.quarter)),
    opt(calendar.map(|c| c.month)),
    opt(calendar.map(|c| &c.year_month)),
    opt(calendar.map(|c| &c.year_week)),
    opt(calendar.map(|c| c.day_of_week)),
    opt(calendar.map(|c| c.is_weekend)),
  ]
}

fn page_fields(page: &PageAttributes) -> [String; 6] {
  [
    opt(page.page_name.as_ref()),
    opt(page.website_name.as_ref()),
    opt(page.theme.as_ref()),
    opt(page.topic.as_ref()),
    opt(page.content_type.as_ref()),
    opt(page.template.as_ref()),
  ]
}

fn metric_fields(m: &Metrics) -> [String; 9] {
  [
    m.unique_viewers.get().to_string(),
    m.views.to_string(),
    m.visits.to_string(),
    m.likes.to_string(),
    m.comments.to_string(),
    m.engagements().to_string(),
    m.engagement_rate().to_string(),
    m.duration_sum.to_string(),
    m.row_count.to_string(),
  ]
}

impl ExportTable for DailyPageRow {
  const FILE: &'static str = "agg_daily_page.csv";
  const HEADER: &'static [&'static str] = &[
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
    "engagements",
    "engagement_rate",
    "duration_sum",
    "row_count",
  ];

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
    let mut record = vec![self.date_key.to_string()];
    record.extend(calendar_fields(self.calendar.as_ref()));
    record.push(opt(self.page_id.as_ref()));
    record.extend(page_fields(&self.page));
    record.extend(metric_fields(&self.metrics));
    out.write_record(&record)
  }
}

impl ExportTable for DailyWebsiteRow {
  const FILE: &'static str = "agg_daily_website.csv";
  const HEADER: &'static [&'static str] = &[
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
    "engagements",
    "engagement_rate",
    "duration_sum",
    "row_count",
  ];

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
    let mut record = vec![self.date_key.to_string()];
    record.extend(calendar_fields(self.calendar.as_ref()));
    record.push(self.website_name.clone());
    record.push(self.pages_viewed.get().to_string());
    record.extend(metric_fields(&self.metrics));
    out.write_record(&record)
  }
}

impl ExportTable for DailyPagePersonRow {
  const FILE: &'static str = "agg_daily_page_person.csv";
  const HEADER: &'static [&'static str] = &[
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
    "engagements",
    "engagement_rate",
    "duration_sum",
    "row_count",
  ];

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
    let mut record = vec![self.date_key.to_string()];
    record.extend(calendar_fields(self.calendar.as_ref()));
    record.push(opt(self.page_id.as_ref()));
    record.push(self.business_division.clone());
    record.push(self.region.clone());
    record.extend(metric_fields(&self.metrics));
    out.write_record(&record)
  }
}

impl ExportTable for MonthlyPageRow {
  const FILE: &'static str = "agg_monthly_page.csv";
  const HEADER: &'static [&'static str] = &[
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
    "engagements",
    "engagement_rate",
    "duration_sum",
    "row_count",
  ];

  fn write_row<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
    let mut record = vec![self.year_month.key().to_string(), opt(self.page_id.as_ref())];
    record.extend(page_fields(&self.page));
    record.push(self.days_in_period.to_string());
    record.extend(metric_fields(&self.metrics));
    out.write_record(&record)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use strata_core::{aggregate::Aggregator, calendar::generate_calendar, key::DateKey};

  use super::*;

  fn to_string<T: ExportTable>(rows: &[T]) -> String {
    let mut buf = Vec::new();
    write_table(&mut buf, rows).unwrap();
    String::from_utf8(buf).unwrap()
  }

  fn sample_facts() -> Vec<FactRow> {
    let day = DateKey::from_int(20250104).unwrap();
    let mut liked = FactRow::new(day, "p1", "v1");
    liked.views = Some(2);
    liked.liked_page_id = Some("p1".into());
    vec![liked, FactRow::new(day, "p1", "v2")]
  }

  #[test]
  fn empty_tables_still_get_a_header() {
    let out = to_string::<PageRow>(&[]);
    assert_eq!(out.trim_end(), PageRow::HEADER.join(","));
  }

  #[test]
  fn serde_field_order_matches_header() {
    fn serde_header<T: serde::Serialize>(row: &T) -> String {
      let mut out = csv::Writer::from_writer(Vec::new());
      out.serialize(row).unwrap();
      let text = String::from_utf8(out.into_inner().unwrap()).unwrap();
      text.lines().next().unwrap().to_owned()
    }

    assert_eq!(serde_header(&sample_facts()[0]), FactRow::HEADER.join(","));
    assert_eq!(serde_header(&PageRow::new("p1")), PageRow::HEADER.join(","));
    assert_eq!(serde_header(&PersonRow::new("c1")), PersonRow::HEADER.join(","));
    let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    assert_eq!(serde_header(&CalendarRow::for_date(day)), CalendarRow::HEADER.join(","));
  }

  #[test]
  fn fact_rows_export_nulls_as_empty_cells() {
    let out = to_string(&sample_facts());
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "20250104,,p1,2,v1,,,,,,p1");
    assert_eq!(lines[2], "20250104,,p1,,v2,,,,,,");
  }

  #[test]
  fn calendar_rows_export_flat() {
    let day = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let out = to_string(&generate_calendar(day, day));
    let row = out.lines().nth(1).unwrap();
    assert!(row.starts_with("20220101,2022-01-01,2022,1,Q1,Q1 2022,1,January,Jan,2022-01,52,2021-W52"));
    assert!(row.ends_with("true,true,false,true,false,true,false"));
  }

  #[test]
  fn aggregate_rows_carry_derived_engagement() {
    let facts = sample_facts();
    let calendar = generate_calendar(
      NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
      NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
    );
    let set = Aggregator::new(&facts, &[], None, &calendar).build_all();

    let out = to_string(&set.daily_page);
    let row: Vec<_> = out.lines().nth(1).unwrap().split(',').collect();
    assert_eq!(row.len(), DailyPageRow::HEADER.len());
    assert_eq!(row[0], "20250104");
    assert_eq!(row[7], "true");
    assert_eq!(row[8], "p1");
    assert_eq!(row[15], "2");
    assert_eq!(row[18], "1");
    assert_eq!(row[20], "1");
    assert_eq!(row[21], "0.5");
  }

  #[test]
  fn aggregates_export_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let facts = sample_facts();
    let set = Aggregator::new(&facts, &[], None, &[]).build_all();

    let paths = export_aggregates(&dir.path().join("out"), &set).unwrap();
    let names: Vec<_> = paths
      .iter()
      .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
      .collect();
    assert_eq!(
      names,
      vec!["agg_daily_page.csv", "agg_daily_website.csv", "agg_monthly_page.csv"]
    );

    let monthly = fs::read_to_string(&paths[2]).unwrap();
    assert_eq!(monthly.lines().count(), 2);
    assert!(monthly.lines().nth(1).unwrap().starts_with("202501,p1,"));
  }

  #[test]
  fn skipped_person_grain_removes_earlier_export() {
    let dir = tempfile::tempdir().unwrap();
    let facts = sample_facts();
    let people = vec![PersonRow::new("v1")];

    let with_people = Aggregator::new(&facts, &[], Some(&people), &[]).build_all();
    let paths = export_aggregates(dir.path(), &with_people).unwrap();
    let person_file = dir.path().join(DailyPagePersonRow::FILE);
    assert!(paths.contains(&person_file));
    assert!(person_file.is_file());

    let without_people = Aggregator::new(&facts, &[], None, &[]).build_all();
    let paths = export_aggregates(dir.path(), &without_people).unwrap();
    assert!(!paths.contains(&person_file));
    assert!(!person_file.exists());
  }
}
