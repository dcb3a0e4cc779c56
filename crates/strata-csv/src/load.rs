//! Snapshot loaders.
//!
//! Each loader reads one headed CSV file into a [`LoadedTable`]. Empty cells
//! become `None`. Rows missing the one column they cannot exist without (the
//! fact date, a dimension key) are counted as rejected and skipped. A cell
//! that is present but unparseable fails the whole load.

use std::{fs::File, io, path::Path};

use csv::StringRecord;
use strata_core::{
  dimension::{PageRow, PersonRow},
  fact::FactRow,
  key::DateKey,
  snapshot::LoadedTable,
  table::Table,
};

use crate::{Error, Result, alias::HeaderMap};

// ─── Cells ───────────────────────────────────────────────────────────────────

/// Typed access to one record through a [`HeaderMap`].
struct Cells<'a> {
  map:    &'a HeaderMap,
  record: &'a StringRecord,
}

impl<'a> Cells<'a> {
  fn invalid(&self, column: &'static str, value: &str) -> Error {
    Error::InvalidValue {
      table: self.map.table(),
      line: self.record.position().map_or(0, |p| p.line()),
      column,
      value: value.to_owned(),
    }
  }

  fn text(&self, column: &'static str) -> Option<String> {
    self.map.cell(self.record, column).map(str::to_owned)
  }

  /// Integers also accept an integral float (`"12.0"`), as spreadsheet
  /// exports tend to write them.
  fn int(&self, column: &'static str) -> Result<Option<i64>> {
    let Some(raw) = self.map.cell(self.record, column) else { return Ok(None) };
    parse_int(raw).map(Some).ok_or_else(|| self.invalid(column, raw))
  }

  fn float(&self, column: &'static str) -> Result<Option<f64>> {
    let Some(raw) = self.map.cell(self.record, column) else { return Ok(None) };
    raw
      .parse::<f64>()
      .ok()
      .filter(|value| value.is_finite())
      .map(Some)
      .ok_or_else(|| self.invalid(column, raw))
  }

  fn date_key(&self, column: &'static str) -> Result<Option<DateKey>> {
    let Some(raw) = self.map.cell(self.record, column) else { return Ok(None) };
    let parsed = match parse_int(raw) {
      Some(int) => DateKey::from_int(int).ok(),
      None => raw.parse::<DateKey>().ok(),
    };
    parsed.map(Some).ok_or_else(|| self.invalid(column, raw))
  }
}

fn parse_int(raw: &str) -> Option<i64> {
  if let Ok(int) = raw.parse::<i64>() {
    return Some(int);
  }
  let float = raw.parse::<f64>().ok()?;
  (float.is_finite() && float.fract() == 0.0 && float.abs() < i64::MAX as f64)
    .then_some(float as i64)
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A row type a snapshot file can be loaded into.
trait Snapshot: Sized {
  const TABLE: Table;

  /// `Ok(None)` rejects the row.
  fn from_cells(cells: &Cells<'_>) -> Result<Option<Self>>;
}

impl Snapshot for FactRow {
  const TABLE: Table = Table::Fact;

  fn from_cells(cells: &Cells<'_>) -> Result<Option<Self>> {
    let Some(visit_date_key) = cells.date_key("visit_date_key")? else {
      return Ok(None);
    };
    Ok(Some(FactRow {
      visit_date_key,
      referrer_channel: cells.text("referrer_channel"),
      page_id: cells.text("page_id"),
      views: cells.int("views")?,
      viewer_id: cells.text("viewer_id"),
      status_flag: cells.text("status_flag"),
      visits: cells.int("visits")?,
      duration_sum: cells.float("duration_sum")?,
      duration_avg: cells.float("duration_avg")?,
      comments: cells.int("comments")?,
      liked_page_id: cells.text("liked_page_id"),
    }))
  }
}

impl Snapshot for PageRow {
  const TABLE: Table = Table::Page;

  fn from_cells(cells: &Cells<'_>) -> Result<Option<Self>> {
    let Some(page_id) = cells.text("page_id") else { return Ok(None) };
    Ok(Some(PageRow {
      page_id,
      website_name: cells.text("website_name"),
      website_url: cells.text("website_url"),
      owning_business_unit: cells.text("owning_business_unit"),
      page_name: cells.text("page_name"),
      full_page_url: cells.text("full_page_url"),
      source_system_page_id: cells.text("source_system_page_id"),
      theme: cells.text("theme"),
      topic: cells.text("topic"),
      page_url: cells.text("page_url"),
      exclude: cells.text("exclude"),
      site_name: cells.text("site_name"),
      theme_normalized: cells.text("theme_normalized"),
      topic_normalized: cells.text("topic_normalized"),
      template: cells.text("template"),
      content_type: cells.text("content_type"),
      page_language: cells.text("page_language"),
      news_category: cells.text("news_category"),
      target_region: cells.text("target_region"),
      target_organization: cells.text("target_organization"),
      cnt: cells.int("cnt")?,
    }))
  }
}

impl Snapshot for PersonRow {
  const TABLE: Table = Table::Person;

  fn from_cells(cells: &Cells<'_>) -> Result<Option<Self>> {
    let Some(contact_id) = cells.text("contact_id") else { return Ok(None) };
    Ok(Some(PersonRow {
      contact_id,
      business_division: cells.text("business_division"),
      region: cells.text("region"),
      work_country: cells.text("work_country"),
      employment_class: cells.text("employment_class"),
      org_level_1: cells.text("org_level_1"),
      org_level_2: cells.text("org_level_2"),
      org_level_3: cells.text("org_level_3"),
      org_level_4: cells.text("org_level_4"),
      org_level_5: cells.text("org_level_5"),
      job_role: cells.text("job_role"),
      job_family: cells.text("job_family"),
      job_category: cells.text("job_category"),
    }))
  }
}

// ─── Loaders ─────────────────────────────────────────────────────────────────

fn read<R: Snapshot>(reader: impl io::Read) -> Result<LoadedTable<R>> {
  let mut input = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
  let map = HeaderMap::resolve(R::TABLE, input.headers()?)?;

  let mut rows = Vec::new();
  let mut rejected_rows = 0;
  let mut record = StringRecord::new();
  while input.read_record(&mut record)? {
    match R::from_cells(&Cells { map: &map, record: &record })? {
      Some(row) => rows.push(row),
      None => rejected_rows += 1,
    }
  }

  tracing::debug!(
    table = %R::TABLE,
    rows = rows.len(),
    rejected_rows,
    unmapped = map.unmapped.len(),
    "snapshot loaded"
  );

  Ok(LoadedTable { rows, rejected_rows, unmapped_columns: map.unmapped })
}

fn load<R: Snapshot>(path: &Path) -> Result<LoadedTable<R>> {
  let file = File::open(path)
    .map_err(|source| Error::Open { path: path.to_owned(), source })?;
  read(io::BufReader::new(file))
}

pub fn load_facts(path: impl AsRef<Path>) -> Result<LoadedTable<FactRow>> {
  load(path.as_ref())
}

pub fn load_pages(path: impl AsRef<Path>) -> Result<LoadedTable<PageRow>> {
  load(path.as_ref())
}

pub fn load_people(path: impl AsRef<Path>) -> Result<LoadedTable<PersonRow>> {
  load(path.as_ref())
}

pub fn read_facts(reader: impl io::Read) -> Result<LoadedTable<FactRow>> { read(reader) }

pub fn read_pages(reader: impl io::Read) -> Result<LoadedTable<PageRow>> { read(reader) }

pub fn read_people(reader: impl io::Read) -> Result<LoadedTable<PersonRow>> { read(reader) }

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  const FACT_CSV: &str = "\
fact_visitdatekey,fact_referrerapplicationid,fact_marketingPageId,fact_views,fact_viewingcontactid,fact_flag,fact_visits,fact_durationsum,fact_durationavg,fact_comments,fact_marketingPageIdliked
20250101,Teams,p1,3,v1,A,1,12.5,4.2,0,p1
20250101,,p1,1,,B,1.0,,,,
,Teams,p2,1,v2,,1,,,,
2025-01-02, Teams ,p2,2,v3,,1,3,3,1,
";

  #[test]
  fn fact_export_loads() {
    let table = read_facts(FACT_CSV.as_bytes()).unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table.rejected_rows, 1);
    assert!(table.unmapped_columns.is_empty());

    let first = &table.rows[0];
    assert_eq!(first.visit_date_key.get(), 20250101);
    assert_eq!(first.referrer_channel.as_deref(), Some("Teams"));
    assert_eq!(first.views, Some(3));
    assert_eq!(first.duration_sum, Some(12.5));
    assert!(first.is_like());

    let anonymous = &table.rows[1];
    assert_eq!(anonymous.viewer_id, None);
    assert_eq!(anonymous.visits, Some(1));
    assert_eq!(anonymous.comments, None);
    assert!(!anonymous.is_like());

    let iso = &table.rows[2];
    assert_eq!(iso.visit_date_key.get(), 20250102);
    assert_eq!(iso.referrer_channel.as_deref(), Some("Teams"));
  }

  #[test]
  fn unparseable_measure_is_structural() {
    let csv = "fact_visitdatekey,fact_marketingPageId,fact_viewingcontactid,fact_views\n\
               20250101,p1,v1,3\n\
               20250101,p1,v2,lots\n";
    let err = read_facts(csv.as_bytes()).unwrap_err();
    match err {
      Error::InvalidValue { table, line, column, value } => {
        assert_eq!(table, Table::Fact);
        assert_eq!(line, 3);
        assert_eq!(column, "views");
        assert_eq!(value, "lots");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn impossible_date_is_structural() {
    let csv = "fact_visitdatekey,fact_marketingPageId,fact_viewingcontactid\n20250231,p1,v1\n";
    assert!(matches!(
      read_facts(csv.as_bytes()),
      Err(Error::InvalidValue { column: "visit_date_key", .. })
    ));
  }

  #[test]
  fn ragged_rows_are_malformed() {
    let csv = "fact_visitdatekey,fact_marketingPageId,fact_viewingcontactid\n20250101,p1\n";
    assert!(matches!(read_facts(csv.as_bytes()), Err(Error::Csv(_))));
  }

  #[test]
  fn page_rows_without_key_are_rejected() {
    let csv = "marketingpageid,websitename,Site name,theme - Copy,cnt,Owner\n\
               p1,News,Newsroom,Culture,4,me\n\
               ,HR,,,,\n\
               Unknown,,,,,\n";
    let table = read_pages(csv.as_bytes()).unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.rejected_rows, 1);
    assert_eq!(table.unmapped_columns, vec!["Owner".to_string()]);

    let page = &table.rows[0];
    assert_eq!(page.website_name.as_deref(), Some("News"));
    assert_eq!(page.site_name.as_deref(), Some("Newsroom"));
    assert_eq!(page.theme_normalized.as_deref(), Some("Culture"));
    assert_eq!(page.cnt, Some(4));
    assert_eq!(table.rows[1].page_id, "Unknown");
  }

  #[test]
  fn people_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
      file,
      "contactid,employeeregion,employeebusinessdivision,employeejobrole\n\
       c1,EMEA,Finance,\n\
       c2,,,Analyst\n"
    )
    .unwrap();

    let table = load_people(file.path()).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0].region.as_deref(), Some("EMEA"));
    assert_eq!(table.rows[0].business_division.as_deref(), Some("Finance"));
    assert_eq!(table.rows[0].job_role, None);
    assert_eq!(table.rows[1].job_role.as_deref(), Some("Analyst"));
  }

  #[test]
  fn missing_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_facts(dir.path().join("absent.csv")).unwrap_err();
    assert!(matches!(err, Error::Open { .. }));
  }

  #[test]
  fn integral_floats_are_integers() {
    assert_eq!(parse_int("12"), Some(12));
    assert_eq!(parse_int("12.0"), Some(12));
    assert_eq!(parse_int("12.5"), None);
    assert_eq!(parse_int("NaN"), None);
    assert_eq!(parse_int(""), None);
  }
}
