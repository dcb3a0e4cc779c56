//! The static header alias table.
//!
//! Source headers are normalised (lowercased, everything but letters and
//! digits dropped) and looked up once per file. Aliases below are written
//! in normalised form; a column's canonical name always matches itself.

use std::collections::HashMap;

use csv::StringRecord;
use strata_core::table::Table;

use crate::{Error, Result};

/// One canonical column and the source headers that map onto it.
pub struct ColumnSpec {
  pub name:     &'static str,
  /// A snapshot without this column cannot be loaded.
  pub required: bool,
  pub aliases:  &'static [&'static str],
}

const fn required(name: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
  ColumnSpec { name, required: true, aliases }
}

const fn optional(name: &'static str, aliases: &'static [&'static str]) -> ColumnSpec {
  ColumnSpec { name, required: false, aliases }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

pub static FACT_COLUMNS: &[ColumnSpec] = &[
  required("visit_date_key", &["factvisitdatekey", "visitdate"]),
  optional("referrer_channel", &[
    "factreferrerapplicationid",
    "referrerapplicationid",
  ]),
  required("page_id", &["factmarketingpageid", "marketingpageid"]),
  optional("views", &["factviews"]),
  required("viewer_id", &["factviewingcontactid", "viewingcontactid"]),
  optional("status_flag", &["factflag", "flag"]),
  optional("visits", &["factvisits"]),
  optional("duration_sum", &["factdurationsum"]),
  optional("duration_avg", &["factdurationavg"]),
  optional("comments", &["factcomments"]),
  optional("liked_page_id", &[
    "factmarketingpageidliked",
    "marketingpageidliked",
  ]),
];

pub static PAGE_COLUMNS: &[ColumnSpec] = &[
  required("page_id", &["marketingpageid"]),
  optional("website_name", &[]),
  optional("website_url", &[]),
  optional("owning_business_unit", &[]),
  optional("page_name", &[]),
  optional("full_page_url", &[]),
  optional("source_system_page_id", &[]),
  optional("theme", &[]),
  optional("topic", &[]),
  optional("page_url", &[]),
  optional("exclude", &[]),
  optional("site_name", &[]),
  optional("theme_normalized", &["themecopy"]),
  optional("topic_normalized", &["topiccopy"]),
  optional("template", &[]),
  optional("content_type", &[]),
  optional("page_language", &[]),
  optional("news_category", &[]),
  optional("target_region", &[]),
  optional("target_organization", &[]),
  optional("cnt", &[]),
];

pub static PERSON_COLUMNS: &[ColumnSpec] = &[
  required("contact_id", &["employeecontactid", "viewingcontactid"]),
  optional("business_division", &["employeebusinessdivision"]),
  optional("region", &["employeeregion"]),
  optional("work_country", &["employeeworkcountry"]),
  optional("employment_class", &["employeeclass", "employeeemploymentclass"]),
  optional("org_level_1", &["employeeorglevel1"]),
  optional("org_level_2", &["employeeorglevel2"]),
  optional("org_level_3", &["employeeorglevel3"]),
  optional("org_level_4", &["employeeorglevel4"]),
  optional("org_level_5", &["employeeorglevel5"]),
  optional("job_role", &["employeejobrole"]),
  optional("job_family", &["employeejobfamily"]),
  optional("job_category", &["employeejobcategory"]),
];

pub fn columns(table: Table) -> &'static [ColumnSpec] {
  match table {
    Table::Fact => FACT_COLUMNS,
    Table::Page => PAGE_COLUMNS,
    Table::Person => PERSON_COLUMNS,
    Table::Calendar => &[],
  }
}

/// `"theme - Copy"` → `"themecopy"`, `"fact_marketingPageId"` →
/// `"factmarketingpageid"`.
pub fn normalize_header(raw: &str) -> String {
  raw
    .chars()
    .filter(|c| c.is_alphanumeric())
    .flat_map(char::to_lowercase)
    .collect()
}

fn lookup(specs: &'static [ColumnSpec]) -> HashMap<String, &'static ColumnSpec> {
  let mut index = HashMap::new();
  for spec in specs {
    index.insert(normalize_header(spec.name), spec);
    for alias in spec.aliases {
      index.insert((*alias).to_owned(), spec);
    }
  }
  index
}

// ─── Header map ──────────────────────────────────────────────────────────────

/// Where each canonical column sits in one file's records.
#[derive(Debug)]
pub struct HeaderMap {
  table:        Table,
  positions:    HashMap<&'static str, usize>,
  /// Headers that matched no column, or a column already matched by an
  /// earlier header. In file order.
  pub unmapped: Vec<String>,
}

impl HeaderMap {
  /// Resolve `headers` against the table's columns. Fails when a required
  /// column has no header.
  pub fn resolve(table: Table, headers: &StringRecord) -> Result<Self> {
    let specs = columns(table);
    let index = lookup(specs);
    let mut positions = HashMap::new();
    let mut unmapped = Vec::new();

    for (position, header) in headers.iter().enumerate() {
      match index.get(&normalize_header(header)) {
        Some(spec) if !positions.contains_key(spec.name) => {
          positions.insert(spec.name, position);
        }
        _ => unmapped.push(header.to_owned()),
      }
    }

    if let Some(missing) = specs
      .iter()
      .find(|spec| spec.required && !positions.contains_key(spec.name))
    {
      return Err(Error::MissingColumn { table, column: missing.name });
    }

    Ok(Self { table, positions, unmapped })
  }

  pub fn table(&self) -> Table { self.table }

  /// The trimmed cell for `column`, or `None` when the column is absent from
  /// the file or the cell is empty.
  pub fn cell<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
    let position = *self.positions.get(column)?;
    record.get(position).map(str::trim).filter(|cell| !cell.is_empty())
  }
}
