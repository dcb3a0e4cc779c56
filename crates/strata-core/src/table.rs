//! Names of the logical tables held by a store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four logical tables of the persisted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
  Fact,
  Page,
  Person,
  Calendar,
}

impl Table {
  /// The physical table name used by storage backends and exports.
  pub fn as_str(self) -> &'static str {
    match self {
      Table::Fact => "fact",
      Table::Page => "page_inventory",
      Table::Person => "employee_contact",
      Table::Calendar => "dim_date",
    }
  }
}

impl fmt::Display for Table {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
