//! The per-run validation report.

use serde::{Deserialize, Serialize};

use crate::{
  dimension::{PageRow, PersonRow},
  fact::FactRow,
  snapshot::LoadedTable,
  validate::{
    OrphanReport, TableReport, dimension_report, fact_report, orphan_report,
    validate_facts, validate_pages, validate_people,
  },
};

/// Everything validation found during one ingestion run.
///
/// `incoming` describes the snapshot as loaded; `post_merge` describes the
/// persisted tables after the merge, so duplicates that accumulate across
/// runs show up there even when each snapshot is clean on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
  pub incoming:                Vec<TableReport>,
  pub post_merge:              Vec<TableReport>,
  pub person_snapshot_present: bool,
  /// Fact rows referencing unknown pages, measured after the merge.
  pub orphans:                 OrphanReport,
}

impl ValidationReport {
  /// Validate the incoming snapshot.
  pub fn for_snapshot(
    facts: &LoadedTable<FactRow>,
    pages: &LoadedTable<PageRow>,
    people: Option<&LoadedTable<PersonRow>>,
  ) -> Self {
    let mut incoming = vec![validate_facts(facts), validate_pages(pages)];
    incoming.extend(people.map(validate_people));

    Self {
      incoming,
      post_merge: Vec::new(),
      person_snapshot_present: people.is_some(),
      orphans: OrphanReport::default(),
    }
  }

  /// Validate the merged tables.
  pub fn record_post_merge(
    &mut self,
    facts: &[FactRow],
    pages: &[PageRow],
    people: &[PersonRow],
  ) {
    self.post_merge = vec![
      fact_report(facts, 0, &[]),
      dimension_report(pages, 0, &[]),
      dimension_report(people, 0, &[]),
    ];
    self.orphans = orphan_report(facts, pages);
  }

  /// Number of table reports, incoming or post-merge, with any finding.
  pub fn findings(&self) -> usize {
    self
      .incoming
      .iter()
      .chain(&self.post_merge)
      .filter(|report| !report.is_clean())
      .count()
  }

  pub fn log(&self) {
    for report in &self.incoming {
      report.log();
    }
    for report in &self.post_merge {
      if report.duplicate_keys > 0 || report.null_violations > 0 {
        tracing::warn!(
          table = %report.table,
          rows = report.rows,
          duplicate_keys = report.duplicate_keys,
          samples = ?report.duplicate_samples,
          null_violations = report.null_violations,
          "persisted table has key findings after merge"
        );
      }
    }
    if !self.person_snapshot_present {
      tracing::info!("no person snapshot; person table left unchanged");
    }
    if self.orphans.orphan_rows > 0 {
      tracing::info!(
        orphan_rows = self.orphans.orphan_rows,
        orphan_pages = self.orphans.orphan_pages,
        "fact rows reference pages missing from the page dimension"
      );
    }
  }
}
