//! One batch run: search, build, merge, save.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{info, warn};

use super::builder::{ExtractionWarning, RecordBuilder};
use super::domain::{ApplicationRecord, LifecycleStage};
use super::reconcile::MergeOutcome;
use super::table::{StoreError, TableGateway};
use crate::mailbox::{Mailbox, MailboxError, SearchQuery};

/// What to do with candidates that carry neither a company nor a stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoisePolicy {
    KeepAll,
    #[default]
    DropUnidentified,
}

impl NoisePolicy {
    pub fn from_keep_flag(keep_unidentified: bool) -> Self {
        if keep_unidentified {
            Self::KeepAll
        } else {
            Self::DropUnidentified
        }
    }

    pub fn admits(self, record: &ApplicationRecord) -> bool {
        match self {
            Self::KeepAll => true,
            Self::DropUnidentified => {
                !record.company.trim().is_empty() || record.stage != LifecycleStage::Unknown
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("start date {start} must be before end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("scan task stopped before finishing: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub query: String,
    pub emails_scanned: usize,
    pub records_merged: usize,
    pub rows_inserted: usize,
    pub rows_updated: usize,
    pub skipped: usize,
    pub warnings: BTreeMap<ExtractionWarning, usize>,
    pub stage_counts: BTreeMap<LifecycleStage, usize>,
    pub table_rows: usize,
    pub table_path: PathBuf,
    pub saved: bool,
}

impl ScanReport {
    fn empty(query: &SearchQuery, table_path: PathBuf) -> Self {
        Self {
            start_date: query.start,
            end_date: query.end,
            query: query.render(),
            emails_scanned: 0,
            records_merged: 0,
            rows_inserted: 0,
            rows_updated: 0,
            skipped: 0,
            warnings: BTreeMap::new(),
            stage_counts: BTreeMap::new(),
            table_rows: 0,
            table_path,
            saved: false,
        }
    }

    pub fn render_text(&self) -> String {
        if self.emails_scanned == 0 {
            return "No job application emails found in the specified date range.".to_string();
        }

        let mut lines = vec![format!(
            "Successfully processed {} job application emails:",
            self.emails_scanned
        )];
        lines.push(String::new());
        for stage in LifecycleStage::ordered() {
            if let Some(count) = self.stage_counts.get(&stage) {
                lines.push(format!("• {}: {}", stage.label(), count));
            }
        }
        lines.push(String::new());
        lines.push(format!(
            "Rows inserted: {}, updated: {}, skipped: {}",
            self.rows_inserted, self.rows_updated, self.skipped
        ));
        for (warning, count) in &self.warnings {
            lines.push(format!("Warning: {} ({count})", warning.label()));
        }
        lines.push(format!("Data saved to: {}", self.table_path.display()));
        lines.join("\n")
    }
}

pub struct ScanPipeline {
    builder: RecordBuilder,
    policy: NoisePolicy,
}

impl ScanPipeline {
    pub fn new(builder: RecordBuilder, policy: NoisePolicy) -> Self {
        Self { builder, policy }
    }

    pub fn builder(&self) -> &RecordBuilder {
        &self.builder
    }

    pub fn policy(&self) -> NoisePolicy {
        self.policy
    }

    /// Runs one batch. The table is rewritten only after every email merged
    /// cleanly, and not at all when the search came back empty.
    pub fn run<M: Mailbox + ?Sized>(
        &self,
        mailbox: &M,
        gateway: &TableGateway,
        query: &SearchQuery,
        now: NaiveDateTime,
    ) -> Result<ScanReport, ScanError> {
        if !query.is_valid_range() {
            return Err(ScanError::InvalidRange {
                start: query.start,
                end: query.end,
            });
        }

        let mut emails = mailbox.search(query)?.collect::<Vec<_>>();
        let mut report = ScanReport::empty(query, gateway.path().to_path_buf());
        if emails.is_empty() {
            info!(query = %report.query, "no matching emails; table left untouched");
            return Ok(report);
        }
        emails.sort_by(|left, right| {
            left.received_date
                .cmp(&right.received_date)
                .then_with(|| left.message_id.cmp(&right.message_id))
        });

        let mut table = gateway.load()?;
        let now = now.with_nanosecond(0).unwrap_or(now);
        report.emails_scanned = emails.len();

        for email in &emails {
            let (record, warnings) = self.builder.build_with_warnings(email);
            *report.stage_counts.entry(record.stage).or_default() += 1;
            for warning in warnings {
                *report.warnings.entry(warning).or_default() += 1;
            }

            if !self.policy.admits(&record) {
                report.skipped += 1;
                continue;
            }

            report.records_merged += 1;
            match table.merge(record, now) {
                MergeOutcome::Inserted => report.rows_inserted += 1,
                MergeOutcome::Updated => report.rows_updated += 1,
                MergeOutcome::Unchanged => {}
            }
        }

        if !report.warnings.is_empty() {
            warn!(warnings = ?report.warnings, "some emails were only partially understood");
        }

        gateway.save(&table)?;
        report.table_rows = table.len();
        report.saved = true;

        info!(
            scanned = report.emails_scanned,
            merged = report.records_merged,
            inserted = report.rows_inserted,
            updated = report.rows_updated,
            skipped = report.skipped,
            "scan batch complete"
        );
        Ok(report)
    }
}

impl Default for ScanPipeline {
    fn default() -> Self {
        Self::new(RecordBuilder::default(), NoisePolicy::default())
    }
}
