//! Merging candidate records into the tracker table.
//!
//! The table is keyed by [`ApplicationKey`]. Every row is a join over the
//! records that reached it: the highest stage, the earliest first-seen date
//! and the newest `(received date, message id)` pair. A merge never
//! overwrites a filled company or position, and only touches `updated_at`
//! when the stored row actually changed, so replaying a batch is a no-op.
//!
//! A record with one empty half keeps a row of its own and also feeds every
//! complete row that fills that half in. A complete row created later starts
//! from the partial rows it completes, so which rows a record reaches does
//! not depend on arrival order.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::domain::{ApplicationKey, ApplicationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyMatching {
    Exact,
    AllowPartial,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplicationTable {
    entries: BTreeMap<ApplicationKey, ApplicationRecord>,
}

impl ApplicationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &ApplicationKey) -> Option<&ApplicationRecord> {
        self.entries.get(key)
    }

    pub fn find(&self, company: &str, position: &str) -> Option<&ApplicationRecord> {
        self.get(&ApplicationKey::new(company, position))
    }

    /// Rows in identity-key order.
    pub fn records(&self) -> impl Iterator<Item = &ApplicationRecord> {
        self.entries.values()
    }

    /// Rows that stand for an application of their own: everything except
    /// partial rows already covered by a complete row.
    pub fn applications(&self) -> impl Iterator<Item = &ApplicationRecord> {
        self.entries
            .iter()
            .filter(move |(key, _)| !self.is_covered(key))
            .map(|(_, record)| record)
    }

    fn is_covered(&self, key: &ApplicationKey) -> bool {
        self.entries.keys().any(|existing| existing.subsumes(key))
    }

    /// Folds `record` into the table, stamping `now` on any row it changes.
    pub fn merge(&mut self, record: ApplicationRecord, now: NaiveDateTime) -> MergeOutcome {
        self.merge_with(record, now, KeyMatching::AllowPartial)
    }

    /// Places a row read back from storage. Only identical keys are combined.
    pub(crate) fn restore(&mut self, record: ApplicationRecord) -> MergeOutcome {
        let stamped = record.updated_at;
        self.merge_with(record, stamped, KeyMatching::Exact)
    }

    fn merge_with(
        &mut self,
        record: ApplicationRecord,
        now: NaiveDateTime,
        matching: KeyMatching,
    ) -> MergeOutcome {
        let key = record.key();
        if matching == KeyMatching::Exact || key.is_blank() {
            return self.merge_exact(key, record, now);
        }

        if key.is_complete() {
            if self.entries.contains_key(&key) {
                return self.merge_exact(key, record, now);
            }
            let seeded = self.seed_from_partials(&key, record, now);
            self.entries.insert(key, seeded);
            return MergeOutcome::Inserted;
        }

        let mut completed_changed = false;
        for (existing, entry) in self.entries.iter_mut() {
            if existing.subsumes(&key) && reconcile_into(entry, &record) {
                entry.updated_at = now;
                completed_changed = true;
            }
        }

        match self.merge_exact(key, record, now) {
            MergeOutcome::Unchanged if completed_changed => MergeOutcome::Updated,
            outcome => outcome,
        }
    }

    fn merge_exact(
        &mut self,
        key: ApplicationKey,
        mut record: ApplicationRecord,
        now: NaiveDateTime,
    ) -> MergeOutcome {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                if reconcile_into(entry, &record) {
                    entry.updated_at = now;
                    MergeOutcome::Updated
                } else {
                    MergeOutcome::Unchanged
                }
            }
            None => {
                record.updated_at = now;
                self.entries.insert(key, record);
                MergeOutcome::Inserted
            }
        }
    }

    /// A new complete row, carrying what its partial rows already learned.
    fn seed_from_partials(
        &self,
        key: &ApplicationKey,
        mut record: ApplicationRecord,
        now: NaiveDateTime,
    ) -> ApplicationRecord {
        for (_, partial) in self
            .entries
            .iter()
            .filter(|(existing, _)| key.subsumes(existing))
        {
            reconcile_into(&mut record, partial);
        }
        record.updated_at = now;
        record
    }
}

/// Applies stage precedence, backfill and newest-email tracking. Returns
/// whether `entry` changed.
fn reconcile_into(entry: &mut ApplicationRecord, incoming: &ApplicationRecord) -> bool {
    let before = entry.clone();

    entry.stage = entry.stage.resolve(incoming.stage);

    if entry.company.trim().is_empty() && !incoming.company.trim().is_empty() {
        entry.company = incoming.company.clone();
    }
    if entry.position.trim().is_empty() && !incoming.position.trim().is_empty() {
        entry.position = incoming.position.clone();
    }

    // Same-day ties go to the larger message id, the order batches are
    // processed in.
    let newest = (entry.last_updated_date, entry.message_id.as_str());
    if (incoming.received_date(), incoming.message_id.as_str()) > newest {
        entry.message_id = incoming.message_id.clone();
        entry.source_subject = incoming.source_subject.clone();
        entry.source_sender = incoming.source_sender.clone();
        entry.last_updated_date = incoming.received_date();
    }
    entry.first_seen_date = entry.first_seen_date.min(incoming.first_seen_date);

    *entry != before
}

impl FromIterator<ApplicationRecord> for ApplicationTable {
    fn from_iter<I: IntoIterator<Item = ApplicationRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.restore(record);
        }
        table
    }
}
