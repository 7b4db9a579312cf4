use serde::Serialize;

use super::domain::{ApplicationRecord, LifecycleStage};
use super::reconcile::ApplicationTable;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageCount {
    pub stage: LifecycleStage,
    pub label: &'static str,
    pub count: usize,
    pub percentage: f64,
}

/// Read-only tally of the tracker table by lifecycle stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationSummary {
    pub total_applications: usize,
    pub stages: Vec<StageCount>,
}

impl ApplicationSummary {
    pub fn from_table(table: &ApplicationTable) -> Self {
        Self::from_records(table.applications())
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ApplicationRecord>,
    {
        let mut counts = [0usize; 5];
        let order = LifecycleStage::ordered();
        for record in records {
            if let Some(slot) = order.iter().position(|stage| *stage == record.stage) {
                counts[slot] += 1;
            }
        }

        let total_applications = counts.iter().sum();
        let stages = order
            .iter()
            .zip(counts)
            .map(|(stage, count)| StageCount {
                stage: *stage,
                label: stage.label(),
                count,
                percentage: percentage(count, total_applications),
            })
            .collect();

        Self {
            total_applications,
            stages,
        }
    }

    pub fn count(&self, stage: LifecycleStage) -> usize {
        self.stages
            .iter()
            .find(|entry| entry.stage == stage)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    pub fn render_text(&self) -> String {
        if self.total_applications == 0 {
            return "No job applications tracked yet.".to_string();
        }

        let mut lines = vec![format!(
            "Application Summary (Total: {}):",
            self.total_applications
        )];
        lines.push(String::new());
        for entry in self.stages.iter().filter(|entry| entry.count > 0) {
            lines.push(format!(
                "• {}: {} ({:.1}%)",
                entry.label, entry.count, entry.percentage
            ));
        }
        lines.join("\n")
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = count as f64 * 100.0 / total as f64;
    (raw * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(company: &str, stage: LifecycleStage) -> ApplicationRecord {
        let date = NaiveDate::from_ymd_opt(2025, 4, 2).expect("valid date");
        ApplicationRecord {
            company: company.to_string(),
            position: "Engineer".to_string(),
            stage,
            first_seen_date: date,
            last_updated_date: date,
            source_subject: String::new(),
            source_sender: String::new(),
            message_id: company.to_string(),
            updated_at: date.and_hms_opt(0, 0, 0).expect("valid time"),
        }
    }

    #[test]
    fn counts_every_stage_including_zeroes() {
        let rows = vec![
            row("a", LifecycleStage::Received),
            row("b", LifecycleStage::Received),
            row("c", LifecycleStage::Interview),
        ];
        let summary = ApplicationSummary::from_records(&rows);

        assert_eq!(summary.total_applications, 3);
        assert_eq!(summary.stages.len(), 5);
        assert_eq!(summary.count(LifecycleStage::Received), 2);
        assert_eq!(summary.count(LifecycleStage::Offer), 0);
        assert_eq!(summary.stages[0].stage, LifecycleStage::Offer);
        assert_eq!(summary.stages[3].percentage, 66.7);
    }

    #[test]
    fn text_lists_non_empty_stages() {
        let rows = vec![
            row("a", LifecycleStage::Offer),
            row("b", LifecycleStage::Rejection),
        ];
        let text = ApplicationSummary::from_records(&rows).render_text();

        assert!(text.starts_with("Application Summary (Total: 2):"));
        assert!(text.contains("• Offer: 1 (50.0%)"));
        assert!(text.contains("• Rejection: 1 (50.0%)"));
        assert!(!text.contains("Interview"));
    }

    #[test]
    fn empty_table_has_zero_percentages() {
        let summary = ApplicationSummary::from_table(&ApplicationTable::new());
        assert_eq!(summary.total_applications, 0);
        assert!(summary.stages.iter().all(|entry| entry.percentage == 0.0));
        assert_eq!(summary.render_text(), "No job applications tracked yet.");
    }

    #[test]
    fn partial_rows_covered_by_a_complete_row_are_not_counted_twice() {
        let stamp = NaiveDate::from_ymd_opt(2025, 4, 3)
            .and_then(|date| date.and_hms_opt(8, 0, 0))
            .expect("valid time");
        let mut partial = row("", LifecycleStage::Interview);
        partial.message_id = "p".to_string();
        let mut table = ApplicationTable::new();
        table.merge(partial, stamp);
        table.merge(row("Acme", LifecycleStage::Received), stamp);
        table.merge(row("Initech", LifecycleStage::Received), stamp);

        assert_eq!(table.len(), 3);
        let summary = ApplicationSummary::from_table(&table);
        assert_eq!(summary.total_applications, 2);
        assert_eq!(summary.count(LifecycleStage::Interview), 2);
    }
}
