use serde::Serialize;

use super::classifier::PatternMatcher;
use super::domain::{ApplicationRecord, LifecycleStage, RawEmail};
use super::extract::FieldExtractor;

/// Non-fatal signal that part of an email could not be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionWarning {
    MissingCompany,
    MissingPosition,
    Unclassified,
}

impl ExtractionWarning {
    pub const fn label(self) -> &'static str {
        match self {
            Self::MissingCompany => "company not found",
            Self::MissingPosition => "position not found",
            Self::Unclassified => "no lifecycle stage matched",
        }
    }

    pub fn detect(record: &ApplicationRecord) -> Vec<Self> {
        let mut warnings = Vec::new();
        if record.company.trim().is_empty() {
            warnings.push(Self::MissingCompany);
        }
        if record.position.trim().is_empty() {
            warnings.push(Self::MissingPosition);
        }
        if record.stage == LifecycleStage::Unknown {
            warnings.push(Self::Unclassified);
        }
        warnings
    }
}

/// Turns one email into a candidate tracker row.
pub struct RecordBuilder {
    extractor: FieldExtractor,
    matcher: PatternMatcher,
}

impl RecordBuilder {
    pub fn new(extractor: FieldExtractor, matcher: PatternMatcher) -> Self {
        Self { extractor, matcher }
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn extractor(&self) -> &FieldExtractor {
        &self.extractor
    }

    pub fn build(&self, email: &RawEmail) -> ApplicationRecord {
        let fields = self.extractor.extract(email);
        let stage = self.matcher.classify_email(&email.subject, &email.body);
        ApplicationRecord::from_email(email, fields.company, fields.position, stage)
    }

    pub fn build_with_warnings(
        &self,
        email: &RawEmail,
    ) -> (ApplicationRecord, Vec<ExtractionWarning>) {
        let record = self.build(email);
        let warnings = ExtractionWarning::detect(&record);
        (record, warnings)
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new(FieldExtractor::default(), PatternMatcher::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn email(sender: &str, subject: &str, body: &str) -> RawEmail {
        RawEmail {
            message_id: "18c2f0a1".to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            received_date: NaiveDate::from_ymd_opt(2025, 5, 12).expect("valid date"),
        }
    }

    #[test]
    fn build_stamps_email_metadata() {
        let builder = RecordBuilder::default();
        let message = email(
            "Initech Recruiting <jobs@initech.com>",
            "Application for Platform Engineer",
            "We have received your application and will be in touch.",
        );

        let record = builder.build(&message);
        assert_eq!(record.company, "Initech");
        assert_eq!(record.position, "Platform Engineer");
        assert_eq!(record.stage, LifecycleStage::Received);
        assert_eq!(record.first_seen_date, message.received_date);
        assert_eq!(record.last_updated_date, message.received_date);
        assert_eq!(record.message_id, "18c2f0a1");
        assert_eq!(record.source_subject, message.subject);
        assert_eq!(record.source_sender, message.sender);
    }

    #[test]
    fn noise_still_produces_a_record() {
        let builder = RecordBuilder::default();
        let (record, warnings) =
            builder.build_with_warnings(&email("friend@gmail.com", "lunch?", "see you at noon"));

        assert_eq!(record.stage, LifecycleStage::Unknown);
        assert_eq!(record.company, "");
        assert_eq!(
            warnings,
            vec![
                ExtractionWarning::MissingCompany,
                ExtractionWarning::MissingPosition,
                ExtractionWarning::Unclassified,
            ]
        );
    }
}
