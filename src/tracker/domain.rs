use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One message as delivered by the mailbox. Never mutated by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEmail {
    pub message_id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_date: NaiveDate,
}

/// Where an application currently stands, as far as the mailbox can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Offer,
    Rejection,
    Interview,
    Received,
    Unknown,
}

impl LifecycleStage {
    /// All stages, highest precedence first.
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Offer,
            Self::Rejection,
            Self::Interview,
            Self::Received,
            Self::Unknown,
        ]
    }

    /// Tag written to the `Status` column.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Rejection => "rejection",
            Self::Interview => "interview",
            Self::Received => "received",
            Self::Unknown => "unknown",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Offer => "Offer",
            Self::Rejection => "Rejection",
            Self::Interview => "Interview",
            Self::Received => "Received",
            Self::Unknown => "Unknown",
        }
    }

    pub const fn precedence(self) -> u8 {
        match self {
            Self::Offer => 4,
            Self::Rejection => 3,
            Self::Interview => 2,
            Self::Received => 1,
            Self::Unknown => 0,
        }
    }

    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Keeps whichever stage carries more information. Ties keep `self`, so an
    /// equal or less informative incoming stage never replaces the current one.
    pub fn resolve(self, incoming: Self) -> Self {
        if incoming.precedence() > self.precedence() {
            incoming
        } else {
            self
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized lifecycle stage '{0}'")]
pub struct ParseStageError(pub String);

impl FromStr for LifecycleStage {
    type Err = ParseStageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "offer" => Ok(Self::Offer),
            "rejection" => Ok(Self::Rejection),
            "interview" => Ok(Self::Interview),
            // Older trackers wrote the long form.
            "received" | "application_received" => Ok(Self::Received),
            "unknown" | "" => Ok(Self::Unknown),
            other => Err(ParseStageError(other.to_string())),
        }
    }
}

/// Normalized `(company, position)` pair identifying one real-world application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApplicationKey {
    company: String,
    position: String,
}

impl ApplicationKey {
    pub fn new(company: &str, position: &str) -> Self {
        Self {
            company: normalize_name(company),
            position: normalize_name(position),
        }
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn position(&self) -> &str {
        &self.position
    }

    pub fn is_complete(&self) -> bool {
        !self.company.is_empty() && !self.position.is_empty()
    }

    pub fn is_blank(&self) -> bool {
        self.company.is_empty() && self.position.is_empty()
    }

    /// True when `self` fills at least one half that `other` leaves empty and
    /// agrees with `other` everywhere `other` is filled in.
    pub fn subsumes(&self, other: &Self) -> bool {
        if self == other || other.is_blank() {
            return false;
        }

        let company_fits = other.company.is_empty() || other.company == self.company;
        let position_fits = other.position.is_empty() || other.position == self.position;
        company_fits && position_fits
    }
}

impl fmt::Display for ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.company, self.position)
    }
}

pub(crate) fn normalize_name(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

/// A row of the tracker table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationRecord {
    pub company: String,
    pub position: String,
    pub stage: LifecycleStage,
    pub first_seen_date: NaiveDate,
    pub last_updated_date: NaiveDate,
    pub source_subject: String,
    pub source_sender: String,
    pub message_id: String,
    pub updated_at: NaiveDateTime,
}

impl ApplicationRecord {
    /// Record describing a single email, before it has been merged anywhere.
    pub fn from_email(
        email: &RawEmail,
        company: String,
        position: String,
        stage: LifecycleStage,
    ) -> Self {
        Self {
            company,
            position,
            stage,
            first_seen_date: email.received_date,
            last_updated_date: email.received_date,
            source_subject: email.subject.clone(),
            source_sender: email.sender.clone(),
            message_id: email.message_id.clone(),
            updated_at: email.received_date.and_time(NaiveTime::MIN),
        }
    }

    pub fn key(&self) -> ApplicationKey {
        ApplicationKey::new(&self.company, &self.position)
    }

    /// Date of the newest email folded into this record.
    pub fn received_date(&self) -> NaiveDate {
        self.last_updated_date
    }
}
