//! Mail sources feeding the tracker.
//!
//! A [`Mailbox`] answers one [`SearchQuery`] with a finite batch of
//! [`RawEmail`]s in whatever order the source prefers. Callers re-sort.

mod gmail;

pub use gmail::GmailExportMailbox;

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::NaiveDate;

use crate::tracker::RawEmail;

/// Phrases that make a message worth looking at.
pub const DEFAULT_SEARCH_TERMS: [&str; 8] = [
    "thanks for applying",
    "application received",
    "thank you for your interest",
    "unfortunately",
    "interview",
    "job offer",
    "application confirmation",
    "we have received your application",
];

pub const DEFAULT_MAX_RESULTS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("mailbox rejected credentials: {0}")]
    Auth(String),
    #[error("failed to read mailbox export {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("mailbox export {path} is not valid: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("mailbox request failed with status {status}: {message}")]
    Api { status: u16, message: String },
}

pub trait Mailbox: Send + Sync {
    type Messages: Iterator<Item = RawEmail>;

    fn search(&self, query: &SearchQuery) -> Result<Self::Messages, MailboxError>;
}

/// Date window plus phrase filter. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub terms: Vec<String>,
    pub max_results: usize,
}

impl SearchQuery {
    pub fn job_applications(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            terms: DEFAULT_SEARCH_TERMS.iter().map(|term| term.to_string()).collect(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn is_valid_range(&self) -> bool {
        self.start < self.end
    }

    /// Gmail search syntax for this query.
    pub fn render(&self) -> String {
        let terms = self
            .terms
            .iter()
            .map(|term| format!("\"{term}\""))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!(
            "({terms}) after:{} before:{}",
            self.start.format("%Y/%m/%d"),
            self.end.format("%Y/%m/%d")
        )
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Any term appears in the subject or body, ignoring case. No terms
    /// means everything matches.
    pub fn matches_text(&self, subject: &str, body: &str) -> bool {
        if self.terms.is_empty() {
            return true;
        }
        let haystack = format!("{subject}\n{body}").to_lowercase();
        self.terms
            .iter()
            .any(|term| haystack.contains(&term.to_lowercase()))
    }

    pub fn matches(&self, email: &RawEmail) -> bool {
        self.covers(email.received_date) && self.matches_text(&email.subject, &email.body)
    }
}

/// Fixed set of messages, filtered per query. Handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct StaticMailbox {
    messages: Vec<RawEmail>,
    rejection: Mutex<Option<String>>,
}

impl StaticMailbox {
    pub fn new(messages: Vec<RawEmail>) -> Self {
        Self {
            messages,
            rejection: Mutex::new(None),
        }
    }

    /// Makes every later search fail with [`MailboxError::Auth`].
    pub fn revoke(&self, reason: &str) {
        let mut guard = self
            .rejection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(reason.to_string());
    }
}

impl Mailbox for StaticMailbox {
    type Messages = std::vec::IntoIter<RawEmail>;

    fn search(&self, query: &SearchQuery) -> Result<Self::Messages, MailboxError> {
        let rejection = self
            .rejection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(reason) = rejection {
            return Err(MailboxError::Auth(reason));
        }

        let hits = self
            .messages
            .iter()
            .filter(|email| query.matches(email))
            .take(query.max_results)
            .cloned()
            .collect::<Vec<_>>();
        Ok(hits.into_iter())
    }
}
