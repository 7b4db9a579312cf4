use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{Mailbox, MailboxError, SearchQuery};
use crate::tracker::RawEmail;

/// Mailbox backed by a saved batch of Gmail `users.messages.get?format=full`
/// responses. The file is re-read on every search.
#[derive(Debug, Clone)]
pub struct GmailExportMailbox {
    path: PathBuf,
    fallback_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportDocument {
    Messages(Vec<GmailMessage>),
    Failure { error: ApiFailure },
    Wrapped { messages: Vec<GmailMessage> },
}

#[derive(Debug, Deserialize)]
struct ApiFailure {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

impl GmailExportMailbox {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            fallback_date: None,
        }
    }

    /// Date assigned to messages whose date cannot be read. Defaults to
    /// today's local date.
    pub fn with_fallback_date(mut self, date: NaiveDate) -> Self {
        self.fallback_date = Some(date);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_messages(&self) -> Result<Vec<GmailMessage>, MailboxError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| MailboxError::Io {
            path: self.path.clone(),
            source,
        })?;
        let document: ExportDocument =
            serde_json::from_str(&raw).map_err(|source| MailboxError::Decode {
                path: self.path.clone(),
                source,
            })?;

        match document {
            ExportDocument::Messages(messages) | ExportDocument::Wrapped { messages } => {
                Ok(messages)
            }
            ExportDocument::Failure { error } if matches!(error.code, 401 | 403) => {
                Err(MailboxError::Auth(error.message))
            }
            ExportDocument::Failure { error } => Err(MailboxError::Api {
                status: error.code,
                message: error.message,
            }),
        }
    }

    fn to_raw_email(&self, message: GmailMessage) -> RawEmail {
        let payload = message.payload.unwrap_or_default();
        let sender = payload.header("From").unwrap_or_default().to_string();
        let subject = payload.header("Subject").unwrap_or_default().to_string();
        let body = payload
            .body_text("text/plain")
            .or_else(|| payload.body_text("text/html"))
            .unwrap_or(message.snippet);

        let received_date = payload
            .header("Date")
            .and_then(parse_header_date)
            .or_else(|| message.internal_date.as_deref().and_then(parse_internal_date))
            .unwrap_or_else(|| {
                let fallback = self
                    .fallback_date
                    .unwrap_or_else(|| Local::now().date_naive());
                warn!(
                    message_id = %message.id,
                    %fallback,
                    "message date unreadable; using fallback"
                );
                fallback
            });

        RawEmail {
            message_id: message.id,
            sender,
            subject,
            body,
            received_date,
        }
    }
}

impl Mailbox for GmailExportMailbox {
    type Messages = std::vec::IntoIter<RawEmail>;

    fn search(&self, query: &SearchQuery) -> Result<Self::Messages, MailboxError> {
        debug!(query = %query.render(), path = %self.path.display(), "searching mailbox export");
        let messages = self.read_messages()?;
        let available = messages.len();

        let hits = messages
            .into_iter()
            .map(|message| self.to_raw_email(message))
            .filter(|email| query.matches(email))
            .take(query.max_results)
            .collect::<Vec<_>>();

        info!(available, matched = hits.len(), "mailbox search finished");
        Ok(hits.into_iter())
    }
}

impl MessagePart {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    /// First decodable body of `mime_type`, depth first.
    fn body_text(&self, mime_type: &str) -> Option<String> {
        if self.mime_type.eq_ignore_ascii_case(mime_type) {
            if let Some(text) = self
                .body
                .as_ref()
                .and_then(|body| body.data.as_deref())
                .and_then(decode_body)
            {
                return Some(text);
            }
        }
        self.parts.iter().find_map(|part| part.body_text(mime_type))
    }
}

/// Gmail bodies are URL-safe base64; padding is optional.
fn decode_body(data: &str) -> Option<String> {
    let trimmed = data.trim().trim_end_matches('=');
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_header_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    // Drop trailing zone comments such as "(UTC)" or "(PDT)".
    let without_comment = match value.rfind('(') {
        Some(index) if value.ends_with(')') => value[..index].trim_end(),
        _ => value,
    };

    DateTime::parse_from_rfc2822(without_comment)
        .or_else(|_| DateTime::parse_from_rfc3339(without_comment))
        .map(|stamp| stamp.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(without_comment, "%Y-%m-%d").ok())
}

fn parse_internal_date(millis: &str) -> Option<NaiveDate> {
    let millis = millis.trim().parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|stamp| stamp.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    fn write_export(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write export");
        file
    }

    fn window() -> SearchQuery {
        SearchQuery::job_applications(
            NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"),
            NaiveDate::from_ymd_opt(2025, 4, 1).expect("valid date"),
        )
    }

    #[test]
    fn parses_header_dates_in_common_shapes() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date");
        assert_eq!(
            parse_header_date("Fri, 14 Mar 2025 09:12:44 -0700 (PDT)"),
            Some(expected)
        );
        assert_eq!(parse_header_date("2025-03-14T09:12:44Z"), Some(expected));
        assert_eq!(parse_header_date("2025-03-14"), Some(expected));
        assert_eq!(parse_header_date("sometime last week"), None);
    }

    #[test]
    fn prefers_plain_text_over_html() {
        let document = format!(
            r#"[{{
                "id": "m-1",
                "payload": {{
                    "mimeType": "multipart/alternative",
                    "headers": [
                        {{"name": "From", "value": "Acme Talent <jobs@acme.com>"}},
                        {{"name": "Subject", "value": "Interview for Data Engineer"}},
                        {{"name": "Date", "value": "Mon, 10 Mar 2025 08:00:00 +0000"}}
                    ],
                    "parts": [
                        {{"mimeType": "text/html", "body": {{"data": "{html}"}}}},
                        {{"mimeType": "text/plain", "body": {{"data": "{plain}"}}}}
                    ]
                }}
            }}]"#,
            html = encode("<p>html body</p>"),
            plain = encode("We would like to schedule an interview."),
        );
        let file = write_export(&document);
        let mailbox = GmailExportMailbox::new(file.path());

        let hits: Vec<_> = mailbox.search(&window()).expect("search succeeds").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, "m-1");
        assert_eq!(hits[0].sender, "Acme Talent <jobs@acme.com>");
        assert_eq!(hits[0].body, "We would like to schedule an interview.");
        assert_eq!(
            hits[0].received_date,
            NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
        );
    }

    #[test]
    fn unreadable_date_falls_back() {
        let fallback = NaiveDate::from_ymd_opt(2025, 3, 20).expect("valid date");
        let file = write_export(
            r#"{"messages": [{
                "id": "m-2",
                "snippet": "Thanks for applying to Initech",
                "payload": {"headers": [{"name": "Subject", "value": "Thanks for applying"}]}
            }]}"#,
        );
        let mailbox = GmailExportMailbox::new(file.path()).with_fallback_date(fallback);

        let hits: Vec<_> = mailbox.search(&window()).expect("search succeeds").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].received_date, fallback);
        assert_eq!(hits[0].body, "Thanks for applying to Initech");
    }

    #[test]
    fn auth_failures_are_distinguished() {
        let file = write_export(r#"{"error": {"code": 401, "message": "Invalid Credentials"}}"#);
        let mailbox = GmailExportMailbox::new(file.path());
        assert!(matches!(
            mailbox.search(&window()),
            Err(MailboxError::Auth(message)) if message == "Invalid Credentials"
        ));

        let file = write_export(r#"{"error": {"code": 500, "message": "Backend Error"}}"#);
        let mailbox = GmailExportMailbox::new(file.path());
        assert!(matches!(
            mailbox.search(&window()),
            Err(MailboxError::Api { status: 500, .. })
        ));
    }

    #[test]
    fn missing_and_malformed_exports_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mailbox = GmailExportMailbox::new(dir.path().join("absent.json"));
        assert!(matches!(
            mailbox.search(&window()),
            Err(MailboxError::Io { .. })
        ));

        let file = write_export("{ not json");
        let mailbox = GmailExportMailbox::new(file.path());
        assert!(matches!(
            mailbox.search(&window()),
            Err(MailboxError::Decode { .. })
        ));
    }
}
