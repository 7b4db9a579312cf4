//! CSV persistence for the tracker table.
//!
//! Files are read wholesale and written wholesale. Writes go to a hidden
//! sibling file first and are renamed over the target, so a failed save
//! leaves the previous table in place.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{ApplicationRecord, LifecycleStage};
use super::reconcile::{ApplicationTable, MergeOutcome};

pub const TABLE_HEADERS: [&str; 8] = [
    "Company",
    "Position",
    "Status",
    "Date",
    "Subject",
    "Sender",
    "Message ID",
    "Last Updated",
];

const DATE_FORMAT: &str = "%Y-%m-%d";
const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read application table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("application table {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("failed to write application table {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub fn path(&self) -> &Path {
        match self {
            StoreError::Read { path, .. }
            | StoreError::Corrupt { path, .. }
            | StoreError::Write { path, .. } => path,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TableRow {
    #[serde(rename = "Company")]
    company: String,
    #[serde(rename = "Position")]
    position: String,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Subject")]
    subject: String,
    #[serde(rename = "Sender")]
    sender: String,
    #[serde(rename = "Message ID")]
    message_id: String,
    #[serde(rename = "Last Updated")]
    last_updated: String,
}

impl TableRow {
    fn from_record(record: &ApplicationRecord) -> Self {
        Self {
            company: record.company.clone(),
            position: record.position.clone(),
            status: record.stage.tag().to_string(),
            date: format_date_span(record.first_seen_date, record.last_updated_date),
            subject: record.source_subject.clone(),
            sender: record.source_sender.clone(),
            message_id: record.message_id.clone(),
            last_updated: record.updated_at.format(LAST_UPDATED_FORMAT).to_string(),
        }
    }

    fn into_record(self) -> Result<ApplicationRecord, String> {
        let stage = self
            .status
            .parse::<LifecycleStage>()
            .map_err(|err| err.to_string())?;
        let (first_seen_date, last_updated_date) = parse_date_span(&self.date)?;
        let updated_at =
            NaiveDateTime::parse_from_str(self.last_updated.trim(), LAST_UPDATED_FORMAT)
                .map_err(|err| format!("invalid Last Updated '{}': {err}", self.last_updated))?;

        Ok(ApplicationRecord {
            company: self.company,
            position: self.position,
            stage,
            first_seen_date,
            last_updated_date,
            source_subject: self.subject,
            source_sender: self.sender,
            message_id: self.message_id,
            updated_at,
        })
    }
}

/// `first` alone when both dates agree, otherwise an ISO-8601 interval.
fn format_date_span(first: NaiveDate, last: NaiveDate) -> String {
    if first == last {
        first.format(DATE_FORMAT).to_string()
    } else {
        format!("{}/{}", first.format(DATE_FORMAT), last.format(DATE_FORMAT))
    }
}

fn parse_date_span(value: &str) -> Result<(NaiveDate, NaiveDate), String> {
    let parse = |raw: &str| {
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map_err(|err| format!("invalid Date '{value}': {err}"))
    };

    match value.split_once('/') {
        Some((first, last)) => {
            let first = parse(first)?;
            let last = parse(last)?;
            if last < first {
                return Err(format!("Date interval '{value}' ends before it starts"));
            }
            Ok((first, last))
        }
        None => {
            let date = parse(value)?;
            Ok((date, date))
        }
    }
}

/// Reads and writes the tracker table at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableGateway {
    path: PathBuf,
}

impl TableGateway {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the whole table; a missing file is an empty table.
    pub fn load(&self) -> Result<ApplicationTable, StoreError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no application table yet; starting empty");
                return Ok(ApplicationTable::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let table = read_table(file, &self.path)?;
        info!(path = %self.path.display(), rows = table.len(), "loaded application table");
        Ok(table)
    }

    /// Replaces the stored table with `table`, all or nothing.
    pub fn save(&self, table: &ApplicationTable) -> Result<(), StoreError> {
        let mut buffer = Vec::new();
        write_table(&mut buffer, table).map_err(|source| self.write_error(source))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.write_error(source))?;
        }

        let staging = self.staging_path();
        fs::write(&staging, &buffer).map_err(|source| self.write_error(source))?;
        if let Err(source) = fs::rename(&staging, &self.path) {
            if let Err(cleanup) = fs::remove_file(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "could not remove staging file");
            }
            return Err(self.write_error(source));
        }

        info!(path = %self.path.display(), rows = table.len(), "saved application table");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "applications.csv".to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

/// Parses a table from any CSV source. `origin` only labels errors.
pub fn read_table<R: Read>(reader: R, origin: &Path) -> Result<ApplicationTable, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: origin.to_path_buf(),
        reason,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|err| read_failure(err, origin))?
        .clone();
    if headers.is_empty() {
        return Ok(ApplicationTable::new());
    }
    if headers.iter().ne(TABLE_HEADERS.iter().copied()) {
        return Err(corrupt(format!(
            "expected columns {:?}, found {:?}",
            TABLE_HEADERS,
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let mut table = ApplicationTable::new();
    for (index, row) in csv_reader.deserialize::<TableRow>().enumerate() {
        let line = index + 2;
        let row = row.map_err(|err| read_failure(err, origin))?;
        let record = row
            .into_record()
            .map_err(|reason| corrupt(format!("line {line}: {reason}")))?;
        if table.restore(record) != MergeOutcome::Inserted {
            warn!(line, "duplicate application row folded into an earlier row");
        }
    }

    Ok(table)
}

/// Serializes the table with the fixed column order, rows in key order.
pub fn write_table<W: Write>(writer: W, table: &ApplicationTable) -> io::Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(TABLE_HEADERS).map_err(into_io)?;
    for record in table.records() {
        csv_writer
            .serialize(TableRow::from_record(record))
            .map_err(into_io)?;
    }
    csv_writer.flush()
}

fn read_failure(err: csv::Error, origin: &Path) -> StoreError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(source) = err.into_kind() {
            return StoreError::Read {
                path: origin.to_path_buf(),
                source,
            };
        }
        return StoreError::Corrupt {
            path: origin.to_path_buf(),
            reason: "unreadable CSV data".to_string(),
        };
    }

    StoreError::Corrupt {
        path: origin.to_path_buf(),
        reason: err.to_string(),
    }
}

fn into_io(err: csv::Error) -> io::Error {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => source,
        other => io::Error::new(io::ErrorKind::InvalidData, format!("{other:?}")),
    }
}
