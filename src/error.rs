use crate::config::ConfigError;
use crate::mailbox::MailboxError;
use crate::telemetry::TelemetryError;
use crate::tracker::{ScanError, StoreError, TablePathError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use tracing::error;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Scan(ScanError),
    Store(StoreError),
    TablePath(TablePathError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Scan(err) => write!(f, "scan error: {}", err),
            AppError::Store(err) => write!(f, "storage error: {}", err),
            AppError::TablePath(err) => write!(f, "invalid request: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Scan(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::TablePath(err) => Some(err),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Scan(ScanError::InvalidRange { .. }) | AppError::TablePath(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Scan(ScanError::Mailbox(MailboxError::Auth(_))) => StatusCode::UNAUTHORIZED,
            AppError::Scan(ScanError::Mailbox(_)) => StatusCode::BAD_GATEWAY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Scan(_)
            | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<TablePathError> for AppError {
    fn from(value: TablePathError) -> Self {
        Self::TablePath(value)
    }
}

impl From<ScanError> for AppError {
    fn from(value: ScanError) -> Self {
        Self::Scan(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
