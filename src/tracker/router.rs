use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use super::pipeline::ScanReport;
use super::service::TrackerService;
use super::summary::ApplicationSummary;
use crate::dates::deserialize_date;
use crate::error::AppError;
use crate::mailbox::Mailbox;

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(deserialize_with = "deserialize_date")]
    pub start_date: NaiveDate,
    #[serde(deserialize_with = "deserialize_date")]
    pub end_date: NaiveDate,
    /// Relative to the configured table's directory.
    #[serde(default)]
    pub table_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableQuery {
    #[serde(default)]
    pub table_path: Option<PathBuf>,
}

/// Router builder exposing scan, summary, and category endpoints.
pub fn application_router<M>(service: Arc<TrackerService<M>>) -> Router
where
    M: Mailbox + 'static,
{
    Router::new()
        .route("/api/v1/applications/scan", post(scan_handler::<M>))
        .route("/api/v1/applications/summary", get(summary_handler::<M>))
        .route(
            "/api/v1/applications/categories",
            get(categories_handler::<M>),
        )
        .with_state(service)
}

fn confined<M>(
    service: &TrackerService<M>,
    requested: Option<PathBuf>,
) -> Result<Option<PathBuf>, AppError>
where
    M: Mailbox + 'static,
{
    Ok(requested
        .map(|path| service.confine_table_path(&path))
        .transpose()?)
}

pub(crate) async fn scan_handler<M>(
    State(service): State<Arc<TrackerService<M>>>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanReport>, AppError>
where
    M: Mailbox + 'static,
{
    let table_path = confined(&service, request.table_path)?;
    let report = service
        .scan(request.start_date, request.end_date, table_path)
        .await?;
    Ok(Json(report))
}

pub(crate) async fn summary_handler<M>(
    State(service): State<Arc<TrackerService<M>>>,
    Query(query): Query<TableQuery>,
) -> Result<Json<ApplicationSummary>, AppError>
where
    M: Mailbox + 'static,
{
    let table_path = confined(&service, query.table_path)?;
    Ok(Json(service.summary(table_path)?))
}

pub(crate) async fn categories_handler<M>(
    State(service): State<Arc<TrackerService<M>>>,
) -> Json<Value>
where
    M: Mailbox + 'static,
{
    Json(json!({ "categories": service.categories() }))
}
