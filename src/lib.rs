//! Classifies job-application emails and keeps a deduplicated tracker table.

pub mod config;
pub mod dates;
pub mod error;
pub mod mailbox;
pub mod telemetry;
pub mod tracker;

mod cli;
mod routes;
mod server;

use error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
