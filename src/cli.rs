use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, TrackerConfig};
use crate::dates::parse_date;
use crate::error::AppError;
use crate::mailbox::GmailExportMailbox;
use crate::server;
use crate::telemetry;
use crate::tracker::{NoisePolicy, RecordBuilder, ScanPipeline, TrackerService};

#[derive(Parser, Debug)]
#[command(
    name = "job-tracker",
    about = "Track job applications from mailbox messages",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Scan the mailbox for a date range and update the tracker table
    Scan(ScanArgs),
    /// Print counts per application stage
    Summary(SummaryArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    start_date: NaiveDate,
    /// Day after the last one to include (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    end_date: NaiveDate,
    /// Tracker table to update instead of the configured one
    #[arg(long)]
    table: Option<PathBuf>,
    /// Gmail export to read instead of the configured one
    #[arg(long)]
    mailbox: Option<PathBuf>,
    /// Keep emails with neither a company nor a recognized stage
    #[arg(long)]
    keep_unidentified: bool,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SummaryArgs {
    /// Tracker table to read instead of the configured one
    #[arg(long)]
    table: Option<PathBuf>,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Scan(args) => run_scan(args).await,
        Command::Summary(args) => run_summary(args),
    }
}

pub(crate) fn tracker_service(tracker: &TrackerConfig) -> TrackerService<GmailExportMailbox> {
    let pipeline = ScanPipeline::new(
        RecordBuilder::default(),
        NoisePolicy::from_keep_flag(tracker.keep_unidentified),
    );
    TrackerService::new(
        Arc::new(GmailExportMailbox::new(tracker.mailbox_path.clone())),
        pipeline,
        tracker.table_path.clone(),
        tracker.max_results,
    )
}

async fn run_scan(args: ScanArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let mut tracker = config.tracker;
    if let Some(mailbox) = args.mailbox {
        tracker.mailbox_path = mailbox;
    }
    tracker.keep_unidentified |= args.keep_unidentified;

    let service = tracker_service(&tracker);
    let report = service
        .scan_at(
            args.start_date,
            args.end_date,
            args.table,
            Local::now().naive_local(),
        )
        .await?;

    if args.json {
        print_json(&report)?;
    } else {
        println!("{}", report.render_text());
    }
    Ok(())
}

fn run_summary(args: SummaryArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let service = tracker_service(&config.tracker);
    let summary = service.summary(args.table)?;

    if args.json {
        print_json(&summary)?;
    } else {
        println!("{}", summary.render_text());
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err)))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_requires_both_dates() {
        let parsed = Cli::try_parse_from([
            "job-tracker",
            "scan",
            "--start-date",
            "2025-01-01",
            "--end-date",
            "2025-02-01",
            "--table",
            "out.csv",
        ])
        .expect("arguments parse");
        match parsed.command {
            Some(Command::Scan(args)) => {
                assert_eq!(
                    args.start_date,
                    NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
                );
                assert_eq!(args.table, Some(PathBuf::from("out.csv")));
                assert!(!args.json);
            }
            other => panic!("expected scan command, got {other:?}"),
        }

        assert!(
            Cli::try_parse_from(["job-tracker", "scan", "--start-date", "2025-01-01"]).is_err()
        );
        assert!(Cli::try_parse_from([
            "job-tracker",
            "scan",
            "--start-date",
            "January",
            "--end-date",
            "2025-02-01"
        ])
        .is_err());
    }

    #[test]
    fn no_subcommand_means_serve() {
        let parsed = Cli::try_parse_from(["job-tracker"]).expect("arguments parse");
        assert!(parsed.command.is_none());
    }
}
