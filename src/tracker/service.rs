use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use tokio::sync::Mutex;
use tokio::task;
use tracing::{info, warn};

use super::domain::LifecycleStage;
use super::pipeline::{ScanError, ScanPipeline, ScanReport};
use super::summary::ApplicationSummary;
use super::table::{StoreError, TableGateway};
use crate::mailbox::{Mailbox, SearchQuery};

/// A caller-supplied table path that would leave the table directory.
#[derive(Debug, thiserror::Error)]
#[error("table path '{}' must be a relative path inside the table directory", .path.display())]
pub struct TablePathError {
    pub path: PathBuf,
}

/// Service composing a mailbox, the scan pipeline, and the default table.
pub struct TrackerService<M> {
    mailbox: Arc<M>,
    pipeline: Arc<ScanPipeline>,
    table_path: PathBuf,
    max_results: usize,
    scan_lock: Mutex<()>,
}

impl<M> TrackerService<M>
where
    M: Mailbox + 'static,
{
    pub fn new(
        mailbox: Arc<M>,
        pipeline: ScanPipeline,
        table_path: PathBuf,
        max_results: usize,
    ) -> Self {
        Self {
            mailbox,
            pipeline: Arc::new(pipeline),
            table_path,
            max_results,
            scan_lock: Mutex::new(()),
        }
    }

    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    /// Maps a table name from an untrusted caller into the directory of the
    /// default table. Absolute paths and `..` are refused.
    pub fn confine_table_path(&self, requested: &Path) -> Result<PathBuf, TablePathError> {
        let plain = requested
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !plain || requested.file_name().is_none() {
            warn!(path = %requested.display(), "refusing table path outside the table directory");
            return Err(TablePathError {
                path: requested.to_path_buf(),
            });
        }

        let base = self.table_path.parent().unwrap_or_else(|| Path::new(""));
        Ok(base.join(requested))
    }

    fn gateway(&self, table_path: Option<PathBuf>) -> TableGateway {
        TableGateway::new(table_path.unwrap_or_else(|| self.table_path.clone()))
    }

    /// Scan `[start, end)` into the table, stamping rows with the local time.
    pub async fn scan(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        table_path: Option<PathBuf>,
    ) -> Result<ScanReport, ScanError> {
        self.scan_at(start, end, table_path, Local::now().naive_local())
            .await
    }

    /// Batches never overlap within one service. The batch itself does blocking
    /// file I/O, so it runs on the blocking pool.
    pub async fn scan_at(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        table_path: Option<PathBuf>,
        now: NaiveDateTime,
    ) -> Result<ScanReport, ScanError> {
        let _guard = self.scan_lock.lock().await;
        let gateway = self.gateway(table_path);
        let query = SearchQuery::job_applications(start, end).with_max_results(self.max_results);

        info!(%start, %end, table = %gateway.path().display(), "starting scan");
        let mailbox = Arc::clone(&self.mailbox);
        let pipeline = Arc::clone(&self.pipeline);
        task::spawn_blocking(move || pipeline.run(mailbox.as_ref(), &gateway, &query, now)).await?
    }

    pub fn summary(&self, table_path: Option<PathBuf>) -> Result<ApplicationSummary, StoreError> {
        let table = self.gateway(table_path).load()?;
        Ok(ApplicationSummary::from_table(&table))
    }

    pub fn categories(&self) -> Vec<LifecycleStage> {
        self.pipeline.builder().matcher().categories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{MailboxError, StaticMailbox};
    use crate::tracker::RawEmail;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Blocks inside `search` until the test opens the gate.
    struct GatedMailbox {
        gate: std::sync::Mutex<mpsc::Receiver<()>>,
    }

    impl Mailbox for GatedMailbox {
        type Messages = std::vec::IntoIter<RawEmail>;

        fn search(&self, _query: &SearchQuery) -> Result<Self::Messages, MailboxError> {
            let gate = self
                .gate
                .lock()
                .map_err(|_| MailboxError::Auth("gate poisoned".to_string()))?;
            gate.recv_timeout(Duration::from_secs(5))
                .map_err(|_| MailboxError::Auth("gate never opened".to_string()))?;
            Ok(Vec::new().into_iter())
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).expect("valid date")
    }

    fn service(dir: &tempfile::TempDir, messages: Vec<RawEmail>) -> TrackerService<StaticMailbox> {
        TrackerService::new(
            Arc::new(StaticMailbox::new(messages)),
            ScanPipeline::default(),
            dir.path().join("applications.csv"),
            100,
        )
    }

    #[tokio::test]
    async fn scan_then_summary_reflects_latest_stage() {
        let dir = tempfile::tempdir().expect("temp dir");
        let messages = vec![
            RawEmail {
                message_id: "m1".to_string(),
                sender: "Hooli Recruiting <jobs@hooli.com>".to_string(),
                subject: "Thanks for applying: Product Designer".to_string(),
                body: "Your application for Product Designer was received.".to_string(),
                received_date: date(2),
            },
            RawEmail {
                message_id: "m2".to_string(),
                sender: "Hooli Recruiting <jobs@hooli.com>".to_string(),
                subject: "Next steps for Product Designer".to_string(),
                body: "We would like to schedule an interview for your application \
                       for Product Designer."
                    .to_string(),
                received_date: date(6),
            },
        ];
        let service = service(&dir, messages);

        let report = service
            .scan(date(1), date(10), None)
            .await
            .expect("scan succeeds");
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(report.rows_updated, 1);

        let summary = service.summary(None).expect("summary loads");
        assert_eq!(summary.total_applications, 1);
        assert_eq!(summary.count(LifecycleStage::Interview), 1);
    }

    #[tokio::test]
    async fn summary_of_missing_table_is_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let service = service(&dir, Vec::new());
        let summary = service
            .summary(Some(dir.path().join("nothing-here.csv")))
            .expect("missing table reads as empty");
        assert_eq!(summary.total_applications, 0);
        assert_eq!(service.categories().len(), 4);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn scan_leaves_the_runtime_free_while_the_mailbox_blocks() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (open, gate) = mpsc::channel();
        let service = TrackerService::new(
            Arc::new(GatedMailbox {
                gate: std::sync::Mutex::new(gate),
            }),
            ScanPipeline::default(),
            dir.path().join("applications.csv"),
            100,
        );

        let opener = async {
            tokio::task::yield_now().await;
            open.send(()).expect("gate receiver alive");
        };
        let (report, ()) = tokio::join!(service.scan(date(1), date(10), None), opener);

        let report = report.expect("scan finishes once the gate opens");
        assert!(!report.saved);
    }

    #[test]
    fn confines_requested_tables_to_the_table_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let service = service(&dir, Vec::new());

        assert_eq!(
            service
                .confine_table_path(Path::new("archive/2024.csv"))
                .expect("nested name allowed"),
            dir.path().join("archive/2024.csv")
        );
        for rejected in ["/etc/passwd", "../escape.csv", "archive/../../x.csv", "", "."] {
            assert!(
                service.confine_table_path(Path::new(rejected)).is_err(),
                "{rejected:?} accepted"
            );
        }
    }
}
