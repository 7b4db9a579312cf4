//! Job-application tracking: classify emails, extract fields, and reconcile
//! them into a deduplicated table.

pub mod builder;
pub mod classifier;
pub mod domain;
pub mod extract;
pub mod pipeline;
pub mod reconcile;
pub mod router;
pub mod service;
pub mod summary;
pub mod table;

pub use builder::{ExtractionWarning, RecordBuilder};
pub use classifier::{ClassifierError, PatternMatcher};
pub use domain::{ApplicationKey, ApplicationRecord, LifecycleStage, ParseStageError, RawEmail};
pub use extract::{ExtractedFields, ExtractorConfig, FieldExtractor, SenderAddress};
pub use pipeline::{NoisePolicy, ScanError, ScanPipeline, ScanReport};
pub use reconcile::{ApplicationTable, MergeOutcome};
pub use router::application_router;
pub use service::{TablePathError, TrackerService};
pub use summary::{ApplicationSummary, StageCount};
pub use table::{StoreError, TableGateway, TABLE_HEADERS};
