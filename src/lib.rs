//! Bulk spreadsheet-to-mailing-list synchronization.
//!
//! `listpush` takes a tabular batch of records and synchronizes them into
//! one or more remote mailing lists through the Mailchimp marketing API's
//! batch endpoint. The core is the bulk upsert orchestrator, which:
//!
//! - Validates records and partitions them into bounded chunks
//! - Submits each chunk as an asynchronous batch job
//! - Polls each job to a terminal state with a bounded attempt budget
//! - Retries chunk-level failures with backoff
//! - Recovers duplicate-key rejections through targeted member updates
//! - Returns a per-target success/failure report and hands per-record
//!   outcomes to an audit sink for durable logging
//!
//! File parsing and presentation live outside this crate; it consumes
//! pre-parsed [`RawRecord`]s and emits structured progress events.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use listpush::{CsvAuditSink, MailchimpClient, SyncConfig, SyncOrchestrator, TracingSink};
//!
//! let config: SyncConfig = serde_json::from_str(&std::fs::read_to_string("sync.json")?)?;
//! let client = Arc::new(MailchimpClient::from_config(&config)?);
//! let audit = Arc::new(CsvAuditSink::new("audit"));
//!
//! let orchestrator = SyncOrchestrator::new(config, client, audit)?
//!     .with_progress(Arc::new(TracingSink));
//!
//! let report = orchestrator.run(&records).await;
//! for (target, totals) in &report.totals {
//!     println!("{}: {} added, {} failed", target, totals.success, totals.failed);
//! }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod mailchimp;
pub mod record;
pub mod sync;

pub use audit::{AuditRow, AuditSink, CsvAuditSink};
pub use config::{FieldMapping, StuckJobPolicy, SyncConfig, TargetConfig};
pub use error::AppError;
pub use mailchimp::MailchimpClient;
pub use record::{validate, Candidate, RawRecord, RejectReason};
pub use sync::{
    NullSink, Outcome, ProgressSink, SyncEvent, SyncOrchestrator, SyncReport, TargetTotals,
    TracingSink,
};
