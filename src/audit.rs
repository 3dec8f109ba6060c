//! Audit sink: durable logging of per-record outcomes.
//!
//! The orchestrator hands each target's full outcome stream to an
//! [`AuditSink`] once that target's chunks have all resolved. Append
//! failures are reported to the caller but never revert or retry the upload
//! itself. A CSV-file-backed implementation is bundled; callers with other
//! destinations implement the trait.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::record::Candidate;

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// One audit line: who was uploaded where, and whether it worked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRow {
    pub email: String,
    pub first_name: String,
    pub phone: String,
    pub uploaded: bool,
}

impl AuditRow {
    /// Builds a row from a candidate's merge fields.
    pub(crate) fn from_candidate(candidate: &Candidate, uploaded: bool) -> Self {
        Self {
            email: candidate.email.clone(),
            first_name: candidate.fields.get("FNAME").cloned().unwrap_or_default(),
            phone: candidate.fields.get("PHONE").cloned().unwrap_or_default(),
            uploaded,
        }
    }

    /// Builds a row for a record rejected before validation produced a
    /// candidate.
    pub(crate) fn rejected(email: &str) -> Self {
        Self {
            email: email.to_string(),
            first_name: String::new(),
            phone: String::new(),
            uploaded: false,
        }
    }
}

/// Receives the per-record outcome stream for durable logging.
///
/// Invoked once per target after all chunks for that target finish.
pub trait AuditSink: Send + Sync {
    /// Appends rows for one target.
    fn append_rows<'a>(
        &'a self,
        target_name: &'a str,
        rows: &'a [AuditRow],
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// CsvAuditSink
// ─────────────────────────────────────────────────────────────────────────────

/// File-backed audit sink writing one CSV file per target.
///
/// Rows are appended; the header is written only when a target's file is
/// first created. CSV writing is blocking, so it runs on the blocking pool.
pub struct CsvAuditSink {
    dir: PathBuf,
}

impl CsvAuditSink {
    /// Creates a sink writing under the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The audit file for a target.
    fn file_path(&self, target_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.csv", sanitize_file_stem(target_name)))
    }

    /// Blocking append implementation.
    fn append_blocking(path: PathBuf, rows: Vec<AuditRow>) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::AuditSink(format!("Failed to create audit directory: {}", e))
            })?;
        }

        let is_new = !path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AppError::AuditSink(format!("Failed to open audit file: {}", e)))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);

        for row in &rows {
            writer
                .serialize(row)
                .map_err(|e| AppError::AuditSink(format!("Failed to write audit row: {}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| AppError::AuditSink(format!("Failed to flush audit file: {}", e)))?;

        Ok(())
    }
}

impl AuditSink for CsvAuditSink {
    fn append_rows<'a>(
        &'a self,
        target_name: &'a str,
        rows: &'a [AuditRow],
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        let path = self.file_path(target_name);
        let rows = rows.to_vec();

        Box::pin(async move {
            let count = rows.len();

            tokio::task::spawn_blocking(move || Self::append_blocking(path, rows))
                .await
                .map_err(|e| AppError::AuditSink(format!("Audit task join error: {}", e)))??;

            info!(
                "[AUDIT] Appended {} rows for target '{}'",
                count, target_name
            );
            Ok(())
        })
    }
}

/// Lowercases a target name and replaces anything non-alphanumeric with
/// underscores, so any target name yields a usable file name.
fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
