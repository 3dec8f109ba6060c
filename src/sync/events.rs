//! Structured progress events.
//!
//! The orchestrator emits an event stream instead of logging presentation
//! text inline; UI and audit layers subscribe through [`ProgressSink`].
//! Emission must never fail the sync, so the sink API is infallible and
//! synchronous.

use serde::Serialize;
use tracing::{debug, info, warn};

/// One progress event from an orchestrator run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A target's chunk sequence is about to be processed.
    TargetStarted {
        run_id: String,
        target: String,
        candidates: usize,
        chunks: usize,
    },
    /// A chunk is about to be submitted.
    ChunkStarted {
        run_id: String,
        target: String,
        chunk_index: usize,
        size: usize,
    },
    /// A chunk attempt failed and will be re-submitted.
    ChunkRetry {
        run_id: String,
        target: String,
        chunk_index: usize,
        attempt: u32,
        error: String,
    },
    /// A chunk resolved; every candidate in it has an outcome.
    ChunkFinished {
        run_id: String,
        target: String,
        chunk_index: usize,
        success: u64,
        failed: u64,
    },
    /// One candidate reached its terminal outcome.
    RecordOutcome {
        run_id: String,
        target: String,
        email: String,
        uploaded: bool,
        reason: Option<String>,
    },
    /// All chunks for a target resolved.
    TargetFinished {
        run_id: String,
        target: String,
        success: u64,
        failed: u64,
    },
}

/// Receives orchestrator progress events.
pub trait ProgressSink: Send + Sync {
    /// Handles one event. Must not block for long and must not panic.
    fn emit(&self, event: &SyncEvent);
}

/// Discards all events. The default sink.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: &SyncEvent) {}
}

/// Logs each event via `tracing`. Per-record outcomes log at debug level to
/// keep large runs readable.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::TargetStarted {
                target,
                candidates,
                chunks,
                ..
            } => info!(
                "[SYNC] Target '{}': {} candidates in {} chunks",
                target, candidates, chunks
            ),
            SyncEvent::ChunkStarted {
                target,
                chunk_index,
                size,
                ..
            } => info!(
                "[SYNC] Target '{}': submitting chunk {} ({} candidates)",
                target, chunk_index, size
            ),
            SyncEvent::ChunkRetry {
                target,
                chunk_index,
                attempt,
                error,
                ..
            } => warn!(
                "[SYNC] Target '{}': retrying chunk {} (attempt {}): {}",
                target, chunk_index, attempt, error
            ),
            SyncEvent::ChunkFinished {
                target,
                chunk_index,
                success,
                failed,
                ..
            } => info!(
                "[SYNC] Target '{}': chunk {} finished ({} succeeded, {} failed)",
                target, chunk_index, success, failed
            ),
            SyncEvent::RecordOutcome {
                target,
                email,
                uploaded,
                ..
            } => debug!(
                "[SYNC] Target '{}': {} -> {}",
                target,
                email,
                if *uploaded { "uploaded" } else { "failed" }
            ),
            SyncEvent::TargetFinished {
                target,
                success,
                failed,
                ..
            } => info!(
                "[SYNC] Target '{}': finished ({} succeeded, {} failed)",
                target, success, failed
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
