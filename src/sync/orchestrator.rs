//! Bulk upsert orchestration.
//!
//! The orchestrator drives the full pipeline for each configured target:
//! validate raw records, plan bounded chunks, then submit and poll one
//! batch job per chunk, recovering duplicate-key rejections through
//! targeted updates. Chunk-level failures are retried with backoff and
//! then degraded to failed outcomes; no per-record problem ever aborts the
//! run, and the caller always receives a complete per-target report.
//!
//! Targets are processed sequentially, one chunk in flight at a time, for
//! predictable rate-limit behavior. Cancellation stops the initiation of
//! further chunks and targets only; a chunk already submitted polls to its
//! own terminal state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditRow, AuditSink};
use crate::config::{SyncConfig, TargetConfig};
use crate::error::{sanitize_detail, AppError};
use crate::mailchimp::{redact_id, subscriber_hash, BatchOperation, MemberInfo, OperationResult};
use crate::record::{validate, Candidate, RawRecord};
use crate::sync::chunker::{plan, Chunk};
use crate::sync::events::{NullSink, ProgressSink, SyncEvent};
use crate::sync::poller::{JobPoller, TerminalPoll};
use crate::sync::remote::{BatchClientOps, MemberClientOps};
use crate::sync::report::{ChunkResult, Outcome, ResultAggregator, SyncReport};
use crate::sync::retry::with_retry;

// ─────────────────────────────────────────────────────────────────────────────
// SyncOrchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// Orchestrates one synchronization run across all configured targets.
pub struct SyncOrchestrator<C, S>
where
    C: BatchClientOps + MemberClientOps,
    S: AuditSink,
{
    config: SyncConfig,
    client: Arc<C>,
    audit: Arc<S>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
    run_id: String,
}

impl<C, S> SyncOrchestrator<C, S>
where
    C: BatchClientOps + MemberClientOps,
    S: AuditSink,
{
    /// Creates an orchestrator, validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigInvalid` when the configuration fails
    /// validation (see [`SyncConfig::validate`]).
    pub fn new(config: SyncConfig, client: Arc<C>, audit: Arc<S>) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            config,
            client,
            audit,
            progress: Arc::new(NullSink),
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4().to_string(),
        })
    }

    /// Subscribes a sink to the structured event stream.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Installs a caller-controlled cancellation token.
    ///
    /// Cancellation stops the initiation of further chunks and targets;
    /// candidates that never reach submission are recorded as failed so
    /// accounting stays complete.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The run id attached to every emitted event.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Runs the full synchronization and returns the per-target report.
    ///
    /// Never fails: validation rejects, chunk-level failures and audit
    /// errors all degrade to failed outcomes or report annotations.
    pub async fn run(&self, records: &[RawRecord]) -> SyncReport {
        info!(
            "[ORCHESTRATOR] Run {}: {} records, {} targets",
            &self.run_id[..8.min(self.run_id.len())],
            records.len(),
            self.config.targets.len()
        );

        let mut agg = ResultAggregator::new();

        for target in &self.config.targets {
            agg.ensure_target(&target.name);
            self.process_target(target, records, &mut agg).await;
        }

        let report = agg.finish();
        info!(
            "[ORCHESTRATOR] Run {} finished: {} outcomes",
            &self.run_id[..8.min(self.run_id.len())],
            report.outcomes.len()
        );
        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Per-Target Flow
    // ─────────────────────────────────────────────────────────────────────────

    /// Processes one target: validate, chunk, submit, resolve, audit.
    async fn process_target(
        &self,
        target: &TargetConfig,
        records: &[RawRecord],
        agg: &mut ResultAggregator,
    ) {
        let mut audit_rows: Vec<AuditRow> = Vec::with_capacity(records.len());

        // Validation rejects become failed outcomes immediately and never
        // reach the remote store.
        let mut candidates = Vec::new();
        for raw in records {
            match validate(raw, &target.fields) {
                Ok(candidate) => candidates.push(candidate),
                Err(reject) => {
                    audit_rows.push(AuditRow::rejected(reject.email_value()));
                    self.record_outcome(
                        agg,
                        Outcome {
                            email: reject.email_value().to_string(),
                            target: target.name.clone(),
                            uploaded: false,
                            reason: Some(reject.to_string()),
                        },
                    );
                }
            }
        }

        let chunks = plan(candidates, self.config.chunk_size);
        let candidate_count: usize = chunks.iter().map(|c| c.candidates.len()).sum();

        info!(
            "[ORCHESTRATOR] Target '{}' (list {}): {} candidates in {} chunks",
            target.name,
            target.list_id,
            candidate_count,
            chunks.len()
        );
        self.emit(SyncEvent::TargetStarted {
            run_id: self.run_id.clone(),
            target: target.name.clone(),
            candidates: candidate_count,
            chunks: chunks.len(),
        });

        for chunk in &chunks {
            if self.cancel.is_cancelled() {
                warn!(
                    "[ORCHESTRATOR] Cancelled before chunk {} of target '{}'",
                    chunk.index, target.name
                );
                let totals = self.fail_chunk(agg, &mut audit_rows, target, chunk, "cancelled");
                self.emit_chunk_finished(target, chunk, totals);
                continue;
            }

            // Pause between submissions to stay under the remote rate limit.
            // Not part of the retry budget.
            if chunk.index > 0 {
                tokio::time::sleep(self.config.chunk_pause).await;
            }

            self.emit(SyncEvent::ChunkStarted {
                run_id: self.run_id.clone(),
                target: target.name.clone(),
                chunk_index: chunk.index,
                size: chunk.candidates.len(),
            });

            let label = format!("chunk {} of target '{}'", chunk.index, target.name);
            let attempt_result = with_retry(
                &label,
                self.config.max_submission_retries,
                self.config.retry_backoff,
                |attempt, err| {
                    self.emit(SyncEvent::ChunkRetry {
                        run_id: self.run_id.clone(),
                        target: target.name.clone(),
                        chunk_index: chunk.index,
                        attempt,
                        error: err.outcome_reason(),
                    });
                },
                |_attempt| self.submit_and_poll(target, chunk),
            )
            .await;

            let totals = match attempt_result {
                Ok(results) => {
                    self.resolve_chunk(target, chunk, results, agg, &mut audit_rows)
                        .await
                }
                Err(e) => {
                    warn!(
                        "[ORCHESTRATOR] Chunk {} of target '{}' failed: {}",
                        chunk.index, target.name, e
                    );
                    self.fail_chunk(agg, &mut audit_rows, target, chunk, &e.outcome_reason())
                }
            };

            self.emit_chunk_finished(target, chunk, totals);
        }

        let totals = agg.totals_for(&target.name);
        info!(
            "[ORCHESTRATOR] Target '{}' finished: {} succeeded, {} failed",
            target.name, totals.success, totals.failed
        );
        self.emit(SyncEvent::TargetFinished {
            run_id: self.run_id.clone(),
            target: target.name.clone(),
            success: totals.success,
            failed: totals.failed,
        });

        // Audit once per target, after all chunks resolve. Append failures
        // are reported but never alter upload outcomes.
        if let Err(e) = self.audit.append_rows(&target.name, &audit_rows).await {
            warn!(
                "[ORCHESTRATOR] Audit append for target '{}' failed: {}",
                target.name, e
            );
            agg.record_audit_error(&target.name, &e);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Per-Chunk Flow
    // ─────────────────────────────────────────────────────────────────────────

    /// Submits one chunk as a batch job and polls it to completion.
    ///
    /// Returns the per-operation results of the finished job. Submission
    /// failures, poll transport failures and stuck jobs all surface as
    /// errors for the retry controller.
    async fn submit_and_poll(
        &self,
        target: &TargetConfig,
        chunk: &Chunk,
    ) -> Result<Vec<OperationResult>, AppError> {
        let mut operations = Vec::with_capacity(chunk.candidates.len());
        for (i, candidate) in chunk.candidates.iter().enumerate() {
            let member = MemberInfo::subscribed(candidate);
            operations.push(BatchOperation::insert_member(
                &target.list_id,
                operation_id(chunk.index, i),
                &member,
            )?);
        }

        let handle = self.client.create_batch(&operations).await?;
        info!(
            "[ORCHESTRATOR] Chunk {} of target '{}' submitted as batch {}",
            chunk.index,
            target.name,
            redact_id(&handle.id)
        );

        let poller = JobPoller::new(
            self.client.as_ref(),
            self.config.poll_interval,
            self.config.max_poll_attempts,
            self.config.stuck_job_policy,
        );

        match poller.poll(&handle).await {
            TerminalPoll::Finished(status) => self.client.fetch_batch_results(&status).await,
            TerminalPoll::Stuck { last, attempts } => Err(AppError::JobStuck {
                job_id: last.id,
                attempts,
            }),
            TerminalPoll::Errored(e) => Err(e),
        }
    }

    /// Resolves a finished chunk: maps each candidate to its operation
    /// result, recovers duplicate-key rejections, and records outcomes in
    /// candidate order.
    async fn resolve_chunk(
        &self,
        target: &TargetConfig,
        chunk: &Chunk,
        results: Vec<OperationResult>,
        agg: &mut ResultAggregator,
        audit_rows: &mut Vec<AuditRow>,
    ) -> ChunkResult {
        // The results document is not guaranteed to preserve operation
        // order; map ids back to entries.
        let by_id: HashMap<&str, &OperationResult> = results
            .iter()
            .map(|r| (r.operation_id.as_str(), r))
            .collect();

        let mut totals = ChunkResult::default();

        for (i, candidate) in chunk.candidates.iter().enumerate() {
            let op_id = operation_id(chunk.index, i);

            let (uploaded, reason) = match by_id.get(op_id.as_str()) {
                Some(result) if result.is_success() => (true, None),
                Some(result) if result.is_duplicate_key() => {
                    self.resolve_duplicate(target, candidate).await
                }
                Some(result) => (
                    false,
                    Some(sanitize_detail(
                        &result.rejection_detail(),
                        "operation rejected",
                    )),
                ),
                None => (
                    false,
                    Some("no result returned for operation".to_string()),
                ),
            };

            if uploaded {
                totals.success += 1;
            } else {
                totals.failed += 1;
            }

            audit_rows.push(AuditRow::from_candidate(candidate, uploaded));
            self.record_outcome(
                agg,
                Outcome {
                    email: candidate.email.clone(),
                    target: target.name.clone(),
                    uploaded,
                    reason,
                },
            );
        }

        totals
    }

    /// Recovers a duplicate-key rejection by re-issuing the same payload as
    /// a targeted update addressed by the member's identity hash.
    async fn resolve_duplicate(
        &self,
        target: &TargetConfig,
        candidate: &Candidate,
    ) -> (bool, Option<String>) {
        let member = MemberInfo::subscribed(candidate);
        let hash = subscriber_hash(&candidate.email);

        match self.client.update_member(&target.list_id, &hash, &member).await {
            Ok(()) => {
                info!(
                    "[ORCHESTRATOR] Updated existing member in '{}' after duplicate-key rejection",
                    target.name
                );
                (true, None)
            }
            Err(e) => (false, Some(e.outcome_reason())),
        }
    }

    /// Marks every candidate in a chunk failed with the given reason.
    fn fail_chunk(
        &self,
        agg: &mut ResultAggregator,
        audit_rows: &mut Vec<AuditRow>,
        target: &TargetConfig,
        chunk: &Chunk,
        reason: &str,
    ) -> ChunkResult {
        let mut totals = ChunkResult::default();

        for candidate in &chunk.candidates {
            totals.failed += 1;
            audit_rows.push(AuditRow::from_candidate(candidate, false));
            self.record_outcome(
                agg,
                Outcome {
                    email: candidate.email.clone(),
                    target: target.name.clone(),
                    uploaded: false,
                    reason: Some(reason.to_string()),
                },
            );
        }

        totals
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn emit(&self, event: SyncEvent) {
        self.progress.emit(&event);
    }

    fn emit_chunk_finished(&self, target: &TargetConfig, chunk: &Chunk, totals: ChunkResult) {
        self.emit(SyncEvent::ChunkFinished {
            run_id: self.run_id.clone(),
            target: target.name.clone(),
            chunk_index: chunk.index,
            success: totals.success,
            failed: totals.failed,
        });
    }

    fn record_outcome(&self, agg: &mut ResultAggregator, outcome: Outcome) {
        self.emit(SyncEvent::RecordOutcome {
            run_id: self.run_id.clone(),
            target: outcome.target.clone(),
            email: outcome.email.clone(),
            uploaded: outcome.uploaded,
            reason: outcome.reason.clone(),
        });
        agg.record(outcome);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic per-operation id encoding the candidate's position, so
/// results can be mapped back to candidates.
fn operation_id(chunk_index: usize, candidate_index: usize) -> String {
    format!("{}-{:05}", chunk_index, candidate_index)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
