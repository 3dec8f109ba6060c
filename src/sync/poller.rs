//! Batch job polling to a terminal state.
//!
//! A submitted job is polled on a fixed interval until it finishes or the
//! attempt budget runs out, bounding worst-case latency per chunk to
//! `poll_interval × max_attempts`. A job that never finishes is declared
//! stuck rather than waited on indefinitely; a failed status check ends the
//! poll immediately.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::StuckJobPolicy;
use crate::error::AppError;
use crate::mailchimp::{redact_id, BatchStatus};
use crate::sync::remote::BatchClientOps;

// ─────────────────────────────────────────────────────────────────────────────
// Terminal States
// ─────────────────────────────────────────────────────────────────────────────

/// How a polling run ended.
#[derive(Debug)]
pub enum TerminalPoll {
    /// The job finished; per-operation results can be fetched.
    Finished(BatchStatus),
    /// The job did not finish within the attempt budget.
    Stuck {
        /// Last status observed.
        last: BatchStatus,
        /// Number of status checks performed.
        attempts: u32,
    },
    /// A status check failed at the transport level.
    Errored(AppError),
}

// ─────────────────────────────────────────────────────────────────────────────
// JobPoller
// ─────────────────────────────────────────────────────────────────────────────

/// Polls one batch job until it reaches a terminal state.
pub struct JobPoller<'a, C: BatchClientOps> {
    client: &'a C,
    poll_interval: Duration,
    max_attempts: u32,
    stuck_policy: StuckJobPolicy,
}

impl<'a, C: BatchClientOps> JobPoller<'a, C> {
    /// Creates a poller with the given budget and stuck-job policy.
    pub fn new(
        client: &'a C,
        poll_interval: Duration,
        max_attempts: u32,
        stuck_policy: StuckJobPolicy,
    ) -> Self {
        Self {
            client,
            poll_interval,
            max_attempts,
            stuck_policy,
        }
    }

    /// Polls the job to a terminal state.
    ///
    /// Sleeps `poll_interval` before each status check. A job whose
    /// submission response already reports finished is returned without any
    /// checks. Under [`StuckJobPolicy::Reconcile`], an exhausted budget is
    /// followed by one final status fetch before the job is declared stuck.
    pub async fn poll(&self, handle: &BatchStatus) -> TerminalPoll {
        if handle.status.is_finished() {
            return TerminalPoll::Finished(handle.clone());
        }

        let mut last = handle.clone();

        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            match self.client.get_batch(&last.id).await {
                Ok(status) => {
                    debug!(
                        "[POLLER] Batch {}: {:?}, {}/{} operations (attempt {}/{})",
                        redact_id(&status.id),
                        status.status,
                        status.finished_operations,
                        status.total_operations,
                        attempt,
                        self.max_attempts
                    );

                    if status.status.is_finished() {
                        return TerminalPoll::Finished(status);
                    }
                    last = status;
                }
                Err(e) => {
                    warn!(
                        "[POLLER] Status check for batch {} failed: {}",
                        redact_id(&last.id),
                        e
                    );
                    return TerminalPoll::Errored(AppError::JobPollFailed {
                        job_id: last.id.clone(),
                        detail: e.to_string(),
                    });
                }
            }
        }

        // Budget exhausted. Under the reconcile policy, give the job one
        // last chance to report finished before discarding its work.
        if self.stuck_policy == StuckJobPolicy::Reconcile {
            match self.client.get_batch(&last.id).await {
                Ok(status) if status.status.is_finished() => {
                    info!(
                        "[POLLER] Batch {} finished on reconcile fetch after {} attempts",
                        redact_id(&status.id),
                        self.max_attempts
                    );
                    return TerminalPoll::Finished(status);
                }
                Ok(status) => last = status,
                Err(e) => {
                    warn!(
                        "[POLLER] Reconcile fetch for batch {} failed: {}",
                        redact_id(&last.id),
                        e
                    );
                }
            }
        }

        TerminalPoll::Stuck {
            last,
            attempts: self.max_attempts,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
