//! Outcome accumulation and the final per-target report.
//!
//! Every candidate resolves to exactly one [`Outcome`] per target, whatever
//! path it took: validation reject, chunk-level failure, first-try success,
//! or success via the duplicate-key fallback. The aggregator owns the
//! outcomes and the running per-target tallies; the finished [`SyncReport`]
//! is the only value returned to the caller.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal result for one candidate against one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// The candidate's email (or the rejected raw value).
    pub email: String,
    /// Target name.
    pub target: String,
    /// Whether the record ended up in the remote list.
    pub uploaded: bool,
    /// Failure detail; `None` on success.
    pub reason: Option<String>,
}

/// Success/failure tally for one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChunkResult {
    pub success: u64,
    pub failed: u64,
}

/// Success/failure tally for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TargetTotals {
    pub success: u64,
    pub failed: u64,
}

/// Final report of one orchestrator run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Target name → tallies. Every configured target has an entry, even
    /// when it received no candidates.
    pub totals: BTreeMap<String, TargetTotals>,
    /// All outcomes, in emission order: chunk order within a target,
    /// candidate order within a chunk.
    pub outcomes: Vec<Outcome>,
    /// Target name → audit append failure. Audit failures never alter
    /// upload outcomes.
    pub audit_errors: BTreeMap<String, String>,
}

impl SyncReport {
    /// Tallies for a target; zero for unknown names.
    pub fn totals_for(&self, target: &str) -> TargetTotals {
        self.totals.get(target).copied().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ResultAggregator
// ─────────────────────────────────────────────────────────────────────────────

/// Accumulates outcomes and tallies across all chunks and targets.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    report: SyncReport,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a target has a (possibly zero) totals entry.
    pub fn ensure_target(&mut self, target: &str) {
        self.report.totals.entry(target.to_string()).or_default();
    }

    /// Records one outcome, updating its target's tally.
    pub fn record(&mut self, outcome: Outcome) {
        let totals = self.report.totals.entry(outcome.target.clone()).or_default();
        if outcome.uploaded {
            totals.success += 1;
        } else {
            totals.failed += 1;
        }
        self.report.outcomes.push(outcome);
    }

    /// Notes an audit append failure for a target.
    pub fn record_audit_error(&mut self, target: &str, error: &AppError) {
        self.report
            .audit_errors
            .insert(target.to_string(), error.outcome_reason());
    }

    /// Current tallies for a target.
    pub fn totals_for(&self, target: &str) -> TargetTotals {
        self.report.totals_for(target)
    }

    /// Finishes accumulation and yields the report.
    pub fn finish(self) -> SyncReport {
        self.report
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
