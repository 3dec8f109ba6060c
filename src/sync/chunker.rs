//! Candidate-aware chunk planning.
//!
//! Partitions a validated candidate sequence into bounded-size chunks for
//! batch submission. Planning is deterministic: chunks cover the input
//! exhaustively and disjointly, in input order, and a chunk boundary never
//! splits a candidate.

use crate::record::Candidate;

/// A bounded batch of candidates submitted as one asynchronous job.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position of this chunk within its target's sequence (0-based).
    pub index: usize,
    /// The candidates, in input order.
    pub candidates: Vec<Candidate>,
}

/// Plans chunks of at most `chunk_size` candidates.
///
/// Produces `ceil(len / chunk_size)` chunks; empty input yields no chunks.
/// `chunk_size` must be positive; guarded by configuration validation.
pub fn plan(candidates: Vec<Candidate>, chunk_size: usize) -> Vec<Chunk> {
    debug_assert!(chunk_size > 0, "chunk_size must be positive");

    if candidates.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::with_capacity(candidates.len().div_ceil(chunk_size));
    let mut current = Vec::with_capacity(chunk_size.min(candidates.len()));

    for candidate in candidates {
        current.push(candidate);
        if current.len() == chunk_size {
            chunks.push(Chunk {
                index: chunks.len(),
                candidates: std::mem::take(&mut current),
            });
        }
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            candidates: current,
        });
    }

    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
