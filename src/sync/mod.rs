//! The bulk upsert pipeline.
//!
//! This module contains the orchestration core and its parts:
//!
//! - [`chunker`]: partitions validated candidates into bounded chunks
//! - [`remote`]: capability traits the orchestrator uses to reach the store
//! - [`poller`]: polls one batch job to a terminal state
//! - [`retry`]: bounded retry around each chunk's submit+poll pair
//! - [`events`]: structured progress events and sinks
//! - [`report`]: outcome accumulation and the final per-target report
//! - [`orchestrator`]: drives the whole flow per target

pub mod chunker;
pub mod events;
pub mod orchestrator;
pub mod poller;
pub mod remote;
pub mod report;
pub mod retry;

pub use chunker::{plan, Chunk};
pub use events::{NullSink, ProgressSink, SyncEvent, TracingSink};
pub use orchestrator::SyncOrchestrator;
pub use poller::{JobPoller, TerminalPoll};
pub use remote::{BatchClientOps, MemberClientOps};
pub use report::{ChunkResult, Outcome, ResultAggregator, SyncReport, TargetTotals};
pub use retry::with_retry;
