use thiserror::Error;

/// Patterns (lowercase) that indicate sensitive data not safe for outcome
/// records or audit rows. Used by `contains_sensitive()` for case-insensitive
/// matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "basic ",
    "bearer ",
    "api_key",
    "apikey",
    "authorization:",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes an error detail before it is stored in an outcome or audit row.
/// If sensitive content is detected, returns the fallback instead.
pub(crate) fn sanitize_detail(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // ── Remote API ────────────────────────────────────────────────────────────
    #[error("Remote API error ({status}): {detail}")]
    RemoteApi { status: u16, detail: String },

    #[error("Rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── Batch Jobs ────────────────────────────────────────────────────────────
    #[error("Batch job {job_id} did not finish within {attempts} status checks")]
    JobStuck { job_id: String, attempts: u32 },

    #[error("Status check for batch job {job_id} failed: {detail}")]
    JobPollFailed { job_id: String, detail: String },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Audit ─────────────────────────────────────────────────────────────────
    #[error("Audit sink error: {0}")]
    AuditSink(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the retry controller may re-run the failed chunk attempt.
    /// Cancellation is the only failure that must not be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AppError::Cancelled)
    }

    /// A short, sanitized description suitable for outcome reasons and
    /// audit rows. Never leaks credentials or auth headers.
    pub fn outcome_reason(&self) -> String {
        sanitize_detail(&self.to_string(), "remote request failed")
    }
}
