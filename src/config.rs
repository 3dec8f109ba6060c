//! Synchronization configuration.
//!
//! All knobs the orchestrator consumes are carried in an explicitly
//! constructed [`SyncConfig`] value; there is no ambient/global state.
//! Field mappings are validated against the set of logical fields a target's
//! list schema can define, so typos are rejected at construction time rather
//! than silently passed through to the remote store.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default number of candidates submitted per batch job.
pub const DEFAULT_CHUNK_SIZE: usize = 700;

/// Default delay between batch job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status checks before a job is declared stuck.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

/// Default number of re-submissions after a failed submit+poll attempt.
pub const DEFAULT_MAX_SUBMISSION_RETRIES: u32 = 2;

/// Default delay before re-submitting a failed chunk.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Default pause between successive chunk submissions for one target.
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_secs(2);

/// The logical field the email address is mapped from.
pub const EMAIL_FIELD: &str = "EMAIL";

/// Fixed logical merge fields a list schema can define, beyond the
/// numbered `MMERGE<n>` fields.
const KNOWN_MERGE_FIELDS: &[&str] = &["FNAME", "LNAME", "ADDRESS", "PHONE", "ZIPCODE"];

// ─────────────────────────────────────────────────────────────────────────────
// Field Mapping
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a target's logical fields to source column labels.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    /// Column label holding the email address.
    pub email: String,
    /// Logical merge field name → source column label.
    #[serde(default)]
    pub merge: BTreeMap<String, String>,
    /// Merge fields whose values are normalized as ZIP codes
    /// (in addition to `ZIPCODE`, which always is).
    #[serde(default)]
    pub zip_fields: BTreeSet<String>,
}

impl FieldMapping {
    /// Whether the given logical merge field carries a ZIP code value.
    pub fn is_zip_field(&self, logical: &str) -> bool {
        logical == "ZIPCODE" || self.zip_fields.contains(logical)
    }
}

/// Returns true if `name` is a logical merge field a list schema can define.
fn is_known_merge_field(name: &str) -> bool {
    if KNOWN_MERGE_FIELDS.contains(&name) {
        return true;
    }
    // Numbered merge fields: MMERGE1, MMERGE10, ...
    match name.strip_prefix("MMERGE") {
        Some(suffix) => !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Targets
// ─────────────────────────────────────────────────────────────────────────────

/// A named remote list destination with its own field mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Display name, e.g. "Bravo NY".
    pub name: String,
    /// Remote list id.
    pub list_id: String,
    /// Field mapping for this target's list schema.
    pub fields: FieldMapping,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stuck-Job Policy
// ─────────────────────────────────────────────────────────────────────────────

/// What to do when a batch job exhausts its polling budget without finishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StuckJobPolicy {
    /// Fail every candidate in the chunk. Operations that may have already
    /// succeeded remotely are discarded.
    FailChunk,
    /// Issue one final status fetch after the budget is exhausted; if the
    /// job reports finished, grant per-operation credit as usual.
    Reconcile,
}

impl Default for StuckJobPolicy {
    fn default() -> Self {
        StuckJobPolicy::FailChunk
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SyncConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for one synchronization run.
///
/// Constructed by the caller and passed into the orchestrator's constructor,
/// which validates it via [`SyncConfig::validate`]. `Debug` output redacts
/// the API key.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Remote API key. Only exposed at the point a request is signed.
    pub api_key: SecretString,
    /// Data-center prefix of the remote API host, e.g. "us21".
    pub server: String,
    /// Targets, processed in order.
    pub targets: Vec<TargetConfig>,
    /// Candidates per batch job.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Delay between job status checks.
    #[serde(default = "default_poll_interval", with = "duration_secs", rename = "poll_interval_secs")]
    pub poll_interval: Duration,
    /// Status checks before a job is declared stuck.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Re-submissions after a failed submit+poll attempt.
    #[serde(default = "default_max_submission_retries")]
    pub max_submission_retries: u32,
    /// Delay before re-submitting a failed chunk.
    #[serde(default = "default_retry_backoff", with = "duration_secs", rename = "retry_backoff_secs")]
    pub retry_backoff: Duration,
    /// Pause between successive chunk submissions for one target.
    #[serde(default = "default_chunk_pause", with = "duration_secs", rename = "chunk_pause_secs")]
    pub chunk_pause: Duration,
    /// Policy for jobs that exhaust the polling budget.
    #[serde(default)]
    pub stuck_job_policy: StuckJobPolicy,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_max_poll_attempts() -> u32 {
    DEFAULT_MAX_POLL_ATTEMPTS
}

fn default_max_submission_retries() -> u32 {
    DEFAULT_MAX_SUBMISSION_RETRIES
}

fn default_retry_backoff() -> Duration {
    DEFAULT_RETRY_BACKOFF
}

fn default_chunk_pause() -> Duration {
    DEFAULT_CHUNK_PAUSE
}

/// Deserializes a `Duration` from a plain seconds integer.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl SyncConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigInvalid` when:
    /// - `chunk_size` is zero
    /// - no targets are configured, or target names collide
    /// - a target has an empty list id or email column
    /// - a field mapping names an unknown logical field
    /// - `zip_fields` references a field the mapping does not define
    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::ConfigInvalid(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.server.trim().is_empty() {
            return Err(AppError::ConfigInvalid(
                "server prefix must not be empty".to_string(),
            ));
        }

        if self.targets.is_empty() {
            return Err(AppError::ConfigInvalid(
                "at least one target must be configured".to_string(),
            ));
        }

        let mut seen_names = BTreeSet::new();
        for target in &self.targets {
            if !seen_names.insert(target.name.as_str()) {
                return Err(AppError::ConfigInvalid(format!(
                    "duplicate target name '{}'",
                    target.name
                )));
            }

            if target.list_id.trim().is_empty() {
                return Err(AppError::ConfigInvalid(format!(
                    "target '{}' has an empty list id",
                    target.name
                )));
            }

            if target.fields.email.trim().is_empty() {
                return Err(AppError::ConfigInvalid(format!(
                    "target '{}' has no email column mapped",
                    target.name
                )));
            }

            for logical in target.fields.merge.keys() {
                if logical == EMAIL_FIELD {
                    return Err(AppError::ConfigInvalid(format!(
                        "target '{}': map the email column via 'email', not as a merge field",
                        target.name
                    )));
                }
                if !is_known_merge_field(logical) {
                    return Err(AppError::ConfigInvalid(format!(
                        "target '{}' maps unknown logical field '{}'",
                        target.name, logical
                    )));
                }
            }

            for zip_field in &target.fields.zip_fields {
                if !target.fields.merge.contains_key(zip_field) {
                    return Err(AppError::ConfigInvalid(format!(
                        "target '{}': zip field '{}' is not a mapped merge field",
                        target.name, zip_field
                    )));
                }
            }
        }

        Ok(())
    }

    /// Builds the remote API base URL from the server prefix.
    pub fn base_url(&self) -> Result<Url, AppError> {
        let raw = format!("https://{}.api.mailchimp.com/3.0/", self.server);
        Url::parse(&raw)
            .map_err(|e| AppError::ConfigInvalid(format!("invalid server prefix: {}", e)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> FieldMapping {
        FieldMapping {
            email: "C".to_string(),
            merge: BTreeMap::from([
                ("FNAME".to_string(), "D".to_string()),
                ("LNAME".to_string(), "E".to_string()),
                ("ZIPCODE".to_string(), "J".to_string()),
            ]),
            zip_fields: BTreeSet::new(),
        }
    }

    fn config() -> SyncConfig {
        SyncConfig {
            api_key: SecretString::from("test-key".to_string()),
            server: "us21".to_string(),
            targets: vec![TargetConfig {
                name: "Bravo NY".to_string(),
                list_id: "0a06e5f3d3".to_string(),
                fields: mapping(),
            }],
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            max_submission_retries: DEFAULT_MAX_SUBMISSION_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
            stuck_job_policy: StuckJobPolicy::default(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut cfg = config();
        cfg.chunk_size = 0;
        assert!(matches!(
            cfg.validate(),
            Err(AppError::ConfigInvalid(msg)) if msg.contains("chunk_size")
        ));
    }

    #[test]
    fn empty_targets_rejected() {
        let mut cfg = config();
        cfg.targets.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_target_names_rejected() {
        let mut cfg = config();
        let dup = cfg.targets[0].clone();
        cfg.targets.push(dup);
        assert!(matches!(
            cfg.validate(),
            Err(AppError::ConfigInvalid(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn unknown_logical_field_rejected() {
        let mut cfg = config();
        cfg.targets[0]
            .fields
            .merge
            .insert("FAVORITE_COLOR".to_string(), "K".to_string());
        assert!(matches!(
            cfg.validate(),
            Err(AppError::ConfigInvalid(msg)) if msg.contains("FAVORITE_COLOR")
        ));
    }

    #[test]
    fn numbered_merge_fields_accepted() {
        let mut cfg = config();
        cfg.targets[0]
            .fields
            .merge
            .insert("MMERGE10".to_string(), "J".to_string());
        cfg.targets[0]
            .fields
            .merge
            .insert("MMERGE11".to_string(), "J".to_string());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn malformed_numbered_merge_field_rejected() {
        let mut cfg = config();
        cfg.targets[0]
            .fields
            .merge
            .insert("MMERGE".to_string(), "J".to_string());
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.targets[0]
            .fields
            .merge
            .insert("MMERGE1X".to_string(), "J".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn email_as_merge_field_rejected() {
        let mut cfg = config();
        cfg.targets[0]
            .fields
            .merge
            .insert("EMAIL".to_string(), "C".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zip_field_must_be_mapped() {
        let mut cfg = config();
        cfg.targets[0]
            .fields
            .zip_fields
            .insert("MMERGE10".to_string());
        assert!(matches!(
            cfg.validate(),
            Err(AppError::ConfigInvalid(msg)) if msg.contains("MMERGE10")
        ));
    }

    #[test]
    fn zipcode_is_always_a_zip_field() {
        let m = mapping();
        assert!(m.is_zip_field("ZIPCODE"));
        assert!(!m.is_zip_field("FNAME"));
    }

    #[test]
    fn base_url_uses_server_prefix() {
        let url = config().base_url().expect("base url should parse");
        assert_eq!(url.as_str(), "https://us21.api.mailchimp.com/3.0/");
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("test-key"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = serde_json::json!({
            "api_key": "k",
            "server": "us21",
            "targets": [{
                "name": "CTown",
                "list_id": "7a827d6afc",
                "fields": { "email": "C" }
            }]
        });

        let cfg: SyncConfig = serde_json::from_value(json).expect("config should deserialize");
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(cfg.stuck_job_policy, StuckJobPolicy::FailChunk);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserializes_durations_from_seconds() {
        let json = serde_json::json!({
            "api_key": "k",
            "server": "us21",
            "poll_interval_secs": 3,
            "retry_backoff_secs": 7,
            "chunk_pause_secs": 1,
            "stuck_job_policy": "reconcile",
            "targets": [{
                "name": "CTown",
                "list_id": "7a827d6afc",
                "fields": { "email": "C" }
            }]
        });

        let cfg: SyncConfig = serde_json::from_value(json).expect("config should deserialize");
        assert_eq!(cfg.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.retry_backoff, Duration::from_secs(7));
        assert_eq!(cfg.chunk_pause, Duration::from_secs(1));
        assert_eq!(cfg.stuck_job_policy, StuckJobPolicy::Reconcile);
    }
}
