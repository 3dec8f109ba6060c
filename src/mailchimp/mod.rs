//! Mailchimp marketing API client.
//!
//! This module provides an HTTP client for the two remote surfaces the
//! orchestrator needs:
//!
//! - **Batch jobs** ([`batch`]): create a batch of member operations, poll
//!   its status, fetch per-operation results
//! - **Single members** ([`members`]): targeted insert/update of one list
//!   member, used by the duplicate-key fallback path
//!
//! # Security
//!
//! - The API key is held in `secrecy::SecretString` and exposed only when a
//!   request is signed
//! - Auth headers and member payloads are never logged
//! - Only HTTP method, path, and status codes are logged; batch ids are
//!   redacted to a short prefix

pub mod batch;
pub mod members;

use std::sync::Arc;

use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::config::SyncConfig;
use crate::error::AppError;

pub use batch::{BatchOperation, BatchStatus, OperationResult};
pub use members::{subscriber_hash, MemberInfo};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Types
// ─────────────────────────────────────────────────────────────────────────────

/// Remote-side state of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchJobState {
    /// Queued, not yet picked up.
    Pending,
    /// Operations are being unpacked.
    Preprocessing,
    /// Operations are running.
    Started,
    /// Results are being assembled.
    Finalizing,
    /// All operations have run; results are available.
    Finished,
}

impl BatchJobState {
    /// Whether the job has run to completion remotely.
    pub fn is_finished(self) -> bool {
        matches!(self, BatchJobState::Finished)
    }
}

/// Mailchimp problem+json error body.
#[derive(Debug, Deserialize)]
pub(crate) struct ProblemDetail {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// MailchimpClient
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the Mailchimp marketing API.
///
/// Cheap to clone; the underlying HTTP client is shared.
#[derive(Clone)]
pub struct MailchimpClient {
    /// Shared HTTP client.
    http: Arc<Client>,
    /// API base URL, e.g. "https://us21.api.mailchimp.com/3.0/".
    base_url: Url,
    /// API key, applied as HTTP basic auth per request.
    api_key: SecretString,
}

impl MailchimpClient {
    /// Creates a new client.
    pub fn new(http: Arc<Client>, base_url: Url, api_key: SecretString) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    /// Builds a client from a [`SyncConfig`], deriving the base URL from the
    /// configured server prefix.
    pub fn from_config(config: &SyncConfig) -> Result<Self, AppError> {
        Ok(Self::new(
            Arc::new(Client::new()),
            config.base_url()?,
            config.api_key.clone(),
        ))
    }

    /// Joins a relative API path onto the base URL.
    fn url(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Failed to build URL for '{}': {}", path, e)))
    }

    /// Applies basic auth. Mailchimp ignores the username; the API key is the
    /// password.
    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth("anystring", Some(self.api_key.expose_secret()))
    }

    /// Parses an error response and maps it to an `AppError`.
    pub(crate) async fn parse_error_response(
        &self,
        response: reqwest::Response,
        status: reqwest::StatusCode,
    ) -> AppError {
        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return AppError::RateLimited {
                retry_after_secs: retry_after,
            };
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("Unable to read error body"));

        if let Ok(problem) = serde_json::from_str::<ProblemDetail>(&body) {
            if !problem.title.is_empty() {
                return AppError::RemoteApi {
                    status: status.as_u16(),
                    detail: format!("{}: {}", problem.title, problem.detail),
                };
            }
        }

        // Fallback to generic error
        AppError::RemoteApi {
            status: status.as_u16(),
            detail: status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Redacts a batch id for logging (shows first 8 chars).
pub(crate) fn redact_id(id: &str) -> String {
    if id.len() > 8 {
        format!("{}...", &id[..8])
    } else {
        id.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
