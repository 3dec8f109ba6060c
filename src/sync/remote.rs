//! Remote store capability traits.
//!
//! The orchestrator talks to the remote store through these traits so tests
//! can substitute fakes for the HTTP client. The bundled
//! [`MailchimpClient`] implements both.

use std::future::Future;
use std::pin::Pin;

use crate::error::AppError;
use crate::mailchimp::{BatchOperation, BatchStatus, MailchimpClient, MemberInfo, OperationResult};

/// Batch job operations: submit a chunk, check status, fetch results.
pub trait BatchClientOps: Send + Sync {
    /// Creates a batch job from the given operations.
    fn create_batch<'a>(
        &'a self,
        operations: &'a [BatchOperation],
    ) -> Pin<Box<dyn Future<Output = Result<BatchStatus, AppError>> + Send + 'a>>;

    /// Gets the current status of a batch job.
    fn get_batch<'a>(
        &'a self,
        batch_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BatchStatus, AppError>> + Send + 'a>>;

    /// Fetches the per-operation results of a finished batch job.
    fn fetch_batch_results<'a>(
        &'a self,
        batch: &'a BatchStatus,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<OperationResult>, AppError>> + Send + 'a>>;
}

/// Targeted single-member operations.
pub trait MemberClientOps: Send + Sync {
    /// Adds one member to a list.
    fn insert_member<'a>(
        &'a self,
        list_id: &'a str,
        member: &'a MemberInfo,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;

    /// Updates one existing member, addressed by identity hash.
    fn update_member<'a>(
        &'a self,
        list_id: &'a str,
        identity_hash: &'a str,
        member: &'a MemberInfo,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>>;
}

impl BatchClientOps for MailchimpClient {
    fn create_batch<'a>(
        &'a self,
        operations: &'a [BatchOperation],
    ) -> Pin<Box<dyn Future<Output = Result<BatchStatus, AppError>> + Send + 'a>> {
        Box::pin(MailchimpClient::create_batch(self, operations))
    }

    fn get_batch<'a>(
        &'a self,
        batch_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<BatchStatus, AppError>> + Send + 'a>> {
        Box::pin(MailchimpClient::get_batch(self, batch_id))
    }

    fn fetch_batch_results<'a>(
        &'a self,
        batch: &'a BatchStatus,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<OperationResult>, AppError>> + Send + 'a>> {
        Box::pin(MailchimpClient::fetch_batch_results(self, batch))
    }
}

impl MemberClientOps for MailchimpClient {
    fn insert_member<'a>(
        &'a self,
        list_id: &'a str,
        member: &'a MemberInfo,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(MailchimpClient::insert_member(self, list_id, member))
    }

    fn update_member<'a>(
        &'a self,
        list_id: &'a str,
        identity_hash: &'a str,
        member: &'a MemberInfo,
    ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
        Box::pin(MailchimpClient::update_member(self, list_id, identity_hash, member))
    }
}
