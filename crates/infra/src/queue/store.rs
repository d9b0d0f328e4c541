//! Queue store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mailq_core::{EmailJob, EmailJobId, EmailStatus, JobStats};

/// Persisted email jobs.
///
/// `claim_due` is the only operation that moves a job out of `pending`; it
/// must be atomic so two workers never dispatch the same row.
#[async_trait]
pub trait EmailJobStore: Send + Sync {
    /// Persist a new job.
    async fn insert(&self, job: EmailJob) -> Result<EmailJobId, QueueStoreError>;

    async fn get(&self, id: EmailJobId) -> Result<Option<EmailJob>, QueueStoreError>;

    /// Move up to `limit` due jobs to `sending`, oldest first, and return them.
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<EmailJob>, QueueStoreError>;

    /// Overwrite the mutable fields of an existing job.
    async fn update(&self, job: &EmailJob) -> Result<(), QueueStoreError>;

    /// Newest first, optionally filtered by status.
    async fn list(
        &self,
        status: Option<EmailStatus>,
        limit: usize,
    ) -> Result<Vec<EmailJob>, QueueStoreError>;

    /// Put a `failed` job back in the queue with a fresh attempt budget.
    async fn retry_failed(
        &self,
        id: EmailJobId,
        now: DateTime<Utc>,
    ) -> Result<EmailJob, QueueStoreError>;

    async fn stats(&self) -> Result<JobStats, QueueStoreError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueStoreError {
    #[error("email job not found: {0}")]
    NotFound(EmailJobId),
    #[error("email job already exists: {0}")]
    AlreadyExists(EmailJobId),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait]
impl<S: EmailJobStore + ?Sized> EmailJobStore for std::sync::Arc<S> {
    async fn insert(&self, job: EmailJob) -> Result<EmailJobId, QueueStoreError> {
        (**self).insert(job).await
    }

    async fn get(&self, id: EmailJobId) -> Result<Option<EmailJob>, QueueStoreError> {
        (**self).get(id).await
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<EmailJob>, QueueStoreError> {
        (**self).claim_due(now, limit).await
    }

    async fn update(&self, job: &EmailJob) -> Result<(), QueueStoreError> {
        (**self).update(job).await
    }

    async fn list(
        &self,
        status: Option<EmailStatus>,
        limit: usize,
    ) -> Result<Vec<EmailJob>, QueueStoreError> {
        (**self).list(status, limit).await
    }

    async fn retry_failed(
        &self,
        id: EmailJobId,
        now: DateTime<Utc>,
    ) -> Result<EmailJob, QueueStoreError> {
        (**self).retry_failed(id, now).await
    }

    async fn stats(&self) -> Result<JobStats, QueueStoreError> {
        (**self).stats().await
    }
}
