//! Producer-facing queue operations.

use std::sync::Arc;

use mailq_core::{
    Clock, DomainError, EmailJob, EmailJobId, EmailStatus, JobStats, NewEmail, SystemClock,
    DEFAULT_MAX_ATTEMPTS,
};

use super::store::{EmailJobStore, QueueStoreError};

/// Listing size when the caller gives none.
pub const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EnqueueError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] QueueStoreError),
}

/// Validates producer input and writes jobs to the store. Never sends.
#[derive(Clone)]
pub struct EmailQueue<S> {
    store: S,
    clock: Arc<dyn Clock>,
    default_max_attempts: u32,
}

impl<S: EmailJobStore> EmailQueue<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_max_attempts(mut self, max_attempts: u32) -> Self {
        self.default_max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate, build a `pending` job and persist it.
    pub async fn enqueue(&self, email: NewEmail) -> Result<EmailJob, EnqueueError> {
        let job = email.into_job(self.clock.now(), self.default_max_attempts)?;
        self.store.insert(job.clone()).await?;
        tracing::info!(
            job_id = %job.id,
            to = %job.to,
            template = job.template.as_deref().unwrap_or("-"),
            scheduled_for = %job.scheduled_for,
            "email queued"
        );
        Ok(job)
    }

    pub async fn list(
        &self,
        status: Option<EmailStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<EmailJob>, QueueStoreError> {
        self.store
            .list(status, limit.unwrap_or(DEFAULT_LIST_LIMIT))
            .await
    }

    pub async fn get(&self, id: EmailJobId) -> Result<Option<EmailJob>, QueueStoreError> {
        self.store.get(id).await
    }

    /// Re-drive a permanently failed job.
    pub async fn retry_failed(&self, id: EmailJobId) -> Result<EmailJob, QueueStoreError> {
        let job = self.store.retry_failed(id, self.clock.now()).await?;
        tracing::info!(job_id = %job.id, "failed email re-queued");
        Ok(job)
    }

    pub async fn stats(&self) -> Result<JobStats, QueueStoreError> {
        self.store.stats().await
    }
}
