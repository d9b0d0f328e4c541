//! In-memory queue store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mailq_core::{EmailJob, EmailJobId, EmailStatus, JobStats};

use super::store::{EmailJobStore, QueueStoreError};

/// Jobs live in a map behind one lock; the claim runs under the write lock,
/// which makes it atomic across concurrent callers.
#[derive(Debug, Default)]
pub struct InMemoryEmailJobStore {
    jobs: RwLock<HashMap<EmailJobId, EmailJob>>,
}

impl InMemoryEmailJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<EmailJobId, EmailJob>>, QueueStoreError> {
        self.jobs
            .read()
            .map_err(|_| QueueStoreError::Storage("job map lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<EmailJobId, EmailJob>>, QueueStoreError> {
        self.jobs
            .write()
            .map_err(|_| QueueStoreError::Storage("job map lock poisoned".into()))
    }
}

#[async_trait]
impl EmailJobStore for InMemoryEmailJobStore {
    async fn insert(&self, job: EmailJob) -> Result<EmailJobId, QueueStoreError> {
        let mut jobs = self.write()?;
        if jobs.contains_key(&job.id) {
            return Err(QueueStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn get(&self, id: EmailJobId) -> Result<Option<EmailJob>, QueueStoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<EmailJob>, QueueStoreError> {
        let mut jobs = self.write()?;

        let mut due: Vec<(DateTime<Utc>, EmailJobId)> = jobs
            .values()
            .filter(|j| j.is_due(now))
            .map(|j| (j.created_at, j.id))
            .collect();
        due.sort();
        due.truncate(limit);

        let mut claimed = Vec::with_capacity(due.len());
        for (_, id) in due {
            if let Some(job) = jobs.get_mut(&id) {
                job.mark_sending(now)
                    .map_err(|e| QueueStoreError::InvalidState(e.to_string()))?;
                claimed.push(job.clone());
            }
        }
        Ok(claimed)
    }

    async fn update(&self, job: &EmailJob) -> Result<(), QueueStoreError> {
        let mut jobs = self.write()?;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(QueueStoreError::NotFound(job.id)),
        }
    }

    async fn list(
        &self,
        status: Option<EmailStatus>,
        limit: usize,
    ) -> Result<Vec<EmailJob>, QueueStoreError> {
        let jobs = self.read()?;
        let mut result: Vec<EmailJob> = jobs
            .values()
            .filter(|j| status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        // UUIDv7 ids break created_at ties in insertion order.
        result.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.as_uuid().cmp(a.id.as_uuid()))
        });
        result.truncate(limit);
        Ok(result)
    }

    async fn retry_failed(
        &self,
        id: EmailJobId,
        now: DateTime<Utc>,
    ) -> Result<EmailJob, QueueStoreError> {
        let mut jobs = self.write()?;
        let job = jobs.get_mut(&id).ok_or(QueueStoreError::NotFound(id))?;
        job.requeue(now)
            .map_err(|e| QueueStoreError::InvalidState(e.to_string()))?;
        Ok(job.clone())
    }

    async fn stats(&self) -> Result<JobStats, QueueStoreError> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            stats.record(job.status);
        }
        Ok(stats)
    }
}
