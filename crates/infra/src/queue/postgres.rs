//! Postgres-backed queue store.
//!
//! Jobs live in a single `email_queue` table. The claim is one statement:
//!
//! ```sql
//! UPDATE email_queue SET status = 'sending' ...
//! WHERE id IN (SELECT id ... FOR UPDATE SKIP LOCKED)
//! RETURNING ...
//! ```
//!
//! so concurrent workers (threads or processes) skip rows another claim has
//! already locked instead of dispatching them twice.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | QueueStoreError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` |
//! | Database (other) | Any other | `Storage` |
//! | PoolClosed / other | N/A | `Storage` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use mailq_core::{EmailJob, EmailJobId, EmailStatus, JobStats, TemplateData};

use super::store::{EmailJobStore, QueueStoreError};

const COLUMNS: &str = "id, to_address, subject, message, template, template_data, status, \
     attempts, max_attempts, scheduled_for, sent_at, error, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresEmailJobStore {
    pool: Arc<PgPool>,
}

impl PostgresEmailJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the queue table and its claim index if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), QueueStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS email_queue (
                id             UUID PRIMARY KEY,
                to_address     TEXT NOT NULL,
                subject        TEXT NOT NULL,
                message        TEXT NOT NULL,
                template       TEXT NULL,
                template_data  JSONB NULL,
                status         TEXT NOT NULL DEFAULT 'pending'
                               CHECK (status IN ('pending', 'sending', 'sent', 'failed')),
                attempts       INTEGER NOT NULL DEFAULT 0 CHECK (attempts >= 0),
                max_attempts   INTEGER NOT NULL DEFAULT 3 CHECK (max_attempts >= 1),
                scheduled_for  TIMESTAMPTZ NOT NULL DEFAULT now(),
                sent_at        TIMESTAMPTZ NULL,
                error          TEXT NULL,
                created_at     TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at     TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS email_queue_due_idx
                ON email_queue (scheduled_for, created_at)
                WHERE status = 'pending'
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }
}

#[async_trait]
impl EmailJobStore for PostgresEmailJobStore {
    #[instrument(skip(self, job), fields(job_id = %job.id), err)]
    async fn insert(&self, job: EmailJob) -> Result<EmailJobId, QueueStoreError> {
        let template_data = encode_template_data(job.template_data.as_ref())?;

        sqlx::query(
            r#"
            INSERT INTO email_queue (
                id, to_address, subject, message, template, template_data, status,
                attempts, max_attempts, scheduled_for, sent_at, error, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(&job.to)
        .bind(&job.subject)
        .bind(&job.message)
        .bind(&job.template)
        .bind(template_data)
        .bind(job.status.as_str())
        .bind(to_i32(job.attempts))
        .bind(to_i32(job.max_attempts))
        .bind(job.scheduled_for)
        .bind(job.sent_at)
        .bind(&job.error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert", e) {
            QueueStoreError::AlreadyExists(_) => QueueStoreError::AlreadyExists(job.id),
            other => other,
        })?;

        Ok(job.id)
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn get(&self, id: EmailJobId) -> Result<Option<EmailJob>, QueueStoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM email_queue WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<EmailJob>, QueueStoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            r#"
            UPDATE email_queue
            SET status = 'sending', updated_at = $1
            WHERE id IN (
                SELECT id FROM email_queue
                WHERE status = 'pending'
                  AND scheduled_for <= $1
                  AND attempts < max_attempts
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {COLUMNS}
            "#
        ))
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_due", e))?;

        // RETURNING does not preserve the sub-select order.
        let mut jobs = rows.iter().map(job_from_row).collect::<Result<Vec<_>, _>>()?;
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, status = %job.status), err)]
    async fn update(&self, job: &EmailJob) -> Result<(), QueueStoreError> {
        let template_data = encode_template_data(job.template_data.as_ref())?;

        let result = sqlx::query(
            r#"
            UPDATE email_queue
            SET to_address = $2, subject = $3, message = $4, template = $5,
                template_data = $6, status = $7, attempts = $8, max_attempts = $9,
                scheduled_for = $10, sent_at = $11, error = $12, updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(&job.to)
        .bind(&job.subject)
        .bind(&job.message)
        .bind(&job.template)
        .bind(template_data)
        .bind(job.status.as_str())
        .bind(to_i32(job.attempts))
        .bind(to_i32(job.max_attempts))
        .bind(job.scheduled_for)
        .bind(job.sent_at)
        .bind(&job.error)
        .bind(job.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        if result.rows_affected() == 0 {
            return Err(QueueStoreError::NotFound(job.id));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list(
        &self,
        status: Option<EmailStatus>,
        limit: usize,
    ) -> Result<Vec<EmailJob>, QueueStoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS} FROM email_queue
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list", e))?;

        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn retry_failed(
        &self,
        id: EmailJobId,
        now: DateTime<Utc>,
    ) -> Result<EmailJob, QueueStoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE email_queue
            SET status = 'pending', attempts = 0, error = NULL,
                scheduled_for = $2, updated_at = $2
            WHERE id = $1 AND status = 'failed'
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("retry_failed", e))?;

        if let Some(row) = row {
            return job_from_row(&row);
        }

        // Distinguish a missing job from one in the wrong state.
        match self.get(id).await? {
            Some(job) => Err(QueueStoreError::InvalidState(format!(
                "job {id} is '{}', only failed jobs can be retried",
                job.status
            ))),
            None => Err(QueueStoreError::NotFound(id)),
        }
    }

    #[instrument(skip(self), err)]
    async fn stats(&self) -> Result<JobStats, QueueStoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM email_queue GROUP BY status")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("stats", e))?;

        let mut stats = JobStats::default();
        for row in rows {
            let status: String = row.try_get("status").map_err(|e| map_sqlx_error("stats", e))?;
            let n: i64 = row.try_get("n").map_err(|e| map_sqlx_error("stats", e))?;
            let n = usize::try_from(n).unwrap_or(0);
            match status.parse::<EmailStatus>() {
                Ok(EmailStatus::Pending) => stats.pending += n,
                Ok(EmailStatus::Sending) => stats.sending += n,
                Ok(EmailStatus::Sent) => stats.sent += n,
                Ok(EmailStatus::Failed) => stats.failed += n,
                Err(_) => {
                    tracing::warn!(status = %status, "ignoring unknown status in email_queue");
                    continue;
                }
            }
            stats.total += n;
        }
        Ok(stats)
    }
}

fn job_from_row(row: &PgRow) -> Result<EmailJob, QueueStoreError> {
    let decode = |e: sqlx::Error| {
        QueueStoreError::Storage(format!("failed to deserialize email_queue row: {e}"))
    };

    let status: String = row.try_get("status").map_err(decode)?;
    let status = status
        .parse::<EmailStatus>()
        .map_err(|e| QueueStoreError::Storage(e.to_string()))?;

    let template_data: Option<serde_json::Value> = row.try_get("template_data").map_err(decode)?;
    let template_data = template_data
        .map(serde_json::from_value::<TemplateData>)
        .transpose()
        .map_err(|e| QueueStoreError::Storage(format!("invalid template_data: {e}")))?;

    let attempts: i32 = row.try_get("attempts").map_err(decode)?;
    let max_attempts: i32 = row.try_get("max_attempts").map_err(decode)?;
    let id: uuid::Uuid = row.try_get("id").map_err(decode)?;

    Ok(EmailJob {
        id: EmailJobId::from_uuid(id),
        to: row.try_get("to_address").map_err(decode)?,
        subject: row.try_get("subject").map_err(decode)?,
        message: row.try_get("message").map_err(decode)?,
        template: row.try_get("template").map_err(decode)?,
        template_data,
        status,
        attempts: u32::try_from(attempts).unwrap_or(0),
        max_attempts: u32::try_from(max_attempts).unwrap_or(1),
        scheduled_for: row.try_get("scheduled_for").map_err(decode)?,
        sent_at: row.try_get("sent_at").map_err(decode)?,
        error: row.try_get("error").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn encode_template_data(
    data: Option<&TemplateData>,
) -> Result<Option<serde_json::Value>, QueueStoreError> {
    data.map(serde_json::to_value)
        .transpose()
        .map_err(|e| QueueStoreError::Storage(format!("invalid template_data: {e}")))
}

fn to_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Map SQLx errors to queue store errors, tagged with the failing operation.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> QueueStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation; callers substitute the real id.
                Some("23505") => QueueStoreError::AlreadyExists(EmailJobId::from_uuid(uuid::Uuid::nil())),
                _ => QueueStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            QueueStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => QueueStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
