//! The `EmailJob` entity and its lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! pending ──claim──▶ sending ──ok──▶ sent
//!    ▲                  │
//!    └──── retry ◀──────┤ (attempts < max_attempts)
//!                       └──────────▶ failed (attempts == max_attempts)
//! ```
//!
//! `failed` only leaves via an explicit operator `requeue`. `sent` never changes.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::EmailJobId;

/// Default ceiling on delivery attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Substitution values for a named template, keyed by placeholder name.
pub type TemplateData = BTreeMap<String, serde_json::Value>;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"));

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl EmailStatus {
    pub const ALL: [EmailStatus; 4] = [
        EmailStatus::Pending,
        EmailStatus::Sending,
        EmailStatus::Sent,
        EmailStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sending => "sending",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
        }
    }

    /// No worker action moves a job out of a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EmailStatus::Sent | EmailStatus::Failed)
    }
}

impl core::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for EmailStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(EmailStatus::Pending),
            "sending" => Ok(EmailStatus::Sending),
            "sent" => Ok(EmailStatus::Sent),
            "failed" => Ok(EmailStatus::Failed),
            other => Err(DomainError::validation(format!(
                "unknown status '{other}' (expected pending, sending, sent or failed)"
            ))),
        }
    }
}

/// One queued outbound email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailJob {
    pub id: EmailJobId,
    pub to: String,
    pub subject: String,
    pub message: String,
    pub template: Option<String>,
    pub template_data: Option<TemplateData>,
    pub status: EmailStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub scheduled_for: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What happened to a job after a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to `pending`, eligible again at the given instant.
    Retry { at: DateTime<Utc> },
    /// Attempts exhausted; the job is now `failed`.
    Exhausted,
}

impl EmailJob {
    /// Whether the worker may claim this job at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EmailStatus::Pending
            && self.scheduled_for <= now
            && self.attempts < self.max_attempts
    }

    /// `pending → sending`.
    pub fn mark_sending(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.expect_status(EmailStatus::Pending, "mark_sending")?;
        self.status = EmailStatus::Sending;
        self.updated_at = now;
        Ok(())
    }

    /// `sending → sent`. Clears any error left by an earlier attempt.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.expect_status(EmailStatus::Sending, "mark_sent")?;
        self.status = EmailStatus::Sent;
        self.sent_at = Some(now);
        self.error = None;
        self.updated_at = now;
        Ok(())
    }

    /// Record a failed attempt and either reschedule or give up.
    ///
    /// `backoff` receives the number of failures *before* this one, so the
    /// first retry waits `backoff(0)`.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
        backoff: impl FnOnce(u32) -> Duration,
    ) -> DomainResult<FailureOutcome> {
        self.expect_status(EmailStatus::Sending, "record_failure")?;

        let prior = self.attempts;
        self.attempts = (prior + 1).min(self.max_attempts);
        self.error = Some(error.into());
        self.updated_at = now;

        if self.attempts < self.max_attempts {
            let at = now
                .checked_add_signed(backoff(prior))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            self.status = EmailStatus::Pending;
            self.scheduled_for = at;
            Ok(FailureOutcome::Retry { at })
        } else {
            self.status = EmailStatus::Failed;
            Ok(FailureOutcome::Exhausted)
        }
    }

    /// Operator re-drive of a permanently failed job.
    pub fn requeue(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.expect_status(EmailStatus::Failed, "requeue")?;
        self.status = EmailStatus::Pending;
        self.attempts = 0;
        self.error = None;
        self.scheduled_for = now;
        self.updated_at = now;
        Ok(())
    }

    fn expect_status(&self, expected: EmailStatus, op: &str) -> DomainResult<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(format!(
                "{op} requires status '{expected}', job {} is '{}'",
                self.id, self.status
            )))
        }
    }
}

/// Producer input for a new job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewEmail {
    pub to: String,
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub template_data: Option<TemplateData>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl NewEmail {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_template(mut self, name: impl Into<String>, data: TemplateData) -> Self {
        self.template = Some(name.into());
        self.template_data = Some(data);
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Reject input before any row is created.
    pub fn validate(&self) -> DomainResult<()> {
        if [&self.to, &self.subject, &self.message]
            .iter()
            .any(|f| f.trim().is_empty())
        {
            return Err(DomainError::validation(
                "missing required fields: to, subject, message",
            ));
        }
        if !EMAIL_RE.is_match(self.to.trim()) {
            return Err(DomainError::validation("invalid email address"));
        }
        if self.max_attempts == Some(0) {
            return Err(DomainError::validation("max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Validate and build a fresh `pending` job.
    pub fn into_job(self, now: DateTime<Utc>, default_max_attempts: u32) -> DomainResult<EmailJob> {
        self.validate()?;
        Ok(EmailJob {
            id: EmailJobId::new(),
            to: self.to.trim().to_string(),
            subject: self.subject,
            message: self.message,
            template: self.template,
            template_data: self.template_data,
            status: EmailStatus::Pending,
            attempts: 0,
            max_attempts: self.max_attempts.unwrap_or(default_max_attempts).max(1),
            scheduled_for: self.scheduled_for.unwrap_or(now),
            sent_at: None,
            error: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Job counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub pending: usize,
    pub sending: usize,
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
}

impl JobStats {
    pub fn record(&mut self, status: EmailStatus) {
        match status {
            EmailStatus::Pending => self.pending += 1,
            EmailStatus::Sending => self.sending += 1,
            EmailStatus::Sent => self.sent += 1,
            EmailStatus::Failed => self.failed += 1,
        }
        self.total += 1;
    }
}
