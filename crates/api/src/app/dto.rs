use serde::{Deserialize, Serialize};

use mailq_core::{EmailJob, EmailJobId, EmailStatus, JobStats, NewEmail, TemplateData};
use mailq_infra::WorkerStats;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /api/send-email`.
///
/// Every field is optional at the JSON level so missing ones surface as a
/// validation error rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub template: Option<String>,
    pub template_data: Option<TemplateData>,
    pub scheduled_for: Option<chrono::DateTime<chrono::Utc>>,
    pub max_attempts: Option<u32>,
}

impl From<SendEmailRequest> for NewEmail {
    fn from(req: SendEmailRequest) -> Self {
        NewEmail {
            to: req.to.unwrap_or_default(),
            subject: req.subject.unwrap_or_default(),
            message: req.message.unwrap_or_default(),
            template: req.template,
            template_data: req.template_data,
            scheduled_for: req.scheduled_for,
            max_attempts: req.max_attempts,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListEmailsQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

impl ListEmailsQuery {
    pub fn status(&self) -> Result<Option<EmailStatus>, axum::response::Response> {
        self.status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<EmailStatus>)
            .transpose()
            .map_err(errors::domain_error_to_response)
    }
}

pub fn parse_job_id(raw: &str) -> Result<EmailJobId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct SendEmailResponse {
    pub success: bool,
    pub message: &'static str,
    pub email_id: EmailJobId,
}

#[derive(Debug, Serialize)]
pub struct EmailListResponse {
    pub success: bool,
    pub count: usize,
    pub emails: Vec<EmailJob>,
}

impl EmailListResponse {
    pub fn new(emails: Vec<EmailJob>) -> Self {
        Self {
            success: true,
            count: emails.len(),
            emails,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EmailResponse {
    pub success: bool,
    pub email: EmailJob,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WorkerStatusResponse {
    pub success: bool,
    pub running: bool,
    pub stats: WorkerStats,
    pub queue: JobStats,
}
