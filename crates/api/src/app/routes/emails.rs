use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use mailq_core::NewEmail;

use crate::app::dto::{
    self, EmailListResponse, EmailResponse, ListEmailsQuery, SendEmailRequest, SendEmailResponse,
};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz::require_admin;
use crate::context::PrincipalContext;

/// Queue an email. Anonymous callers are accepted; a caller that does
/// identify itself must be an admin.
pub async fn send_email(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    body: Result<Json<SendEmailRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Some(Extension(principal)) = &principal {
        if let Err(resp) = require_admin(Some(principal)) {
            return resp;
        }
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text()),
    };

    match services.queue().enqueue(NewEmail::from(body)).await {
        Ok(job) => Json(SendEmailResponse {
            success: true,
            message: "Email queued successfully",
            email_id: job.id,
        })
        .into_response(),
        Err(e) => errors::enqueue_error_to_response(e),
    }
}

pub async fn list_emails(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Query(query): Query<ListEmailsQuery>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(principal.as_ref().map(|Extension(p)| p)) {
        return resp;
    }

    let status = match query.status() {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.queue().list(status, query.limit).await {
        Ok(emails) => Json(EmailListResponse::new(emails)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_email(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(principal.as_ref().map(|Extension(p)| p)) {
        return resp;
    }

    let id = match dto::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.queue().get(id).await {
        Ok(Some(email)) => Json(EmailResponse { success: true, email }).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("email job {id} not found")),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Re-drive a permanently failed job.
pub async fn retry_email(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(principal.as_ref().map(|Extension(p)| p)) {
        return resp;
    }

    let id = match dto::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.queue().retry_failed(id).await {
        Ok(email) => Json(EmailResponse { success: true, email }).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
