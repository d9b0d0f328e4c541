use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use mailq_core::DomainError;
use mailq_infra::{EnqueueError, QueueStoreError};

pub fn enqueue_error_to_response(err: EnqueueError) -> axum::response::Response {
    match err {
        EnqueueError::Validation(e) => domain_error_to_response(e),
        EnqueueError::Store(e) => store_error_to_response(e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvalidTransition(msg) => json_error(StatusCode::CONFLICT, "invalid_state", msg),
    }
}

pub fn store_error_to_response(err: QueueStoreError) -> axum::response::Response {
    match err {
        QueueStoreError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("email job {id} not found"))
        }
        QueueStoreError::InvalidState(msg) => json_error(StatusCode::CONFLICT, "invalid_state", msg),
        QueueStoreError::AlreadyExists(id) => {
            json_error(StatusCode::CONFLICT, "conflict", format!("email job {id} already exists"))
        }
        QueueStoreError::Storage(msg) => {
            tracing::error!(error = %msg, "queue store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "queue storage unavailable")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
