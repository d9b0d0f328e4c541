use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use mailq_infra::StartOutcome;

use crate::app::dto::{MessageResponse, WorkerStatusResponse};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz::require_admin;
use crate::context::PrincipalContext;

pub async fn start_worker(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(principal.as_ref().map(|Extension(p)| p)) {
        return resp;
    }

    let message = match services.worker().start() {
        StartOutcome::Started => "Email worker started",
        StartOutcome::AlreadyRunning => "Email worker is already running",
    };
    Json(MessageResponse { success: true, message }).into_response()
}

pub async fn stop_worker(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(principal.as_ref().map(|Extension(p)| p)) {
        return resp;
    }

    services.worker().stop();
    Json(MessageResponse {
        success: true,
        message: "Email worker stopped",
    })
    .into_response()
}

pub async fn worker_status(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
) -> axum::response::Response {
    if let Err(resp) = require_admin(principal.as_ref().map(|Extension(p)| p)) {
        return resp;
    }

    let queue = match services.queue().stats().await {
        Ok(q) => q,
        Err(e) => return errors::store_error_to_response(e),
    };

    Json(WorkerStatusResponse {
        success: true,
        running: services.worker().is_running(),
        stats: services.worker().stats(),
        queue,
    })
    .into_response()
}
