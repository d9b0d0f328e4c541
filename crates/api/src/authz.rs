//! API-side authorization guard.
//!
//! Handlers call this before touching the queue or the worker, keeping the
//! infrastructure layer auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use mailq_auth::authorize_admin;

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// 401 when the request is anonymous, 403 when the caller is not an admin.
pub fn require_admin(principal: Option<&PrincipalContext>) -> Result<(), Response> {
    let Some(principal) = principal else {
        return Err(json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "authentication required",
        ));
    };

    authorize_admin(&principal.to_principal())
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}
