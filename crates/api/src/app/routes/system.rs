use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::errors;
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(principal: Option<Extension<PrincipalContext>>) -> axum::response::Response {
    let Some(Extension(principal)) = principal else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "authentication required");
    };

    Json(serde_json::json!({
        "principal_id": principal.principal_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
    .into_response()
}
