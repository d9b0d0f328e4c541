use axum::{
    routing::{get, post},
    Router,
};

pub mod emails;
pub mod system;
pub mod worker;

/// Router for the `/api` endpoints. Authentication is optional at the
/// middleware level; each handler enforces its own role requirement.
pub fn router() -> Router {
    Router::new()
        .route("/api/whoami", get(system::whoami))
        .route(
            "/api/send-email",
            post(emails::send_email).get(emails::list_emails),
        )
        .route("/api/send-email/:id", get(emails::get_email))
        .route("/api/send-email/:id/retry", post(emails::retry_email))
        .route(
            "/api/email-worker",
            post(worker::start_worker)
                .delete(worker::stop_worker)
                .get(worker::worker_status),
        )
}
