//! `mailq-core` — domain foundation for the email queue.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the `EmailJob` entity and its lifecycle, producer input validation, and the
//! clock abstraction the worker uses to stay testable.

pub mod clock;
pub mod email;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use email::{
    EmailJob, EmailStatus, FailureOutcome, JobStats, NewEmail, TemplateData, DEFAULT_MAX_ATTEMPTS,
};
pub use error::{DomainError, DomainResult};
pub use id::EmailJobId;
