//! Email transports: whatever actually delivers a rendered message.

mod log;
mod smtp;

use async_trait::async_trait;

use mailq_core::EmailJobId;

pub use log::LogTransport;
pub use smtp::{SmtpSettings, SmtpTransport};

/// A fully rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// `None` for messages sent outside the queue.
    pub job_id: Option<EmailJobId>,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Delivers one message. An `Err` sends the job down the retry path.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: EmailTransport + ?Sized> EmailTransport for std::sync::Arc<T> {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        (**self).send(email).await
    }
}
