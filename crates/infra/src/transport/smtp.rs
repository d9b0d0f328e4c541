use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

use super::{EmailTransport, OutboundEmail, TransportError};

/// Connection settings for an SMTP relay.
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl core::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("from", &self.from)
            .finish()
    }
}

/// Delivers through an SMTP relay as multipart/alternative (text + html).
#[derive(Clone)]
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpTransport {
    /// Port 465 uses implicit TLS, anything else STARTTLS.
    pub fn new(settings: &SmtpSettings) -> Result<Self, TransportError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| TransportError::InvalidAddress(format!("{}: {e}", settings.from)))?;

        let builder = if settings.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|e| TransportError::Build(e.to_string()))?
        .port(settings.port);

        let builder = match (&settings.username, &settings.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_message(&self, email: &OutboundEmail) -> Result<Message, TransportError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| TransportError::InvalidAddress(format!("{}: {e}", email.to)))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str());

        // Stable across retries so receivers can drop duplicates.
        if let Some(job_id) = email.job_id {
            builder = builder.message_id(Some(message_id(&job_id.to_string(), &self.from)));
        }

        builder
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| TransportError::Build(e.to_string()))
    }
}

fn message_id(job_id: &str, from: &Mailbox) -> String {
    format!("<{}@{}>", job_id, from.email.domain())
}

impl core::fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SmtpTransport")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    #[instrument(skip(self, email), fields(to = %email.to), err)]
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        let message = self.build_message(email)?;
        let response = self
            .mailer
            .send(message)
            .await
            .map_err(|e| TransportError::Delivery(e.to_string()))?;
        debug!(code = %response.code(), "smtp relay accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailq_core::EmailJobId;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "localhost".into(),
            port: 2525,
            username: None,
            password: Some("hunter2".into()),
            from: "noreply@accucoder.com".into(),
        }
    }

    fn outbound(to: &str) -> OutboundEmail {
        OutboundEmail {
            job_id: Some(EmailJobId::new()),
            to: to.into(),
            subject: "Welcome".into(),
            html: "<p>Hi</p>".into(),
            text: "Hi".into(),
        }
    }

    #[tokio::test]
    async fn builds_multipart_message_with_job_message_id() {
        let transport = SmtpTransport::new(&settings()).unwrap();
        let email = outbound("ada@example.com");

        let raw = String::from_utf8(transport.build_message(&email).unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains(&format!("<{}@accucoder.com>", email.job_id.unwrap())));
    }

    #[tokio::test]
    async fn rejects_bad_recipient() {
        let transport = SmtpTransport::new(&settings()).unwrap();
        assert!(matches!(
            transport.build_message(&outbound("not-an-address")),
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", settings());
        assert!(!rendered.contains("hunter2"));
    }
}
