use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{EmailTransport, OutboundEmail, TransportError};

const PREVIEW_CHARS: usize = 100;

/// Development transport: logs the message instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogTransport {
    delay: Duration,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate provider latency on every send.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        info!(
            job_id = ?email.job_id.map(|id| id.to_string()),
            to = %email.to,
            subject = %email.subject,
            preview = %preview(&email.text),
            "email delivered (log transport)"
        );
        Ok(())
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
