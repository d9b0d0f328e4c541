//! Service wiring: queue store, transport, producer queue and worker.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use mailq_infra::{
    EmailJobStore, EmailQueue, EmailTransport, EmailWorker, InMemoryEmailJobStore, LogTransport,
    PostgresEmailJobStore, Settings, SmtpTransport, TransportSettings, WorkerConfig,
};

pub type DynStore = Arc<dyn EmailJobStore>;
pub type DynTransport = Arc<dyn EmailTransport>;
pub type Worker = EmailWorker<DynStore, DynTransport>;

/// Everything the HTTP handlers need, shared via `Extension<Arc<AppServices>>`.
#[derive(Clone)]
pub struct AppServices {
    queue: EmailQueue<DynStore>,
    worker: Worker,
}

impl AppServices {
    pub fn new(
        store: DynStore,
        transport: DynTransport,
        worker_config: WorkerConfig,
        default_max_attempts: u32,
    ) -> Self {
        let queue = EmailQueue::new(store.clone()).with_default_max_attempts(default_max_attempts);
        let worker = EmailWorker::new(store, transport, worker_config);
        Self { queue, worker }
    }

    /// In-memory store and log transport; what tests and local runs use.
    pub fn in_memory(worker_config: WorkerConfig) -> Self {
        Self::new(
            InMemoryEmailJobStore::arc(),
            Arc::new(LogTransport::new()),
            worker_config,
            mailq_core::DEFAULT_MAX_ATTEMPTS,
        )
    }

    pub fn queue(&self) -> &EmailQueue<DynStore> {
        &self.queue
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }
}

/// Build services from configuration: Postgres when `DATABASE_URL` is set,
/// otherwise the in-memory store.
pub async fn build_services(settings: &Settings) -> anyhow::Result<AppServices> {
    let store: DynStore = match &settings.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            let store = PostgresEmailJobStore::new(pool);
            store
                .ensure_schema()
                .await
                .context("failed to create email_queue schema")?;
            tracing::info!("using postgres email queue store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; queued emails are kept in memory only");
            InMemoryEmailJobStore::arc()
        }
    };

    let transport: DynTransport = match &settings.transport {
        TransportSettings::Log { delay } => {
            tracing::info!(delay_ms = delay.as_millis() as u64, "using log email transport");
            Arc::new(LogTransport::new().with_delay(*delay))
        }
        TransportSettings::Smtp(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "using smtp email transport");
            Arc::new(SmtpTransport::new(smtp).context("invalid SMTP configuration")?)
        }
    };

    Ok(AppServices::new(
        store,
        transport,
        settings.worker.clone(),
        settings.default_max_attempts,
    ))
}
