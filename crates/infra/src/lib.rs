//! Infrastructure layer: queue storage, email transports, the worker loop
//! and configuration.

pub mod config;
pub mod queue;
pub mod transport;
pub mod worker;

pub use config::{ConfigError, LogFormat, Settings, TransportSettings};
pub use queue::{
    EmailJobStore, EmailQueue, EnqueueError, InMemoryEmailJobStore, PostgresEmailJobStore,
    QueueStoreError, RetryPolicy,
};
pub use transport::{EmailTransport, LogTransport, OutboundEmail, SmtpTransport, TransportError};
pub use worker::{EmailWorker, StartOutcome, TickOutcome, WorkerConfig, WorkerError, WorkerStats};
