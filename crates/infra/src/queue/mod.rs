//! The email queue: storage contract, backends, retry policy and the
//! producer-facing service.

pub mod in_memory;
pub mod policy;
pub mod postgres;
pub mod service;
pub mod store;

pub use in_memory::InMemoryEmailJobStore;
pub use policy::RetryPolicy;
pub use postgres::PostgresEmailJobStore;
pub use service::{EmailQueue, EnqueueError, DEFAULT_LIST_LIMIT};
pub use store::{EmailJobStore, QueueStoreError};
