//! Email worker: polls the queue store, dispatches due jobs, records outcomes.
//!
//! One `tick` claims at most `max_concurrent` due jobs, sends them
//! concurrently and waits for all of them to settle. `start` runs ticks on an
//! interval until `stop` is called.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

use mailq_core::{Clock, DomainError, EmailJob, FailureOutcome, NewEmail, SystemClock};
use mailq_templates::{render_email, strip_html, EmailContent};

use crate::queue::{EmailJobStore, QueueStoreError, RetryPolicy};
use crate::transport::{EmailTransport, OutboundEmail, TransportError};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Wait between polls
    pub poll_interval: Duration,
    /// Upper bound on jobs claimed (and sent concurrently) per tick
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
    /// Name for logging
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            max_concurrent: 5,
            retry: RetryPolicy::default(),
            name: "email-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub ticks: u64,
    pub jobs_claimed: u64,
    pub jobs_sent: u64,
    pub jobs_retried: u64,
    pub jobs_failed: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
}

/// Result of a single poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickOutcome {
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] QueueStoreError),
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    Sent,
    Retried,
    Failed,
    /// The job was not in `sending` when it came back; nothing recorded.
    Skipped,
}

/// Background email worker. Cheap to clone; clones share state.
pub struct EmailWorker<S, T> {
    inner: Arc<Inner<S, T>>,
}

impl<S, T> Clone for EmailWorker<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<S, T> {
    store: S,
    transport: T,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
    running: AtomicBool,
    /// Bumped by every `start`; a loop exits once it no longer owns the
    /// current generation, so a quick stop/start never leaves two loops.
    generation: AtomicU64,
    wake: Notify,
    stats: Mutex<WorkerStats>,
}

impl<S, T> EmailWorker<S, T>
where
    S: EmailJobStore + 'static,
    T: EmailTransport + 'static,
{
    pub fn new(store: S, transport: T, config: WorkerConfig) -> Self {
        Self::with_clock(store, transport, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, transport: T, config: WorkerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                transport,
                clock,
                config,
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                wake: Notify::new(),
                stats: Mutex::new(WorkerStats::default()),
            }),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> WorkerStats {
        self.inner
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Spawn the polling loop on the current tokio runtime.
    pub fn start(&self) -> StartOutcome {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!(worker = %self.inner.config.name, "email worker already running");
            return StartOutcome::AlreadyRunning;
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            worker = %self.inner.config.name,
            poll_interval_ms = self.inner.config.poll_interval.as_millis() as u64,
            max_concurrent = self.inner.config.max_concurrent,
            "email worker started"
        );

        let worker = self.clone();
        tokio::spawn(async move { worker.run(generation).await });
        StartOutcome::Started
    }

    /// Ask the loop to exit. In-flight sends finish their current attempt.
    pub fn stop(&self) {
        let was_running = self.inner.running.swap(false, Ordering::SeqCst);
        self.inner.wake.notify_waiters();
        if was_running {
            info!(worker = %self.inner.config.name, "email worker stopping");
        }
    }

    fn owns(&self, generation: u64) -> bool {
        self.inner.running.load(Ordering::SeqCst)
            && self.inner.generation.load(Ordering::SeqCst) == generation
    }

    async fn run(self, generation: u64) {
        loop {
            if !self.owns(generation) {
                break;
            }

            if let Err(e) = self.tick().await {
                warn!(worker = %self.inner.config.name, error = %e, "email queue poll failed");
            }

            // Register for the wake-up before re-checking so a `stop` landing
            // in between is not missed.
            let notified = self.inner.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.owns(generation) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.inner.config.poll_interval) => {}
                _ = &mut notified => {}
            }
        }

        info!(worker = %self.inner.config.name, "email worker stopped");
    }

    /// One poll: claim a batch, send it concurrently, record every outcome.
    #[instrument(skip(self), fields(worker = %self.inner.config.name))]
    pub async fn tick(&self) -> Result<TickOutcome, WorkerError> {
        let now = self.inner.clock.now();
        let batch = self
            .inner
            .store
            .claim_due(now, self.inner.config.max_concurrent)
            .await?;

        let mut outcome = TickOutcome {
            claimed: batch.len(),
            ..TickOutcome::default()
        };

        if !batch.is_empty() {
            debug!(claimed = batch.len(), "dispatching email batch");
        }

        let results = join_all(batch.into_iter().map(|job| self.dispatch(job))).await;
        for result in results {
            match result {
                Dispatch::Sent => outcome.sent += 1,
                Dispatch::Retried => outcome.retried += 1,
                Dispatch::Failed => outcome.failed += 1,
                Dispatch::Skipped => {}
            }
        }

        let mut stats = self.inner.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.ticks += 1;
        stats.jobs_claimed += outcome.claimed as u64;
        stats.jobs_sent += outcome.sent as u64;
        stats.jobs_retried += outcome.retried as u64;
        stats.jobs_failed += outcome.failed as u64;
        stats.last_tick_at = Some(now);

        Ok(outcome)
    }

    fn dispatch(&self, mut job: EmailJob) -> impl Future<Output = Dispatch> + '_ {
        async move {
            let email = render(&job, self.inner.clock.now());

            let (result, dispatch) = match self.inner.transport.send(&email).await {
                Ok(()) => {
                    let result = job.mark_sent(self.inner.clock.now());
                    if result.is_ok() {
                        info!(job_id = %job.id, to = %job.to, "email sent");
                    }
                    (result, Dispatch::Sent)
                }
                Err(e) => {
                    let retry = &self.inner.config.retry;
                    match job.record_failure(e.to_string(), self.inner.clock.now(), |prior| {
                        retry.chrono_delay_for(prior)
                    }) {
                        Ok(FailureOutcome::Retry { at }) => {
                            warn!(
                                job_id = %job.id,
                                attempts = job.attempts,
                                max_attempts = job.max_attempts,
                                retry_at = %at,
                                error = %e,
                                "email send failed; retry scheduled"
                            );
                            (Ok(()), Dispatch::Retried)
                        }
                        Ok(FailureOutcome::Exhausted) => {
                            error!(
                                job_id = %job.id,
                                attempts = job.attempts,
                                error = %e,
                                "email send failed; attempts exhausted"
                            );
                            (Ok(()), Dispatch::Failed)
                        }
                        Err(err) => (Err(err), Dispatch::Failed),
                    }
                }
            };

            if let Err(e) = result {
                error!(job_id = %job.id, error = %e, "claimed job in unexpected state");
                return Dispatch::Skipped;
            }

            if let Err(e) = self.inner.store.update(&job).await {
                error!(job_id = %job.id, status = %job.status, error = %e, "failed to record email outcome");
            }
            dispatch
        }
    }

    /// Render and deliver immediately, bypassing the queue. Single attempt,
    /// nothing persisted.
    #[instrument(skip(self, email), fields(to = %email.to), err)]
    pub async fn send_now(&self, email: NewEmail) -> Result<(), WorkerError> {
        email.validate()?;

        let now = self.inner.clock.now();
        let html = render_email(EmailContent::from(&email), now.year());
        let outbound = OutboundEmail {
            job_id: None,
            to: email.to.trim().to_string(),
            subject: email.subject.clone(),
            text: strip_html(&html),
            html,
        };
        self.inner.transport.send(&outbound).await?;
        Ok(())
    }
}

fn render(job: &EmailJob, now: DateTime<Utc>) -> OutboundEmail {
    let html = render_email(EmailContent::from(job), now.year());
    OutboundEmail {
        job_id: Some(job.id),
        to: job.to.clone(),
        subject: job.subject.clone(),
        text: strip_html(&html),
        html,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryEmailJobStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use mailq_core::{EmailStatus, ManualClock};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutboundEmail>>,
        failures_left: AtomicUsize,
        /// Recipient that is always refused.
        reject_to: Option<String>,
    }

    impl RecordingTransport {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                ..Self::default()
            }
        }

        fn rejecting(to: &str) -> Self {
            Self {
                reject_to: Some(to.to_string()),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<OutboundEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmailTransport for RecordingTransport {
        async fn send(&self, email: &OutboundEmail) -> Result<(), TransportError> {
            if self.reject_to.as_deref() == Some(email.to.as_str()) {
                return Err(TransportError::Delivery("mailbox unavailable".into()));
            }
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(TransportError::Delivery("relay unavailable".into()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    /// In-memory store whose claims and updates can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryEmailJobStore,
        claim_failures: AtomicUsize,
        claim_calls: AtomicUsize,
        fail_updates: AtomicBool,
    }

    impl FlakyStore {
        fn storage_error(op: &str) -> QueueStoreError {
            QueueStoreError::Storage(format!("{op}: connection reset"))
        }
    }

    #[async_trait]
    impl EmailJobStore for FlakyStore {
        async fn insert(&self, job: EmailJob) -> Result<mailq_core::EmailJobId, QueueStoreError> {
            self.inner.insert(job).await
        }

        async fn get(&self, id: mailq_core::EmailJobId) -> Result<Option<EmailJob>, QueueStoreError> {
            self.inner.get(id).await
        }

        async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<EmailJob>, QueueStoreError> {
            self.claim_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.claim_failures.load(Ordering::SeqCst);
            if left > 0 {
                self.claim_failures.store(left - 1, Ordering::SeqCst);
                return Err(Self::storage_error("claim"));
            }
            self.inner.claim_due(now, limit).await
        }

        async fn update(&self, job: &EmailJob) -> Result<(), QueueStoreError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(Self::storage_error("update"));
            }
            self.inner.update(job).await
        }

        async fn list(&self, status: Option<EmailStatus>, limit: usize) -> Result<Vec<EmailJob>, QueueStoreError> {
            self.inner.list(status, limit).await
        }

        async fn retry_failed(
            &self,
            id: mailq_core::EmailJobId,
            now: DateTime<Utc>,
        ) -> Result<EmailJob, QueueStoreError> {
            self.inner.retry_failed(id, now).await
        }

        async fn stats(&self) -> Result<mailq_core::JobStats, QueueStoreError> {
            self.inner.stats().await
        }
    }

    type TestWorker = EmailWorker<Arc<InMemoryEmailJobStore>, Arc<RecordingTransport>>;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn setup(transport: RecordingTransport) -> (TestWorker, Arc<InMemoryEmailJobStore>, Arc<RecordingTransport>, ManualClock) {
        let store = InMemoryEmailJobStore::arc();
        let transport = Arc::new(transport);
        let clock = ManualClock::new(t0());
        let worker = EmailWorker::with_clock(
            store.clone(),
            transport.clone(),
            WorkerConfig::default(),
            Arc::new(clock.clone()),
        );
        (worker, store, transport, clock)
    }

    async fn enqueue(store: &InMemoryEmailJobStore, email: NewEmail, now: DateTime<Utc>) -> EmailJob {
        let job = email.into_job(now, 3).unwrap();
        store.insert(job.clone()).await.unwrap();
        job
    }

    #[tokio::test]
    async fn successful_send_marks_sent_once() {
        let (worker, store, transport, clock) = setup(RecordingTransport::default());
        let job = enqueue(&store, NewEmail::new("ada@example.com", "Hello", "Body"), t0()).await;

        let outcome = worker.tick().await.unwrap();
        assert_eq!(outcome, TickOutcome { claimed: 1, sent: 1, retried: 0, failed: 0 });

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailStatus::Sent);
        assert_eq!(stored.sent_at, Some(t0()));
        assert!(stored.error.is_none());

        clock.advance(chrono::Duration::hours(1));
        assert_eq!(worker.tick().await.unwrap().claimed, 0);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn failures_back_off_then_exhaust() {
        let (worker, store, _transport, clock) = setup(RecordingTransport::failing(usize::MAX));
        let job = enqueue(&store, NewEmail::new("ada@example.com", "Hello", "Body"), t0()).await;

        // Attempt 1 fails: retry in one minute.
        assert_eq!(worker.tick().await.unwrap().retried, 1);
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailStatus::Pending);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.scheduled_for, t0() + chrono::Duration::seconds(60));
        assert_eq!(stored.error.as_deref(), Some("delivery failed: relay unavailable"));

        // Not due yet.
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(worker.tick().await.unwrap().claimed, 0);

        // Attempt 2 fails: retry in two minutes.
        clock.set(t0() + chrono::Duration::seconds(60));
        assert_eq!(worker.tick().await.unwrap().retried, 1);
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.scheduled_for, t0() + chrono::Duration::seconds(180));

        // Attempt 3 fails: terminal.
        clock.set(t0() + chrono::Duration::seconds(180));
        assert_eq!(worker.tick().await.unwrap().failed, 1);
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailStatus::Failed);
        assert_eq!(stored.attempts, 3);

        clock.advance(chrono::Duration::days(1));
        assert_eq!(worker.tick().await.unwrap().claimed, 0);

        let stats = worker.stats();
        assert_eq!(stats.jobs_retried, 2);
        assert_eq!(stats.jobs_failed, 1);
    }

    #[tokio::test]
    async fn transient_failure_then_success_clears_error() {
        let (worker, store, _transport, clock) = setup(RecordingTransport::failing(1));
        let job = enqueue(&store, NewEmail::new("ada@example.com", "Hello", "Body"), t0()).await;

        worker.tick().await.unwrap();
        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(worker.tick().await.unwrap().sent, 1);

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailStatus::Sent);
        assert_eq!(stored.attempts, 1);
        assert!(stored.error.is_none());
    }

    #[tokio::test]
    async fn two_failures_then_success_on_third_attempt() {
        let (worker, store, transport, clock) = setup(RecordingTransport::failing(2));
        let job = enqueue(&store, NewEmail::new("ada@example.com", "Hello", "Body"), t0()).await;

        assert_eq!(worker.tick().await.unwrap().retried, 1);
        let first_retry = t0() + chrono::Duration::minutes(1);
        assert_eq!(store.get(job.id).await.unwrap().unwrap().scheduled_for, first_retry);

        clock.set(first_retry);
        assert_eq!(worker.tick().await.unwrap().retried, 1);
        let second_retry = first_retry + chrono::Duration::minutes(2);
        assert_eq!(store.get(job.id).await.unwrap().unwrap().scheduled_for, second_retry);

        clock.set(second_retry);
        assert_eq!(worker.tick().await.unwrap().sent, 1);

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailStatus::Sent);
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.sent_at, Some(second_retry));
        assert!(stored.error.is_none());
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn backoff_keeps_doubling_for_long_attempt_budgets() {
        let (worker, store, _transport, clock) = setup(RecordingTransport::failing(usize::MAX));
        let job = NewEmail::new("ada@example.com", "Hello", "Body")
            .with_max_attempts(15)
            .into_job(t0(), 3)
            .unwrap();
        store.insert(job.clone()).await.unwrap();

        let mut failed_at = t0();
        for failure in 1..=14u32 {
            assert_eq!(worker.tick().await.unwrap().retried, 1, "failure {failure}");
            let stored = store.get(job.id).await.unwrap().unwrap();
            assert_eq!(stored.attempts, failure);
            let expected = chrono::Duration::minutes(1 << (failure - 1));
            assert_eq!(stored.scheduled_for - failed_at, expected, "failure {failure}");

            failed_at = stored.scheduled_for;
            clock.set(failed_at);
        }

        assert_eq!(worker.tick().await.unwrap().failed, 1);
        assert_eq!(store.get(job.id).await.unwrap().unwrap().status, EmailStatus::Failed);
    }

    #[tokio::test]
    async fn one_failing_recipient_does_not_affect_the_batch() {
        let (worker, store, transport, _clock) = setup(RecordingTransport::rejecting("bob@example.com"));
        let ada = enqueue(&store, NewEmail::new("ada@example.com", "Hello", "Body"), t0()).await;
        let bob = enqueue(&store, NewEmail::new("bob@example.com", "Hello", "Body"), t0()).await;
        let cy = enqueue(&store, NewEmail::new("cy@example.com", "Hello", "Body"), t0()).await;

        let outcome = worker.tick().await.unwrap();
        assert_eq!(outcome, TickOutcome { claimed: 3, sent: 2, retried: 1, failed: 0 });

        for id in [ada.id, cy.id] {
            let stored = store.get(id).await.unwrap().unwrap();
            assert_eq!(stored.status, EmailStatus::Sent);
            assert!(stored.error.is_none());
        }
        let bob = store.get(bob.id).await.unwrap().unwrap();
        assert_eq!(bob.status, EmailStatus::Pending);
        assert_eq!(bob.attempts, 1);
        assert_eq!(bob.error.as_deref(), Some("delivery failed: mailbox unavailable"));
        assert_eq!(transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn failed_outcome_write_is_logged_and_tick_completes() {
        let store = Arc::new(FlakyStore::default());
        let transport = Arc::new(RecordingTransport::default());
        let clock = ManualClock::new(t0());
        let worker = EmailWorker::with_clock(
            store.clone(),
            transport.clone(),
            WorkerConfig::default(),
            Arc::new(clock.clone()),
        );
        let job = enqueue(&store.inner, NewEmail::new("ada@example.com", "Hello", "Body"), t0()).await;
        store.fail_updates.store(true, Ordering::SeqCst);

        let outcome = worker.tick().await.unwrap();
        assert_eq!(outcome, TickOutcome { claimed: 1, sent: 1, retried: 0, failed: 0 });
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(worker.stats().jobs_sent, 1);

        // The outcome never landed, so the row is left in `sending`.
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailStatus::Sending);
    }

    #[tokio::test]
    async fn claim_errors_do_not_stop_the_loop() {
        let store = Arc::new(FlakyStore {
            claim_failures: AtomicUsize::new(2),
            ..FlakyStore::default()
        });
        let transport = Arc::new(RecordingTransport::default());
        let worker = EmailWorker::new(
            store.clone(),
            transport.clone(),
            WorkerConfig::default().with_poll_interval(Duration::from_millis(10)),
        );
        enqueue(&store.inner, NewEmail::new("ada@example.com", "Hello", "Body"), Utc::now()).await;

        assert!(worker.tick().await.is_err());

        worker.start();
        for _ in 0..200 {
            if worker.stats().jobs_sent == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(worker.is_running());
        assert_eq!(worker.stats().jobs_sent, 1);
        assert!(store.claim_calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(transport.sent().len(), 1);
        worker.stop();
    }

    #[tokio::test]
    async fn batch_is_bounded_by_max_concurrent() {
        let (worker, store, transport, _clock) = setup(RecordingTransport::default());
        for i in 0..7 {
            let email = NewEmail::new(format!("user{i}@example.com"), "Hello", "Body");
            enqueue(&store, email, t0() - chrono::Duration::seconds(10 - i)).await;
        }

        assert_eq!(worker.tick().await.unwrap().claimed, 5);
        assert_eq!(worker.tick().await.unwrap().claimed, 2);

        // Oldest first.
        let recipients: Vec<_> = transport.sent().into_iter().map(|e| e.to).collect();
        assert_eq!(recipients[0], "user0@example.com");
        assert_eq!(recipients.len(), 7);
    }

    #[tokio::test]
    async fn templated_job_renders_html_and_text() {
        let (worker, store, transport, _clock) = setup(RecordingTransport::default());
        let data = [("firstName".to_string(), serde_json::json!("Ada"))].into_iter().collect();
        let email = NewEmail::new("ada@example.com", "Welcome", "unused").with_template("welcome", data);
        let job = enqueue(&store, email, t0()).await;

        worker.tick().await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].job_id, Some(job.id));
        assert!(sent[0].html.contains("Hi Ada,"));
        assert!(!sent[0].text.contains('<'));
    }

    #[tokio::test]
    async fn default_envelope_uses_clock_year() {
        let (worker, store, transport, _clock) = setup(RecordingTransport::default());
        enqueue(&store, NewEmail::new("ada@example.com", "Update", "New codes"), t0()).await;

        worker.tick().await.unwrap();
        assert!(transport.sent()[0].html.contains("&copy; 2026 AccuCoder"));
    }

    #[tokio::test]
    async fn send_now_bypasses_queue() {
        let (worker, store, transport, _clock) = setup(RecordingTransport::default());

        worker
            .send_now(NewEmail::new("ada@example.com", "Now", "Immediately"))
            .await
            .unwrap();
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.sent()[0].job_id, None);
        assert_eq!(store.stats().await.unwrap().total, 0);

        let err = worker
            .send_now(NewEmail::new("bad", "Now", "Immediately"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Validation(_)));
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_halts_the_loop() {
        let store = InMemoryEmailJobStore::arc();
        let transport = Arc::new(RecordingTransport::default());
        let worker = EmailWorker::new(
            store.clone(),
            transport.clone(),
            WorkerConfig::default().with_poll_interval(Duration::from_millis(10)),
        );
        enqueue(&store, NewEmail::new("ada@example.com", "Hello", "Body"), Utc::now()).await;

        assert_eq!(worker.start(), StartOutcome::Started);
        assert_eq!(worker.start(), StartOutcome::AlreadyRunning);
        assert!(worker.is_running());

        for _ in 0..200 {
            if worker.stats().jobs_sent == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(worker.stats().jobs_sent, 1);

        worker.stop();
        assert!(!worker.is_running());
        tokio::time::sleep(Duration::from_millis(30)).await;
        let ticks = worker.stats().ticks;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(worker.stats().ticks, ticks);

        // Restart after stop.
        assert_eq!(worker.start(), StartOutcome::Started);
        worker.stop();
    }
}
