//! Queue worker: claims jobs and hands them to the mailer's retry engine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use courier_core::Attempt;
use courier_mailer::{DEFAULT_QUEUE_NAME, MailerRegistry, PerformOutcome};

use super::store::{JobStore, JobStoreError};
use super::types::{JobId, QueuedJob};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often to poll an empty queue
    pub poll_interval: Duration,
    /// Queue to work
    pub queue: String,
    /// Name for logging and the worker thread
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            queue: DEFAULT_QUEUE_NAME.to_string(),
            name: "courier-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Worker error.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Delivered,
    Rescheduled { next_attempt: Attempt },
    /// The retry engine raised; the job was moved to the failed list.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: JobId,
    pub attempt: Attempt,
    pub outcome: JobOutcome,
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkerStats {
    pub jobs_processed: u64,
    pub jobs_delivered: u64,
    pub jobs_rescheduled: u64,
    pub jobs_failed: u64,
    pub uptime_secs: u64,
}

/// Handle to control a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the current job to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    /// Get current worker statistics.
    pub fn stats(&self) -> WorkerStats {
        lock(&self.stats).clone()
    }
}

/// Background queue worker.
///
/// Claims jobs from a store, routes each one to the performer registered for
/// its target type and records jobs whose execution raised. Retry decisions
/// are entirely the performer's; the worker never re-enqueues on its own.
pub struct QueueWorker<S: JobStore> {
    store: S,
    registry: MailerRegistry,
    stats: Arc<Mutex<WorkerStats>>,
}

impl<S: JobStore + 'static> QueueWorker<S> {
    pub fn new(store: S, registry: MailerRegistry) -> Self {
        Self {
            store,
            registry,
            stats: Arc::new(Mutex::new(WorkerStats::default())),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> WorkerStats {
        lock(&self.stats).clone()
    }

    /// Claim and execute a single job of `queue`.
    ///
    /// Returns None when the queue is empty.
    pub fn work_one(&self, queue: &str) -> Result<Option<JobReport>, WorkerError> {
        let Some(job) = self.store.claim_next(queue)? else {
            return Ok(None);
        };

        debug!(
            job_id = %job.id,
            mailer = %job.target(),
            action = %job.action(),
            attempt = job.attempt.get(),
            "claimed job"
        );

        let outcome = self.execute(&job);
        self.record(&outcome);

        Ok(Some(JobReport {
            job_id: job.id,
            attempt: job.attempt,
            outcome,
        }))
    }

    /// Work `queue` until it is empty, including jobs rescheduled meanwhile.
    pub fn drain(&self, queue: &str) -> Result<Vec<JobReport>, WorkerError> {
        let mut reports = Vec::new();
        while let Some(report) = self.work_one(queue)? {
            reports.push(report);
        }
        Ok(reports)
    }

    /// Spawn the worker in a background thread.
    pub fn spawn(self, config: WorkerConfig) -> Result<WorkerHandle, WorkerError>
    where
        S: Send,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = self.stats.clone();

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker_loop(self, config, shutdown_rx))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }

    fn execute(&self, job: &QueuedJob) -> JobOutcome {
        let Some(performer) = self.registry.get(job.target()) else {
            let error = format!("no mailer registered for target type {}", job.target());
            warn!(job_id = %job.id, error = %error, "no performer for job");
            return self.mark_failed(job, error);
        };

        match performer.perform(job.attempt, job.action(), job.args()) {
            Ok(PerformOutcome::Delivered) => {
                debug!(job_id = %job.id, "job delivered");
                JobOutcome::Delivered
            }
            Ok(PerformOutcome::Rescheduled { next_attempt }) => {
                JobOutcome::Rescheduled { next_attempt }
            }
            Err(err) => {
                let error = err.to_string();
                warn!(job_id = %job.id, attempt = job.attempt.get(), error = %error, "job failed");
                self.mark_failed(job, error)
            }
        }
    }

    /// The job is already claimed; a store that cannot record it only gets logged.
    fn mark_failed(&self, job: &QueuedJob, error: String) -> JobOutcome {
        if let Err(store_err) = self.store.fail(job, error.clone()) {
            error!(
                job_id = %job.id,
                error = %error,
                store_error = %store_err,
                "failed to record failed job"
            );
        }
        JobOutcome::Failed { error }
    }

    fn record(&self, outcome: &JobOutcome) {
        let mut s = lock(&self.stats);
        s.jobs_processed += 1;
        match outcome {
            JobOutcome::Delivered => s.jobs_delivered += 1,
            JobOutcome::Rescheduled { .. } => s.jobs_rescheduled += 1,
            JobOutcome::Failed { .. } => s.jobs_failed += 1,
        }
    }
}

fn worker_loop<S: JobStore + 'static>(
    worker: QueueWorker<S>,
    config: WorkerConfig,
    shutdown_rx: mpsc::Receiver<()>,
) {
    info!(worker = %config.name, queue = %config.queue, "queue worker started");
    let start_time = Instant::now();

    loop {
        // Check for shutdown
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        lock(&worker.stats).uptime_secs = start_time.elapsed().as_secs();

        match worker.work_one(&config.queue) {
            Ok(Some(_)) => {}
            Ok(None) => thread::sleep(config.poll_interval),
            Err(e) => {
                error!(worker = %config.name, error = %e, "failed to work job");
                thread::sleep(config.poll_interval);
            }
        }
    }

    info!(worker = %config.name, "queue worker stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryQueue;
    use courier_core::{ActionName, ActionRequest, TargetType};
    use crate::jobs::types::FailedJob;
    use courier_mailer::{QueueBackend, QueueError};
    use serde_json::json;

    #[test]
    fn unregistered_targets_are_failed() {
        let store = InMemoryQueue::arc();
        let worker = QueueWorker::new(store.clone(), MailerRegistry::new());

        let request = ActionRequest::new(
            TargetType::new("GhostMailer"),
            ActionName::new("send_welcome"),
            vec![json!(1)],
        );
        store.enqueue("mailer", Attempt::FIRST, &request).unwrap();

        let report = worker.work_one("mailer").unwrap().unwrap();
        assert!(matches!(report.outcome, JobOutcome::Failed { .. }));
        assert_eq!(store.list_failed(10).unwrap().len(), 1);
        assert_eq!(worker.stats().jobs_failed, 1);
    }

    /// Store whose failed list is unavailable.
    struct NoFailedList(InMemoryQueue);

    impl QueueBackend for NoFailedList {
        fn enqueue(
            &self,
            queue: &str,
            attempt: Attempt,
            request: &ActionRequest,
        ) -> Result<(), QueueError> {
            self.0.enqueue(queue, attempt, request)
        }
    }

    impl JobStore for NoFailedList {
        fn claim_next(&self, queue: &str) -> Result<Option<QueuedJob>, JobStoreError> {
            self.0.claim_next(queue)
        }

        fn fail(&self, _job: &QueuedJob, _error: String) -> Result<(), JobStoreError> {
            Err(JobStoreError::Storage("failed list offline".to_string()))
        }

        fn pending(&self, queue: &str) -> Result<usize, JobStoreError> {
            self.0.pending(queue)
        }

        fn list_failed(&self, _limit: usize) -> Result<Vec<FailedJob>, JobStoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn failing_to_record_a_failure_still_reports_it() {
        let store = Arc::new(NoFailedList(InMemoryQueue::new()));
        let worker = QueueWorker::new(store.clone(), MailerRegistry::new());

        let request = ActionRequest::new(
            TargetType::new("GhostMailer"),
            ActionName::new("send_welcome"),
            vec![json!(2)],
        );
        store.enqueue("mailer", Attempt::FIRST, &request).unwrap();

        let report = worker.work_one("mailer").unwrap().unwrap();
        assert!(matches!(report.outcome, JobOutcome::Failed { .. }));
        assert_eq!(worker.stats().jobs_processed, 1);
        assert_eq!(worker.stats().jobs_failed, 1);
        assert_eq!(store.pending("mailer").unwrap(), 0);
    }

    #[test]
    fn empty_queue_yields_nothing() {
        let worker = QueueWorker::new(InMemoryQueue::arc(), MailerRegistry::new());
        assert!(worker.work_one("mailer").unwrap().is_none());
        assert!(worker.drain("mailer").unwrap().is_empty());
    }
}
