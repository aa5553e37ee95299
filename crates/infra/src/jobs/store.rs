//! Job storage implementations.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::warn;

use courier_core::{ActionRequest, Attempt};
use courier_mailer::{QueueBackend, QueueError};

use super::types::{FailedJob, JobId, JobPayload, QueuedJob};

/// Job store abstraction: the worker-facing side of a queue backend.
pub trait JobStore: QueueBackend {
    /// Claim the oldest job of `queue`. Returns None if the queue is empty.
    fn claim_next(&self, queue: &str) -> Result<Option<QueuedJob>, JobStoreError>;

    /// Record a job whose execution raised.
    fn fail(&self, job: &QueuedJob, error: String) -> Result<(), JobStoreError>;

    /// Number of jobs waiting in `queue`.
    fn pending(&self, queue: &str) -> Result<usize, JobStoreError>;

    /// Failed jobs, oldest first.
    fn list_failed(&self, limit: usize) -> Result<Vec<FailedJob>, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone)]
struct StoredJob {
    id: JobId,
    queue: String,
    payload: String,
    enqueued_at: DateTime<Utc>,
}

/// In-memory job store for tests/dev.
///
/// Jobs are kept in their encoded wire form and decoded when claimed, so
/// everything a worker sees went through the same serialization a real
/// backend would apply. Payloads that fail to decode go straight to the
/// failed list.
///
/// Poisoned locks are recovered: every critical section is a single push, pop
/// or scan.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    jobs: Mutex<VecDeque<StoredJob>>,
    failed: Mutex<Vec<FailedJob>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Total number of pending jobs across queues.
    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.jobs).is_empty()
    }

    /// Store an already-encoded payload. Used to replay jobs captured elsewhere.
    pub fn push_raw(&self, queue: impl Into<String>, payload: impl Into<String>) -> JobId {
        let id = JobId::new();
        lock(&self.jobs).push_back(StoredJob {
            id,
            queue: queue.into(),
            payload: payload.into(),
            enqueued_at: Utc::now(),
        });
        id
    }

    pub fn clear(&self) {
        lock(&self.jobs).clear();
        lock(&self.failed).clear();
    }
}

impl QueueBackend for InMemoryQueue {
    fn enqueue(
        &self,
        queue: &str,
        attempt: Attempt,
        request: &ActionRequest,
    ) -> Result<(), QueueError> {
        let payload = JobPayload::new(attempt, request)
            .encode()
            .map_err(|e| QueueError::Rejected(e.to_string()))?;

        lock(&self.jobs).push_back(StoredJob {
            id: JobId::new(),
            queue: queue.to_string(),
            payload,
            enqueued_at: Utc::now(),
        });
        Ok(())
    }
}

impl JobStore for InMemoryQueue {
    fn claim_next(&self, queue: &str) -> Result<Option<QueuedJob>, JobStoreError> {
        loop {
            let stored = {
                let mut jobs = lock(&self.jobs);
                let Some(pos) = jobs.iter().position(|j| j.queue == queue) else {
                    return Ok(None);
                };
                match jobs.remove(pos) {
                    Some(stored) => stored,
                    None => return Ok(None),
                }
            };

            match decode(&stored) {
                Ok(job) => return Ok(Some(job)),
                Err(e) => {
                    warn!(
                        job_id = %stored.id,
                        queue = %stored.queue,
                        error = %e,
                        "discarding undecodable job"
                    );
                    let failed =
                        FailedJob::new(stored.id, stored.queue, stored.payload, e.to_string());
                    lock(&self.failed).push(failed);
                }
            }
        }
    }

    fn fail(&self, job: &QueuedJob, error: String) -> Result<(), JobStoreError> {
        let payload = job
            .payload()
            .encode()
            .map_err(|e| JobStoreError::Storage(e.to_string()))?;

        lock(&self.failed).push(FailedJob::new(job.id, job.queue.clone(), payload, error));
        Ok(())
    }

    fn pending(&self, queue: &str) -> Result<usize, JobStoreError> {
        let jobs = lock(&self.jobs);
        Ok(jobs.iter().filter(|j| j.queue == queue).count())
    }

    fn list_failed(&self, limit: usize) -> Result<Vec<FailedJob>, JobStoreError> {
        let failed = lock(&self.failed);
        Ok(failed.iter().take(limit).cloned().collect())
    }
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn claim_next(&self, queue: &str) -> Result<Option<QueuedJob>, JobStoreError> {
        (**self).claim_next(queue)
    }

    fn fail(&self, job: &QueuedJob, error: String) -> Result<(), JobStoreError> {
        (**self).fail(job, error)
    }

    fn pending(&self, queue: &str) -> Result<usize, JobStoreError> {
        (**self).pending(queue)
    }

    fn list_failed(&self, limit: usize) -> Result<Vec<FailedJob>, JobStoreError> {
        (**self).list_failed(limit)
    }
}

fn decode(stored: &StoredJob) -> Result<QueuedJob, courier_core::EnvelopeError> {
    let (attempt, request) = JobPayload::decode(&stored.payload)?.into_request()?;
    Ok(QueuedJob {
        id: stored.id,
        queue: stored.queue.clone(),
        attempt,
        request,
        enqueued_at: stored.enqueued_at,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
