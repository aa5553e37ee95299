//! Job queue: storage of queued mailer actions and the worker that runs them.
//!
//! ## Components
//!
//! - `JobPayload`: the stored wire form, `{"class": target, "args": [attempt, action, ...]}`
//! - `JobStore`: worker-facing side of a queue backend
//! - `InMemoryQueue`: process-local backend for tests and development
//! - `QueueWorker`: claims jobs and routes them through a `MailerRegistry`

pub mod store;
pub mod types;
pub mod worker;

pub use store::{InMemoryQueue, JobStore, JobStoreError};
pub use types::{FailedJob, JobId, JobPayload, QueuedJob};
pub use worker::{
    JobOutcome, JobReport, QueueWorker, WorkerConfig, WorkerError, WorkerHandle, WorkerStats,
};
