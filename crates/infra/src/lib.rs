//! Infrastructure layer: queue backends and workers.

pub mod jobs;

pub use jobs::{InMemoryQueue, JobStore, QueueWorker, WorkerConfig, WorkerHandle};
