//! Queue boundary (mechanics only).
//!
//! The dispatch and retry layers talk to the job queue through this single
//! call. They never look at what the backend does with a job afterwards; the
//! only contract is that the backend eventually hands the same
//! `(target, attempt, action, args)` back to [`crate::Dispatcher::perform`].

use std::sync::Arc;

use courier_core::{ActionRequest, Attempt};

/// Error surfaced when a backend refuses a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The backend could not be reached.
    #[error("queue unavailable: {0}")]
    Unavailable(String),
    /// The backend refused to store the job (e.g. unserializable arguments).
    #[error("job rejected: {0}")]
    Rejected(String),
}

/// Job-queue backend.
///
/// `Send + Sync`: one backend instance is shared by every dispatcher and
/// every worker thread of the process.
pub trait QueueBackend: Send + Sync {
    /// Store `request` under `queue` for a later execution numbered `attempt`.
    fn enqueue(
        &self,
        queue: &str,
        attempt: Attempt,
        request: &ActionRequest,
    ) -> Result<(), QueueError>;
}

impl<Q> QueueBackend for Arc<Q>
where
    Q: QueueBackend + ?Sized,
{
    fn enqueue(
        &self,
        queue: &str,
        attempt: Attempt,
        request: &ActionRequest,
    ) -> Result<(), QueueError> {
        (**self).enqueue(queue, attempt, request)
    }
}
