//! Deferred mail dispatch with bounded retry.
//!
//! ## Flow
//!
//! ```text
//! Dispatcher::call(action, args)
//!   ├─ excluded / unknown action -> Mailer::compose inline   (Dispatched::Inline)
//!   └─ otherwise                 -> DeferredMessage          (Dispatched::Deferred)
//!                                      │ deliver()
//!                                      ↓
//!                       QueueBackend::enqueue(queue, attempt = 1, request)
//!                                      │ later, on a worker
//!                                      ↓
//!                       Dispatcher::perform(attempt, action, args)
//!                         ├─ ok                    -> Delivered
//!                         ├─ transient, not final  -> enqueue(attempt + 1), Rescheduled
//!                         └─ exhausted / fatal     -> Err(original error)
//! ```
//!
//! ## Components
//!
//! - `Mailer` / `Message`: the unit-of-work producer this crate drives
//! - `MailerConfig`: shared, runtime-mutable settings (queue target, exclusions, retry table)
//! - `QueueBackend`: the narrow boundary to the job queue
//! - `Dispatcher`: dispatch gate and retry engine for one mailer
//! - `DeferredMessage`: handle returned in place of a composed message
//! - `MailerRegistry`: routes queued jobs back to their mailer by target type

pub mod config;
pub mod dispatch;
pub mod handle;
pub mod mailer;
pub mod queue;
pub mod registry;
pub mod retry;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{
    ConfigOverride, DEFAULT_EXCLUDED_ENVIRONMENTS, DEFAULT_QUEUE_NAME, MailerConfig, Settings,
};
pub use dispatch::{DispatchError, Dispatched, Dispatcher};
pub use handle::DeferredMessage;
pub use mailer::{Mailer, Message};
pub use queue::{QueueBackend, QueueError};
pub use registry::{MailerRegistry, Performer};
pub use retry::PerformOutcome;
