//! Deferred handle returned in place of a composed message.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use courier_core::{ActionRequest, Attempt, DeliveryResult};

use crate::config::MailerConfig;
use crate::mailer::{Mailer, Message};
use crate::queue::QueueError;

/// A not-yet-executed action.
///
/// - `deliver()` only enqueues; the action body does not run.
/// - Anything that needs the message (`deliver_now`, `message`, `with_message`)
///   composes it once and reuses it for the lifetime of the handle.
///
/// The handle owns no retry state; retries belong to the queued path.
pub struct DeferredMessage<M: Mailer> {
    mailer: Arc<M>,
    config: MailerConfig,
    request: ActionRequest,
    realized: OnceCell<M::Message>,
}

impl<M: Mailer> DeferredMessage<M> {
    pub fn new(mailer: Arc<M>, config: MailerConfig, request: ActionRequest) -> Self {
        Self {
            mailer,
            config,
            request,
            realized: OnceCell::new(),
        }
    }

    pub fn request(&self) -> &ActionRequest {
        &self.request
    }

    /// Whether the message has been composed already.
    pub fn is_realized(&self) -> bool {
        self.realized.get().is_some()
    }

    /// Enqueue the action as attempt 1 on the configured queue.
    pub fn deliver(&self) -> Result<(), QueueError> {
        let settings = self.config.snapshot();
        settings
            .queue_target()
            .enqueue(settings.queue_name(), Attempt::FIRST, &self.request)?;

        info!(
            mailer = %self.request.target(),
            action = %self.request.action(),
            queue = settings.queue_name(),
            "action enqueued"
        );
        Ok(())
    }

    /// Compose (if needed) and send synchronously. Never touches the queue
    /// and never retries.
    pub fn deliver_now(&self) -> DeliveryResult<()> {
        self.message()?.deliver_now()
    }

    /// The composed message, composing it on first use.
    ///
    /// A failed composition is not cached; the next call tries again.
    pub fn message(&self) -> DeliveryResult<&M::Message> {
        if let Some(message) = self.realized.get() {
            return Ok(message);
        }

        debug!(
            mailer = %self.request.target(),
            action = %self.request.action(),
            "realizing deferred message"
        );
        let message = self
            .mailer
            .compose(self.request.action(), self.request.args())?;
        Ok(self.realized.get_or_init(|| message))
    }

    /// Forward an arbitrary operation to the composed message.
    pub fn with_message<R>(&self, f: impl FnOnce(&M::Message) -> R) -> DeliveryResult<R> {
        self.message().map(f)
    }

    /// Take the composed message out of the handle.
    pub fn into_message(self) -> DeliveryResult<M::Message> {
        match self.realized.into_inner() {
            Some(message) => Ok(message),
            None => self
                .mailer
                .compose(self.request.action(), self.request.args()),
        }
    }
}

impl<M: Mailer> fmt::Debug for DeferredMessage<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredMessage")
            .field("request", &self.request)
            .field("realized", &self.is_realized())
            .finish_non_exhaustive()
    }
}
