//! Dispatch gate: run an action now or hand back a deferred handle.
//!
//! ```text
//! call(action, args)
//!   ↓
//! 1. deliveries excluded (switch off, or current environment excluded)?
//!      yes -> compose inline, exactly as the mailer would without this layer
//!   ↓
//! 2. action in the mailer's dispatchable set?
//!      no  -> compose inline (the mailer's native behavior)
//!   ↓
//! 3. DeferredMessage bound to (target, action, args); nothing runs yet
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use courier_core::{ActionName, ActionRequest, DeliveryError, DeliveryResult};

use crate::config::MailerConfig;
use crate::handle::DeferredMessage;
use crate::mailer::{Mailer, Message};
use crate::queue::QueueError;

/// Failure of [`Dispatched::deliver`].
///
/// Both variants are transparent: the underlying error is not renamed.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The queue refused the deferred job.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// Inline composition or delivery failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Dispatch gate and retry engine for one mailer.
///
/// Cheap to clone; the mailer and the settings are shared.
pub struct Dispatcher<M: Mailer> {
    mailer: Arc<M>,
    config: MailerConfig,
}

impl<M: Mailer> Dispatcher<M> {
    pub fn new(mailer: M, config: MailerConfig) -> Self {
        Self::from_arc(Arc::new(mailer), config)
    }

    pub fn from_arc(mailer: Arc<M>, config: MailerConfig) -> Self {
        Self { mailer, config }
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    pub fn config(&self) -> &MailerConfig {
        &self.config
    }

    /// Queue name the next enqueue will use.
    pub fn queue(&self) -> String {
        self.config.queue_name()
    }

    /// Whether calls currently bypass the queue.
    pub fn is_excluded(&self) -> bool {
        self.config.deliveries_excluded()
    }

    /// Invoke `action` with `args`.
    ///
    /// Deferred calls never fail here; errors surface when the handle is
    /// forced. Inline calls return whatever the mailer's `compose` returns.
    pub fn call(
        &self,
        action: impl Into<ActionName>,
        args: Vec<Value>,
    ) -> DeliveryResult<Dispatched<M>> {
        let action = action.into();
        let target = self.mailer.target_type();

        if self.is_excluded() {
            debug!(mailer = %target, action = %action, "deliveries excluded; composing inline");
            return self.mailer.compose(&action, &args).map(Dispatched::Inline);
        }

        if !self.mailer.recognizes(&action) {
            debug!(mailer = %target, action = %action, "not a dispatchable action; passing through");
            return self.mailer.compose(&action, &args).map(Dispatched::Inline);
        }

        debug!(mailer = %target, action = %action, "deferring action");
        let request = ActionRequest::new(target, action, args);
        Ok(Dispatched::Deferred(DeferredMessage::new(
            self.mailer.clone(),
            self.config.clone(),
            request,
        )))
    }
}

impl<M: Mailer> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            mailer: self.mailer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<M: Mailer> fmt::Debug for Dispatcher<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("target", &self.mailer.target_type())
            .finish_non_exhaustive()
    }
}

/// Result of [`Dispatcher::call`].
pub enum Dispatched<M: Mailer> {
    /// Queue-backed handle; nothing has run yet.
    Deferred(DeferredMessage<M>),
    /// Message composed synchronously (excluded context or pass-through).
    Inline(M::Message),
}

impl<M: Mailer> Dispatched<M> {
    /// Enqueue a deferred handle, or send an inline message right away.
    pub fn deliver(&self) -> Result<(), DispatchError> {
        match self {
            Dispatched::Deferred(handle) => Ok(handle.deliver()?),
            Dispatched::Inline(message) => Ok(message.deliver_now()?),
        }
    }

    /// Send synchronously, bypassing the queue.
    pub fn deliver_now(&self) -> DeliveryResult<()> {
        match self {
            Dispatched::Deferred(handle) => handle.deliver_now(),
            Dispatched::Inline(message) => message.deliver_now(),
        }
    }

    /// The composed message, composing it first if still deferred.
    pub fn message(&self) -> DeliveryResult<&M::Message> {
        match self {
            Dispatched::Deferred(handle) => handle.message(),
            Dispatched::Inline(message) => Ok(message),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Dispatched::Deferred(_))
    }

    pub fn as_deferred(&self) -> Option<&DeferredMessage<M>> {
        match self {
            Dispatched::Deferred(handle) => Some(handle),
            Dispatched::Inline(_) => None,
        }
    }
}

impl<M: Mailer> fmt::Debug for Dispatched<M>
where
    M::Message: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatched::Deferred(handle) => f.debug_tuple("Deferred").field(handle).finish(),
            Dispatched::Inline(message) => f.debug_tuple("Inline").field(message).finish(),
        }
    }
}
