//! Queue-invoked entry point with bounded retry.

use serde_json::Value;
use tracing::{error, info, warn};

use courier_core::{
    ActionName, ActionRequest, Attempt, DeliveryError, DeliveryResult, RetryDecision,
};

use crate::dispatch::Dispatcher;
use crate::mailer::{Mailer, Message};

/// How a `perform` call terminated normally.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PerformOutcome {
    /// The message was composed and sent.
    Delivered,
    /// A transient failure was swallowed and the job re-enqueued.
    Rescheduled { next_attempt: Attempt },
}

impl<M: Mailer> Dispatcher<M> {
    /// Execute a queued action: compose a fresh message and send it.
    ///
    /// On failure exactly one of these happens:
    /// - transient and `attempt < MAX_ATTEMPTS`: re-enqueue as `attempt + 1`
    ///   and return `Ok(Rescheduled)`;
    /// - transient at the final attempt, or fatal: return the original error
    ///   unmodified and enqueue nothing.
    pub fn perform(
        &self,
        attempt: Attempt,
        action: &ActionName,
        args: &[Value],
    ) -> DeliveryResult<PerformOutcome> {
        let target = self.mailer().target_type();

        let err = match self.execute(action, args) {
            Ok(()) => return Ok(PerformOutcome::Delivered),
            Err(err) => err,
        };

        // Read once: the policy and the queue used for a re-enqueue come from
        // the same snapshot.
        let settings = self.config().snapshot();
        match settings.retry_policy(&target).decide(&err, attempt) {
            RetryDecision::Retry(next_attempt) => {
                let request = ActionRequest::new(target, action.clone(), args.to_vec());
                if let Err(queue_err) =
                    settings
                        .queue_target()
                        .enqueue(settings.queue_name(), next_attempt, &request)
                {
                    error!(
                        mailer = %request.target(),
                        action = %action,
                        attempt = attempt.get(),
                        error = %err,
                        queue_error = %queue_err,
                        "failed to re-enqueue after transient error"
                    );
                    return Err(err);
                }

                info!(
                    mailer = %request.target(),
                    action = %action,
                    attempt = attempt.get(),
                    next_attempt = next_attempt.get(),
                    error = %err,
                    "transient delivery failure; rescheduled"
                );
                Ok(PerformOutcome::Rescheduled { next_attempt })
            }
            RetryDecision::Exhausted => {
                warn!(
                    mailer = %target,
                    action = %action,
                    attempt = attempt.get(),
                    error = %err,
                    "retries exhausted"
                );
                Err(err)
            }
            RetryDecision::Fatal => {
                warn!(
                    mailer = %target,
                    action = %action,
                    attempt = attempt.get(),
                    error = %err,
                    "fatal delivery failure"
                );
                Err(err)
            }
        }
    }

    fn execute(&self, action: &ActionName, args: &[Value]) -> DeliveryResult<()> {
        let mailer = self.mailer();
        if !mailer.recognizes(action) {
            return Err(DeliveryError::unknown_action(mailer.target_type(), action));
        }
        mailer.compose(action, args)?.deliver_now()
    }
}
