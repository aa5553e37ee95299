//! Routing of queued jobs back to their mailer.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use courier_core::{ActionName, Attempt, DeliveryResult, TargetType};

use crate::dispatch::Dispatcher;
use crate::mailer::Mailer;
use crate::retry::PerformOutcome;

/// Type-erased retry entry point of one target type.
pub trait Performer: Send + Sync {
    fn target_type(&self) -> TargetType;

    fn perform(
        &self,
        attempt: Attempt,
        action: &ActionName,
        args: &[Value],
    ) -> DeliveryResult<PerformOutcome>;
}

impl<M: Mailer> Performer for Dispatcher<M> {
    fn target_type(&self) -> TargetType {
        self.mailer().target_type()
    }

    fn perform(
        &self,
        attempt: Attempt,
        action: &ActionName,
        args: &[Value],
    ) -> DeliveryResult<PerformOutcome> {
        Dispatcher::perform(self, attempt, action, args)
    }
}

/// Table of performers keyed by target type.
#[derive(Default, Clone)]
pub struct MailerRegistry {
    performers: HashMap<TargetType, Arc<dyn Performer>>,
}

impl MailerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dispatcher` under its target type, replacing any previous
    /// registration for that type.
    pub fn register<M: Mailer>(&mut self, dispatcher: Dispatcher<M>) -> &mut Self {
        self.register_performer(Arc::new(dispatcher))
    }

    pub fn register_performer(&mut self, performer: Arc<dyn Performer>) -> &mut Self {
        self.performers.insert(performer.target_type(), performer);
        self
    }

    pub fn get(&self, target: &TargetType) -> Option<&Arc<dyn Performer>> {
        self.performers.get(target)
    }

    pub fn contains(&self, target: &TargetType) -> bool {
        self.performers.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.performers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.performers.is_empty()
    }
}

impl std::fmt::Debug for MailerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailerRegistry")
            .field("target_types", &self.performers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailerConfig;
    use crate::test_support::{RecordingQueue, TestMailer};
    use serde_json::json;

    #[test]
    fn routes_by_target_type() {
        let queue = Arc::new(RecordingQueue::default());
        let config = MailerConfig::new(queue);
        let welcome = TestMailer::named("WelcomeMailer");
        let billing = TestMailer::named("BillingMailer");

        let mut registry = MailerRegistry::new();
        registry
            .register(Dispatcher::new(welcome.clone(), config.clone()))
            .register(Dispatcher::new(billing.clone(), config));

        let performer = registry.get(&TargetType::new("BillingMailer")).unwrap();
        let outcome = performer
            .perform(Attempt::FIRST, &ActionName::new("send_welcome"), &[json!(7)])
            .unwrap();

        assert_eq!(outcome, PerformOutcome::Delivered);
        assert_eq!(billing.probe.delivered(), 1);
        assert_eq!(welcome.probe.delivered(), 0);
        assert_eq!(registry.len(), 2);
        assert!(registry.get(&TargetType::new("Missing")).is_none());
        assert!(!registry.contains(&TargetType::new("Missing")));
    }

    #[test]
    fn registering_a_target_twice_replaces_it() {
        let config = MailerConfig::new(Arc::new(RecordingQueue::default()));
        let first = TestMailer::new();
        let second = TestMailer::new();

        let mut registry = MailerRegistry::new();
        registry
            .register(Dispatcher::new(first.clone(), config.clone()))
            .register(Dispatcher::new(second.clone(), config));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(&TargetType::new("WelcomeMailer")));

        registry
            .get(&TargetType::new("WelcomeMailer"))
            .unwrap()
            .perform(Attempt::FIRST, &ActionName::new("send_welcome"), &[json!(1)])
            .unwrap();
        assert_eq!(first.probe.delivered(), 0);
        assert_eq!(second.probe.delivered(), 1);
    }
}
