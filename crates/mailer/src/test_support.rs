//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use courier_core::{
    ActionName, ActionRequest, Attempt, DeliveryError, DeliveryResult, ErrorKind, TargetType,
};

use crate::mailer::{Mailer, Message};
use crate::queue::{QueueBackend, QueueError};

/// One recorded `enqueue` call.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueCall {
    pub queue: String,
    pub attempt: u32,
    pub request: ActionRequest,
}

/// Queue backend that only records what it was given.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    calls: Mutex<Vec<EnqueueCall>>,
    refuse: bool,
}

impl RecordingQueue {
    pub fn refusing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            refuse: true,
        }
    }

    pub fn calls(&self) -> Vec<EnqueueCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl QueueBackend for RecordingQueue {
    fn enqueue(
        &self,
        queue: &str,
        attempt: Attempt,
        request: &ActionRequest,
    ) -> Result<(), QueueError> {
        if self.refuse {
            return Err(QueueError::Unavailable("queue offline".to_string()));
        }
        self.calls.lock().unwrap().push(EnqueueCall {
            queue: queue.to_string(),
            attempt: attempt.get(),
            request: request.clone(),
        });
        Ok(())
    }
}

/// Counters shared between a [`TestMailer`] and the messages it composes.
#[derive(Debug, Default)]
pub struct Probe {
    pub composed: AtomicUsize,
    pub delivered: AtomicUsize,
    failures: Mutex<VecDeque<ErrorKind>>,
}

impl Probe {
    pub fn composed(&self) -> usize {
        self.composed.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Make the next deliveries fail with these categories, in order.
    pub fn fail_with(&self, kinds: impl IntoIterator<Item = ErrorKind>) {
        self.failures.lock().unwrap().extend(kinds);
    }
}

/// Mailer with one dispatchable action, `send_welcome(user_id)`.
#[derive(Debug, Clone)]
pub struct TestMailer {
    name: &'static str,
    pub probe: Arc<Probe>,
}

impl TestMailer {
    pub fn new() -> Self {
        Self::named("WelcomeMailer")
    }

    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            probe: Arc::new(Probe::default()),
        }
    }
}

#[derive(Debug)]
pub struct TestMessage {
    pub to: String,
    pub subject: String,
    probe: Arc<Probe>,
}

impl Message for TestMessage {
    fn deliver_now(&self) -> DeliveryResult<()> {
        if let Some(kind) = self.probe.failures.lock().unwrap().pop_front() {
            return Err(DeliveryError::new(kind, format!("delivery to {} failed", self.to)));
        }
        self.probe.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Mailer for TestMailer {
    type Message = TestMessage;

    fn target_type(&self) -> TargetType {
        TargetType::new(self.name)
    }

    fn action_methods(&self) -> &[&'static str] {
        &["send_welcome"]
    }

    fn compose(&self, action: &ActionName, args: &[Value]) -> DeliveryResult<TestMessage> {
        if !self.recognizes(action) {
            return Err(DeliveryError::unknown_action(self.name, action));
        }
        self.probe.composed.fetch_add(1, Ordering::SeqCst);

        let user_id: u64 = match args.first() {
            Some(v) => serde_json::from_value(v.clone())?,
            None => return Err(DeliveryError::composition("send_welcome expects a user id")),
        };

        Ok(TestMessage {
            to: format!("user-{user_id}@example.org"),
            subject: "Welcome".to_string(),
            probe: self.probe.clone(),
        })
    }
}
