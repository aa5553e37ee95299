//! End-to-end walk through dispatch, queueing and retry against the
//! in-memory backend.
//!
//! `RUST_LOG=debug cargo run --bin courier-demo`

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Context;
use serde_json::{Value, json};
use tracing::info;

use courier_core::{ActionName, DeliveryError, DeliveryResult, TargetType};
use courier_infra::jobs::{InMemoryQueue, JobStore, QueueWorker};
use courier_mailer::{Dispatcher, Mailer, MailerConfig, MailerRegistry, Message};

/// Mailer whose transport times out on the first send.
struct DigestMailer {
    sends: Arc<AtomicU32>,
}

struct Digest {
    to: String,
    sends: Arc<AtomicU32>,
}

impl Mailer for DigestMailer {
    type Message = Digest;

    fn target_type(&self) -> TargetType {
        TargetType::new("DigestMailer")
    }

    fn action_methods(&self) -> &[&'static str] {
        &["weekly_digest"]
    }

    fn compose(&self, action: &ActionName, args: &[Value]) -> DeliveryResult<Digest> {
        if !self.recognizes(action) {
            return Err(DeliveryError::unknown_action(self.target_type(), action));
        }
        let to = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| DeliveryError::composition("weekly_digest expects a recipient"))?;
        Ok(Digest {
            to: to.to_string(),
            sends: self.sends.clone(),
        })
    }
}

impl Message for Digest {
    fn deliver_now(&self) -> DeliveryResult<()> {
        if self.sends.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(DeliveryError::timeout("smtp handshake timed out"));
        }
        info!(to = %self.to, "digest sent");
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    courier_observability::init();

    let store = InMemoryQueue::arc();
    let config = MailerConfig::from_env(store.clone());
    let queue = config.queue_name();

    let dispatcher = Dispatcher::new(
        DigestMailer {
            sends: Arc::new(AtomicU32::new(0)),
        },
        config,
    );

    let mut registry = MailerRegistry::new();
    registry.register(dispatcher.clone());

    let mail = dispatcher
        .call("weekly_digest", vec![json!("ada@example.org")])
        .context("dispatching weekly_digest")?;
    mail.deliver().context("handing weekly_digest to the queue")?;

    let worker = QueueWorker::new(store.clone(), registry);
    let reports = worker.drain(&queue).context("draining the queue")?;
    for report in &reports {
        info!(job_id = %report.job_id, attempt = report.attempt.get(), outcome = ?report.outcome, "job finished");
    }

    let stats = serde_json::to_string(&worker.stats())?;
    info!(stats = %stats, failed = store.list_failed(10)?.len(), "demo complete");
    Ok(())
}
