//! Queued job types and their wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use courier_core::{ActionName, ActionRequest, Attempt, EnvelopeError, TargetType};

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored form of a queued action.
///
/// ```json
/// {"class": "WelcomeMailer", "args": [1, "send_welcome", 42]}
/// ```
///
/// `args[0]` is the attempt counter, `args[1]` the action name, the rest are
/// the action arguments in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub class: String,
    pub args: Vec<Value>,
}

impl JobPayload {
    pub fn new(attempt: Attempt, request: &ActionRequest) -> Self {
        let mut args = Vec::with_capacity(request.args().len() + 2);
        args.push(Value::from(attempt.get()));
        args.push(Value::from(request.action().as_str()));
        args.extend(request.args().iter().cloned());

        Self {
            class: request.target().to_string(),
            args,
        }
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::malformed(e.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(raw).map_err(|e| EnvelopeError::malformed(e.to_string()))
    }

    /// Split into the attempt counter and the action request.
    pub fn into_request(self) -> Result<(Attempt, ActionRequest), EnvelopeError> {
        let target: TargetType = self.class.parse()?;

        let mut args = self.args.into_iter();
        let attempt = match args.next() {
            Some(Value::Number(n)) => {
                let n = n.as_u64().ok_or_else(|| {
                    EnvelopeError::malformed(format!("attempt {n} is not a positive integer"))
                })?;
                Attempt::try_from(n)?
            }
            Some(other) => {
                return Err(EnvelopeError::malformed(format!(
                    "attempt must be an integer, got {other}"
                )));
            }
            None => return Err(EnvelopeError::malformed("missing attempt")),
        };

        let action: ActionName = match args.next() {
            Some(Value::String(name)) => name.parse()?,
            Some(other) => {
                return Err(EnvelopeError::malformed(format!(
                    "action must be a string, got {other}"
                )));
            }
            None => return Err(EnvelopeError::malformed("missing action")),
        };

        Ok((attempt, ActionRequest::new(target, action, args.collect())))
    }
}

/// A job as handed to a worker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedJob {
    pub id: JobId,
    pub queue: String,
    pub attempt: Attempt,
    pub request: ActionRequest,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn target(&self) -> &TargetType {
        self.request.target()
    }

    pub fn action(&self) -> &ActionName {
        self.request.action()
    }

    pub fn args(&self) -> &[Value] {
        self.request.args()
    }

    pub fn payload(&self) -> JobPayload {
        JobPayload::new(self.attempt, &self.request)
    }
}

/// A job whose execution raised, kept for inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJob {
    pub id: JobId,
    pub queue: String,
    /// Raw payload as it was stored.
    pub payload: String,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl FailedJob {
    pub fn new(id: JobId, queue: impl Into<String>, payload: String, error: String) -> Self {
        Self {
            id,
            queue: queue.into(),
            payload,
            error,
            failed_at: Utc::now(),
        }
    }
}
