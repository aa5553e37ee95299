use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{ActionName, TargetType};

/// Identity and arguments of a deferred action.
///
/// This is the unit handed to the queue and reconstructed on the worker side.
///
/// Notes:
/// - **Immutable**: built once at the call site, never edited in flight.
/// - `args` are opaque to the delivery layers; only the mailer decodes them.
/// - The attempt counter is deliberately *not* part of the request; it travels
///   next to it so that re-enqueues carry the exact same request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    target: TargetType,
    action: ActionName,
    args: Vec<Value>,
}

impl ActionRequest {
    pub fn new(target: TargetType, action: ActionName, args: Vec<Value>) -> Self {
        Self {
            target,
            action,
            args,
        }
    }

    pub fn target(&self) -> &TargetType {
        &self.target
    }

    pub fn action(&self) -> &ActionName {
        &self.action
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}
