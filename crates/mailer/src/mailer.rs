use serde_json::Value;

use courier_core::{ActionName, DeliveryResult, TargetType};

/// A target type able to turn `(action, args)` into a deliverable message.
///
/// Implementations own composition (templates, headers, recipients); this
/// crate only decides *when* composition and delivery happen.
pub trait Mailer: Send + Sync + 'static {
    type Message: Message;

    /// Identity written to the queue and used to route jobs back here.
    fn target_type(&self) -> TargetType;

    /// Actions that may be deferred through the queue.
    fn action_methods(&self) -> &[&'static str];

    /// Run the action body and build the message.
    ///
    /// This is the expensive, possibly side-effecting step. It is also the
    /// mailer's native behavior for names outside `action_methods`.
    fn compose(&self, action: &ActionName, args: &[Value]) -> DeliveryResult<Self::Message>;

    fn recognizes(&self, action: &ActionName) -> bool {
        self.action_methods().contains(&action.as_str())
    }
}

/// A composed, deliverable message.
pub trait Message {
    /// Send the message through the real transport, synchronously.
    fn deliver_now(&self) -> DeliveryResult<()>;
}
