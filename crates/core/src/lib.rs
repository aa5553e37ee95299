//! `courier-core`: delivery building blocks.
//!
//! This crate contains **pure** types shared by the dispatch and retry layers
//! (no queue, transport or configuration concerns).

pub mod attempt;
pub mod classify;
pub mod error;
pub mod id;
pub mod request;

pub use attempt::{Attempt, MAX_ATTEMPTS};
pub use classify::{BASE_RETRYABLE, ErrorClass, RetryDecision, RetryPolicy, classify};
pub use error::{DeliveryError, DeliveryResult, EnvelopeError, ErrorKind};
pub use id::{ActionName, Environment, TargetType};
pub use request::ActionRequest;
