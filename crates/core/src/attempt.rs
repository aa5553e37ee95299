//! Attempt counter carried alongside a queued action.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// Maximum number of executions of a single queued action (attempts `1..=3`).
pub const MAX_ATTEMPTS: u32 = 3;

/// 1-based execution counter of a queued action.
///
/// The counter only moves forward, by exactly one per re-enqueue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Attempt(NonZeroU32);

impl Attempt {
    /// The attempt used by a fresh `deliver()`.
    pub const FIRST: Attempt = Attempt(NonZeroU32::MIN);

    pub fn new(n: u32) -> Result<Self, EnvelopeError> {
        NonZeroU32::new(n)
            .map(Self)
            .ok_or(EnvelopeError::InvalidAttempt(u64::from(n)))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The counter for the re-enqueued job.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Whether this execution is the last one allowed.
    pub fn is_final(self) -> bool {
        self.get() >= MAX_ATTEMPTS
    }
}

impl Default for Attempt {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<u64> for Attempt {
    type Error = EnvelopeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        let n = u32::try_from(value).map_err(|_| EnvelopeError::InvalidAttempt(value))?;
        Self::new(n)
    }
}

impl From<Attempt> for u64 {
    fn from(value: Attempt) -> Self {
        u64::from(value.get())
    }
}

impl From<Attempt> for u32 {
    fn from(value: Attempt) -> Self {
        value.get()
    }
}
