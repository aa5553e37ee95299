//! Error classification and the bounded-retry decision.
//!
//! ## Retryable set
//!
//! A failure is **transient** when its [`ErrorKind`] is either in
//! [`BASE_RETRYABLE`] (network-level trouble talking to the transport) or in
//! the additional set a target type declared for itself. Anything else is
//! **fatal** and is never retried, whatever the attempt number.
//!
//! ## Decision
//!
//! [`RetryPolicy::decide`] is the whole state machine of a queued execution
//! that failed:
//!
//! ```text
//! transient, attempt < MAX_ATTEMPTS  -> Retry(attempt + 1)
//! transient, attempt >= MAX_ATTEMPTS -> Exhausted
//! fatal                              -> Fatal
//! ```

use crate::attempt::Attempt;
use crate::error::{DeliveryError, ErrorKind};

/// Categories every target type retries.
pub const BASE_RETRYABLE: [ErrorKind; 9] = [
    ErrorKind::Timeout,
    ErrorKind::OpenTimeout,
    ErrorKind::TimedOut,
    ErrorKind::ConnectionReset,
    ErrorKind::ConnectionRefused,
    ErrorKind::HostUnreachable,
    ErrorKind::BrokenPipe,
    ErrorKind::Socket,
    ErrorKind::UnexpectedEof,
];

/// Outcome of classifying a failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Eligible for re-enqueue.
    Transient,
    /// Must propagate immediately.
    Fatal,
}

/// Classify an error category against the base set plus `additional`.
pub fn classify(kind: &ErrorKind, additional: &[ErrorKind]) -> ErrorClass {
    if BASE_RETRYABLE.contains(kind) || additional.contains(kind) {
        ErrorClass::Transient
    } else {
        ErrorClass::Fatal
    }
}

/// What the retry engine must do with a failed execution.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue with this attempt counter and swallow the error.
    Retry(Attempt),
    /// Transient, but this was the last allowed attempt: re-raise.
    Exhausted,
    /// Not retryable: re-raise.
    Fatal,
}

/// Retryable set of a single target type.
///
/// The base set is implicit; only the target-specific extension is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    additional: Vec<ErrorKind>,
}

impl RetryPolicy {
    /// Policy retrying only [`BASE_RETRYABLE`].
    pub fn base() -> Self {
        Self::default()
    }

    pub fn with_additional(additional: impl IntoIterator<Item = ErrorKind>) -> Self {
        Self {
            additional: additional.into_iter().collect(),
        }
    }

    pub fn additional(&self) -> &[ErrorKind] {
        &self.additional
    }

    pub fn classify(&self, kind: &ErrorKind) -> ErrorClass {
        classify(kind, &self.additional)
    }

    pub fn is_retryable(&self, err: &DeliveryError) -> bool {
        self.classify(err.kind()) == ErrorClass::Transient
    }

    pub fn decide(&self, err: &DeliveryError, attempt: Attempt) -> RetryDecision {
        match self.classify(err.kind()) {
            ErrorClass::Fatal => RetryDecision::Fatal,
            ErrorClass::Transient if attempt.is_final() => RetryDecision::Exhausted,
            ErrorClass::Transient => RetryDecision::Retry(attempt.next()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::MAX_ATTEMPTS;

    fn attempt(n: u32) -> Attempt {
        Attempt::new(n).unwrap()
    }

    #[test]
    fn every_base_category_is_transient() {
        let policy = RetryPolicy::base();
        for kind in &BASE_RETRYABLE {
            assert_eq!(policy.classify(kind), ErrorClass::Transient, "{kind}");
        }
    }

    #[test]
    fn unknown_categories_are_fatal() {
        let policy = RetryPolicy::base();
        assert_eq!(policy.classify(&ErrorKind::Other), ErrorClass::Fatal);
        assert_eq!(policy.classify(&ErrorKind::Rejected), ErrorClass::Fatal);
        assert_eq!(policy.classify(&ErrorKind::custom("throttled")), ErrorClass::Fatal);
    }

    #[test]
    fn additional_categories_extend_the_base_set() {
        let policy = RetryPolicy::with_additional([ErrorKind::custom("throttled")]);
        assert_eq!(policy.classify(&ErrorKind::custom("throttled")), ErrorClass::Transient);
        assert_eq!(policy.classify(&ErrorKind::Timeout), ErrorClass::Transient);
        assert_eq!(policy.classify(&ErrorKind::custom("other")), ErrorClass::Fatal);
    }

    #[test]
    fn classification_ignores_message_text() {
        let policy = RetryPolicy::base();
        let looks_like_timeout = DeliveryError::other("connection timed out");
        assert!(!policy.is_retryable(&looks_like_timeout));
    }

    #[test]
    fn connection_setup_failures_are_retryable() {
        let policy = RetryPolicy::base();
        let open = DeliveryError::open_timeout("smtp connect timed out");
        let refused = DeliveryError::connection_refused("port 587 closed");

        assert_eq!(open.kind(), &ErrorKind::OpenTimeout);
        assert_eq!(refused.kind(), &ErrorKind::ConnectionRefused);
        assert!(policy.is_retryable(&open));
        assert!(policy.is_retryable(&refused));
    }

    #[test]
    fn transient_errors_retry_until_the_ceiling() {
        let policy = RetryPolicy::base();
        let err = DeliveryError::timeout("read timeout");

        assert_eq!(policy.decide(&err, attempt(1)), RetryDecision::Retry(attempt(2)));
        assert_eq!(policy.decide(&err, attempt(2)), RetryDecision::Retry(attempt(3)));
        assert_eq!(policy.decide(&err, attempt(3)), RetryDecision::Exhausted);
    }

    #[test]
    fn fatal_errors_never_retry() {
        let policy = RetryPolicy::base();
        let err = DeliveryError::rejected("550 mailbox unavailable");

        for n in 1..=MAX_ATTEMPTS {
            assert_eq!(policy.decide(&err, attempt(n)), RetryDecision::Fatal);
        }
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_kind() -> impl Strategy<Value = ErrorKind> {
            prop_oneof![
                (0..BASE_RETRYABLE.len()).prop_map(|i| BASE_RETRYABLE[i].clone()),
                Just(ErrorKind::Rejected),
                Just(ErrorKind::Composition),
                Just(ErrorKind::UnknownAction),
                Just(ErrorKind::Other),
                "[a-z_]{1,12}".prop_map(ErrorKind::custom),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: a retry always carries exactly the next attempt number
            /// and never exceeds the ceiling.
            #[test]
            fn retry_advances_by_exactly_one(kind in any_kind(), n in 1u32..10) {
                let policy = RetryPolicy::base();
                let err = DeliveryError::new(kind, "failure");

                if let RetryDecision::Retry(next) = policy.decide(&err, attempt(n)) {
                    prop_assert_eq!(next.get(), n + 1);
                    prop_assert!(next.get() <= MAX_ATTEMPTS);
                }
            }

            /// Property: following the decisions from attempt 1 executes a
            /// persistently failing action at most MAX_ATTEMPTS times.
            #[test]
            fn executions_are_bounded(kind in any_kind()) {
                let policy = RetryPolicy::base();
                let err = DeliveryError::new(kind.clone(), "failure");

                let mut current = Attempt::FIRST;
                let mut executions = 1;
                while let RetryDecision::Retry(next) = policy.decide(&err, current) {
                    current = next;
                    executions += 1;
                }

                prop_assert!(executions <= MAX_ATTEMPTS);
                if policy.classify(&kind) == ErrorClass::Transient {
                    prop_assert_eq!(executions, MAX_ATTEMPTS);
                } else {
                    prop_assert_eq!(executions, 1);
                }
            }
        }
    }
}
