//! Delivery error model.

use std::borrow::Cow;
use std::fmt;
use std::io;

use thiserror::Error;

/// Result type used across the delivery layers.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Category of a delivery failure.
///
/// Retry decisions match on the category, never on the message text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Generic timeout raised by a bounded operation.
    Timeout,
    /// Timed out while opening a connection to the transport.
    OpenTimeout,
    /// Operating-system level timeout (`ETIMEDOUT`).
    TimedOut,
    ConnectionReset,
    ConnectionRefused,
    HostUnreachable,
    BrokenPipe,
    /// Generic socket failure (name resolution, aborted connection, ...).
    Socket,
    /// The peer closed the stream before the exchange finished.
    UnexpectedEof,
    /// The transport permanently rejected the message or a recipient.
    Rejected,
    /// The message could not be composed from its arguments.
    Composition,
    /// The requested action is not defined on the target.
    UnknownAction,
    /// Application-defined category. Only retried when a target declares it.
    Custom(Cow<'static, str>),
    /// Anything else.
    Other,
}

impl ErrorKind {
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Custom(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::OpenTimeout => "open_timeout",
            ErrorKind::TimedOut => "timed_out",
            ErrorKind::ConnectionReset => "connection_reset",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::HostUnreachable => "host_unreachable",
            ErrorKind::BrokenPipe => "broken_pipe",
            ErrorKind::Socket => "socket",
            ErrorKind::UnexpectedEof => "unexpected_eof",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Composition => "composition",
            ErrorKind::UnknownAction => "unknown_action",
            ErrorKind::Custom(name) => &**name,
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<io::ErrorKind> for ErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::TimedOut => ErrorKind::TimedOut,
            io::ErrorKind::ConnectionReset => ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
            io::ErrorKind::HostUnreachable => ErrorKind::HostUnreachable,
            io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof => ErrorKind::UnexpectedEof,
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::AddrNotAvailable => ErrorKind::Socket,
            _ => ErrorKind::Other,
        }
    }
}

/// Error raised while composing or delivering a message.
///
/// The retry layer propagates these unmodified: the category, message and
/// source chain seen by the queue backend are the ones the mailer produced.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct DeliveryError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl DeliveryError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, msg)
    }

    pub fn open_timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::OpenTimeout, msg)
    }

    pub fn connection_refused(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionRefused, msg)
    }

    pub fn connection_reset(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionReset, msg)
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, msg)
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Composition, msg)
    }

    pub fn unknown_action(target: impl fmt::Display, action: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::UnknownAction,
            format!("{target} does not define action `{action}`"),
        )
    }

    pub fn custom(category: impl Into<Cow<'static, str>>, msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::custom(category), msg)
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, msg)
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for DeliveryError {
    fn from(err: io::Error) -> Self {
        Self::new(err.kind().into(), err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for DeliveryError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Composition, format!("invalid action arguments: {err}"))
            .with_source(err)
    }
}

/// Errors raised while building or decoding a queued action envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Attempt counters start at 1.
    #[error("invalid attempt number: {0}")]
    InvalidAttempt(u64),

    /// A target type or action name was empty.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The stored payload does not have the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl EnvelopeError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}
