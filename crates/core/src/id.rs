//! Named identifiers used across dispatch, queueing and retry.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// Identity of a target type (the mailer able to produce a unit of work).
///
/// This is the value written to the queue and used to route a job back
/// to its mailer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetType(String);

/// Name of an action defined on a target type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionName(String);

macro_rules! impl_name_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        /// Parsing rejects blank names; use it for values read back from storage.
        impl FromStr for $t {
            type Err = EnvelopeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.trim().is_empty() {
                    return Err(EnvelopeError::InvalidName(format!("{}: empty", $name)));
                }
                Ok(Self(s.to_string()))
            }
        }
    };
}

impl_name_newtype!(TargetType, "TargetType");
impl_name_newtype!(ActionName, "ActionName");

/// Runtime environment name (`development`, `test`, `production`, ...).
///
/// Always held in canonical form: trimmed and lowercased, so `" Test"` and
/// `"test"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Environment(String);

impl Environment {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn development() -> Self {
        Self::new("development")
    }

    pub fn test() -> Self {
        Self::new("test")
    }
}

impl core::fmt::Display for Environment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Environment {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Environment {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<Environment> for String {
    fn from(value: Environment) -> Self {
        value.0
    }
}
