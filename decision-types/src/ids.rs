//! Identity types for decisions and bouncers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::WireError;

/// Store-assigned identifier of a decision.
///
/// Integer primary key; only meaningful to the store that assigned it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionId(i64);

impl DecisionId {
    /// Create a DecisionId from a raw store value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this DecisionId.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl FromStr for DecisionId {
    type Err = WireError;

    /// Parse a path segment such as `"42"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| WireError::InvalidDecisionId(s.to_string()))
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecisionId({})", self.0)
    }
}

/// Store-assigned identifier of a bouncer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BouncerId(i64);

impl BouncerId {
    /// Create a BouncerId from a raw store value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this BouncerId.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BouncerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for BouncerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BouncerId({})", self.0)
    }
}

/// Stable external identifier of a decision.
///
/// UUID v4 format. Unlike [`DecisionId`] it survives the decision being
/// re-created in another store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionUuid(uuid::Uuid);

impl DecisionUuid {
    /// Create a new random DecisionUuid.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for DecisionUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for DecisionUuid {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| WireError::InvalidUuid(s.to_string()))
    }
}

impl fmt::Display for DecisionUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DecisionUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecisionUuid({})", self.0)
    }
}
