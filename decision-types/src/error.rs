//! Error types for the decision wire format.

use thiserror::Error;

/// Errors raised while parsing wire-level values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Decision id is not a valid integer
    #[error("decision_id must be valid integer: {0:?}")]
    InvalidDecisionId(String),

    /// Decision UUID could not be parsed
    #[error("invalid decision uuid: {0:?}")]
    InvalidUuid(String),

    /// Duration string could not be parsed
    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),
}
