//! JSON payloads exchanged with bouncers.

use serde::{Deserialize, Serialize};

use crate::{DecisionId, DecisionUuid};

/// Scope value for a single address.
pub const SCOPE_IP: &str = "Ip";

/// Scope value for an address range.
pub const SCOPE_RANGE: &str = "Range";

/// A decision as sent to bouncers.
///
/// Absent string fields are omitted from the JSON rather than sent as
/// empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Store-assigned id
    pub id: DecisionId,
    /// Remaining time, e.g. `"3h59m58s"`; negative once ended
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Rule that produced the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
    /// Classification of `value` (`Ip`, `Range`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Target being acted on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Action, e.g. `ban` or `captcha`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Subsystem that issued the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Stable external identifier
    pub uuid: DecisionUuid,
}

/// Response body of a stream pull.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Decisions the bouncer should start enforcing
    pub new: Vec<Decision>,
    /// Decisions the bouncer should stop enforcing
    pub deleted: Vec<Decision>,
}

impl SyncResult {
    /// True when neither side carries anything.
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.deleted.is_empty()
    }
}

/// Response body of a delete-by-id request.
///
/// The count is a string on this endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDecisionResponse {
    /// Number of decisions removed
    pub nb_deleted: String,
}

/// Response body of a delete-by-filter request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteDecisionsResponse {
    /// Number of decisions removed
    pub nb_deleted: u64,
}

/// Error body returned on any failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable reason
    pub message: String,
}
