//! # decision-types
//!
//! Wire format types for bouncer decision synchronization.
//!
//! This crate provides the types shared between the decision API and its
//! consumers:
//! - [`DecisionId`], [`BouncerId`], [`DecisionUuid`] - Identity types
//! - [`Decision`], [`SyncResult`] - Payloads sent to bouncers
//! - [`format_duration`] / [`parse_duration`] - Signed duration strings
//! - [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod duration;
mod error;
mod ids;
mod wire;

pub use duration::{format_duration, parse_duration};
pub use error::WireError;
pub use ids::{BouncerId, DecisionId, DecisionUuid};
pub use wire::{
    Decision, DeleteDecisionResponse, DeleteDecisionsResponse, ErrorResponse, SyncResult,
    SCOPE_IP, SCOPE_RANGE,
};
