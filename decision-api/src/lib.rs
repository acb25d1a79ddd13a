//! # decision-api
//!
//! Decision synchronization server for polling bouncers.
//!
//! Bouncers (firewalls, proxies, ...) poll this API to learn which
//! remediation decisions they must enforce and which they must lift.
//!
//! ## Architecture
//!
//! ```text
//! Bouncer ──┐   GET /v1/decisions/stream    ┌── Bouncer
//!           ├──────────────────────────────►│
//!       ┌───┴───────────────────────────────┴───┐
//!       │             decision-api              │
//!       │  auth ─► sync / lookup / deletion     │
//!       │  ┌─────────────────────┐              │
//!       │  │ SQLite (decisions)  │   relay ─────┼──► upstream
//!       │  └─────────────────────┘              │
//!       └───────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: API key resolution
//! - [`sync`]: startup and incremental stream pulls
//! - [`lookup`]: filtered queries
//! - [`deletion`] and [`broadcast`]: soft deletion and upstream forwarding
//! - [`format`]: stored records to wire decisions
//! - [`pull`]: last-pull bookkeeping
//! - [`storage`]: store contracts and the SQLite backend
//! - [`http`]: axum router

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod broadcast;
pub mod cleanup;
pub mod config;
pub mod deletion;
pub mod error;
pub mod format;
pub mod http;
pub mod limits;
pub mod lookup;
pub mod pull;
pub mod server;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;
