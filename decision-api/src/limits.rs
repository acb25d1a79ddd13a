//! Rate limiting for decision-api.
//!
//! Bouncers are identified by their resolved [`BouncerId`], so the keyed
//! limiter only applies after authentication. The global limiter guards the
//! whole API, including unauthenticated requests.

use crate::config::LimitsConfig;
use decision_types::BouncerId;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Type alias for a direct (non-keyed) rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiters for the API.
#[derive(Clone)]
pub struct RateLimits {
    /// Limits pulls and lookups per bouncer.
    ///
    /// Configured via `limits.pulls_per_minute`.
    bouncer_limiter: Arc<KeyedLimiter<BouncerId>>,

    /// Caps aggregate throughput even if each bouncer is within its limit.
    global_limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("bouncer_limiter", &"KeyedLimiter<BouncerId>")
            .field("global_limiter", &"DirectLimiter")
            .finish()
    }
}

impl RateLimits {
    /// Create rate limiters from configuration.
    ///
    /// Zero quotas are clamped to one request per period.
    pub fn new(config: &LimitsConfig) -> Self {
        let pulls_per_minute = NonZeroU32::new(config.pulls_per_minute).unwrap_or(NonZeroU32::MIN);
        let global_rps =
            NonZeroU32::new(config.global_requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            bouncer_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(pulls_per_minute))),
            global_limiter: Arc::new(RateLimiter::direct(Quota::per_second(global_rps))),
        }
    }

    /// Check if a pull or lookup by `bouncer` is allowed.
    pub fn check_bouncer(&self, bouncer: &BouncerId) -> Result<(), RateLimitError> {
        self.bouncer_limiter
            .check_key(bouncer)
            .map_err(|_| RateLimitError::BouncerLimitExceeded)
    }

    /// Check if the global request rate is within limits.
    pub fn check_global(&self) -> Result<(), RateLimitError> {
        self.global_limiter
            .check()
            .map_err(|_| RateLimitError::GlobalLimitExceeded)
    }

    /// Number of bouncers currently tracked (for metrics).
    pub fn bouncer_keys_count(&self) -> usize {
        self.bouncer_limiter.len()
    }

    /// Evict entries for bouncers whose quota has fully recharged.
    ///
    /// Called periodically from the cleanup task.
    pub fn shrink(&self) {
        self.bouncer_limiter.retain_recent();
    }
}

/// Rate limit error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// Too many pulls from this bouncer.
    BouncerLimitExceeded,
    /// Global request rate exceeded across all bouncers.
    GlobalLimitExceeded,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BouncerLimitExceeded => write!(f, "bouncer rate limit exceeded"),
            Self::GlobalLimitExceeded => write!(f, "global rate limit exceeded"),
        }
    }
}

impl std::error::Error for RateLimitError {}
