//! Global request budget
//!
//! A single limiter instance is shared by every listing worker and the
//! enrichment API client, so the combined request rate of the whole process
//! stays under the configured budget no matter how many workers run.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

/// Process-wide request limiter with a per-minute budget
pub struct RequestLimiter {
    inner: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    per_minute: u32,
}

impl RequestLimiter {
    /// Creates a limiter allowing at most `per_minute` requests in any
    /// trailing minute. A zero budget is clamped to one request per minute.
    pub fn new(per_minute: u32) -> Self {
        let rate = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::new(1).unwrap());
        Self {
            inner: RateLimiter::direct(Quota::per_minute(rate)),
            per_minute: rate.get(),
        }
    }

    /// Blocks the calling task until one more request fits the budget.
    /// Never fails; only delays.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }

    /// The configured per-minute budget
    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }
}
