use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::nonzero;

/// Shared pacing gate for outbound provider requests.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<DefaultDirectRateLimiter>,
}

impl RateLimiter {
    pub fn direct(quota: Quota) -> Self {
        Self {
            inner: Arc::new(DefaultDirectRateLimiter::direct(quota)),
        }
    }

    /// Allow `requests` calls per second; zero is treated as one.
    pub fn per_second(requests: u32) -> Self {
        let requests = NonZeroU32::new(requests).unwrap_or(nonzero!(1u32));
        Self::direct(Quota::per_second(requests))
    }

    pub async fn until_ready(&self) {
        self.inner.until_ready().await;
    }
}
