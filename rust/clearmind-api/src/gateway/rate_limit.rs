//! Per-user rate limiting using governor.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::config::RateLimitConfig;
use crate::error::ApiError;

/// Rate limiter type alias.
pub type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Bucket key for requests without a session (login, public shares).
const ANONYMOUS: &str = "anonymous";

struct Bucket {
    limiter: Arc<DirectRateLimiter>,
    last_seen: Instant,
}

/// One token bucket per caller.
pub struct UserRateLimiters {
    limiters: Mutex<HashMap<String, Bucket>>,
    quota: Quota,
    /// Time for an empty bucket to fill back up.
    refill: Duration,
    enabled: bool,
}

impl std::fmt::Debug for UserRateLimiters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRateLimiters")
            .field("callers", &self.limiters.lock().len())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl UserRateLimiters {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));

        Self {
            limiters: Mutex::new(HashMap::new()),
            quota,
            refill: quota.replenish_interval() * quota.burst_size().get(),
            enabled: true,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let mut limiters = Self::new(config.per_minute, config.burst);
        limiters.enabled = config.enabled;
        limiters
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get or create the limiter for a caller.
    pub fn get_or_create(&self, key: &str) -> Arc<DirectRateLimiter> {
        let mut limiters = self.limiters.lock();
        let now = Instant::now();

        if let Some(bucket) = limiters.get_mut(key) {
            bucket.last_seen = now;
            return Arc::clone(&bucket.limiter);
        }

        let limiter = Arc::new(RateLimiter::direct(self.quota));
        limiters.insert(
            key.to_string(),
            Bucket {
                limiter: Arc::clone(&limiter),
                last_seen: now,
            },
        );
        limiter
    }

    /// Number of callers with a bucket.
    pub fn tracked(&self) -> usize {
        self.limiters.lock().len()
    }

    /// Drops buckets untouched for a full refill period; they would be full
    /// again anyway. Returns how many were dropped.
    pub fn prune(&self, now: Instant) -> usize {
        let mut limiters = self.limiters.lock();
        let before = limiters.len();
        limiters.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < self.refill);
        before - limiters.len()
    }

    /// Takes one token for `key`, or returns the seconds until one frees up.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        match self.get_or_create(key).check() {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(DefaultClock::default().now());
                Err(wait.as_secs().max(1))
            }
        }
    }
}

/// Periodically drops idle callers' buckets.
pub fn spawn_pruner(limiters: Arc<UserRateLimiters>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let pruned = limiters.prune(Instant::now());
            if pruned > 0 {
                tracing::debug!(pruned, remaining = limiters.tracked(), "Pruned idle rate limit buckets");
            }
        }
    })
}

/// Per-user rate limiting middleware; runs after authentication.
pub async fn user_rate_limit_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let limiters = &state.rate_limiters;
    if !limiters.is_enabled() {
        return Ok(next.run(req).await);
    }

    let key = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map_or_else(|| ANONYMOUS.to_string(), |u| u.id.to_string());

    match limiters.check(&key) {
        Ok(()) => Ok(next.run(req).await),
        Err(retry_after_secs) => {
            tracing::debug!(caller = %key, retry_after_secs, "Rate limit exceeded");
            Err(ApiError::RateLimited {
                message: "Rate limit exceeded. Please try again later.".to_string(),
                retry_after_secs,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_enforced_per_caller() {
        let limiters = UserRateLimiters::new(1, 2);
        assert!(limiters.check("1").is_ok());
        assert!(limiters.check("1").is_ok());
        let retry = limiters.check("1").unwrap_err();
        assert!(retry >= 1);
        // Another caller has its own bucket.
        assert!(limiters.check("2").is_ok());
    }

    #[test]
    fn refilled_buckets_are_pruned() {
        // 60/min with a burst of 2 refills completely in two seconds.
        let limiters = UserRateLimiters::new(60, 2);
        assert!(limiters.check("1").is_ok());
        assert!(limiters.check("2").is_ok());
        assert_eq!(limiters.tracked(), 2);

        assert_eq!(limiters.prune(Instant::now()), 0);
        assert_eq!(limiters.prune(Instant::now() + Duration::from_secs(3)), 2);
        assert_eq!(limiters.tracked(), 0);
        assert!(limiters.check("1").is_ok());
    }

    #[test]
    fn disabled_config_is_reported() {
        let config = RateLimitConfig {
            enabled: false,
            per_minute: 10,
            burst: 1,
        };
        assert!(!UserRateLimiters::from_config(&config).is_enabled());
    }
}
