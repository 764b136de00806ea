//! Login throttling
//!
//! Brute-force protection for the login form:
//! - failed attempts per username (5 per 15 minutes)
//! - login requests per client IP (10 per minute)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// Sliding-window counter of attempts per key.
pub struct AttemptLimiter<K> {
    window: Duration,
    max_attempts: usize,
    attempts: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash + Clone> AttemptLimiter<K> {
    pub fn new(window: Duration, max_attempts: usize) -> Self {
        Self {
            window,
            max_attempts,
            attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `key` has used up its attempts within the window
    pub async fn is_limited(&self, key: &K) -> bool {
        self.is_limited_at(key, Utc::now()).await
    }

    async fn is_limited_at(&self, key: &K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(key) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.max_attempts
            }
            None => false,
        }
    }

    /// Record one attempt for `key`
    pub async fn record(&self, key: K) {
        self.record_at(key, Utc::now()).await;
    }

    async fn record_at(&self, key: K, now: DateTime<Utc>) {
        self.attempts.write().await.entry(key).or_default().push(now);
    }

    /// Forget all attempts for `key`
    pub async fn clear(&self, key: &K) {
        self.attempts.write().await.remove(key);
    }

    /// Drop attempts that fell out of the window. Returns the keys still tracked.
    pub async fn cleanup(&self) -> usize {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
        attempts.len()
    }
}

/// Per-username and per-IP limits for the login form
pub struct LoginThrottle {
    usernames: AttemptLimiter<String>,
    ips: AttemptLimiter<IpAddr>,
}

impl LoginThrottle {
    pub fn new() -> Self {
        Self {
            usernames: AttemptLimiter::new(Duration::minutes(15), 5),
            ips: AttemptLimiter::new(Duration::minutes(1), 10),
        }
    }

    /// Count a login request from `ip`. Returns false when the IP is over its limit.
    pub async fn allow_request(&self, ip: IpAddr) -> bool {
        if self.ips.is_limited(&ip).await {
            return false;
        }
        self.ips.record(ip).await;
        true
    }

    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.usernames.is_limited(&username.to_string()).await
    }

    pub async fn record_failure(&self, username: &str) {
        self.usernames.record(username.to_string()).await;
    }

    pub async fn clear_username(&self, username: &str) {
        self.usernames.clear(&username.to_string()).await;
    }

    /// Periodic purge of stale entries
    pub async fn cleanup(&self) {
        let users = self.usernames.cleanup().await;
        let ips = self.ips.cleanup().await;
        tracing::debug!("Login throttle tracking {} usernames, {} IPs", users, ips);
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_username_limit_after_five_failures() {
        let throttle = LoginThrottle::new();
        for _ in 0..4 {
            throttle.record_failure("ada").await;
        }
        assert!(!throttle.is_username_limited("ada").await);

        throttle.record_failure("ada").await;
        assert!(throttle.is_username_limited("ada").await);
        assert!(!throttle.is_username_limited("grace").await);

        throttle.clear_username("ada").await;
        assert!(!throttle.is_username_limited("ada").await);
    }

    #[tokio::test]
    async fn test_ip_limit_after_ten_requests() {
        let throttle = LoginThrottle::new();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        for _ in 0..10 {
            assert!(throttle.allow_request(ip).await);
        }
        assert!(!throttle.allow_request(ip).await);

        let other: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(throttle.allow_request(other).await);
    }

    #[tokio::test]
    async fn test_attempts_expire_with_window() {
        let limiter = AttemptLimiter::new(Duration::minutes(1), 2);
        let old = Utc::now() - Duration::minutes(5);
        limiter.record_at("k", old).await;
        limiter.record_at("k", old).await;

        assert!(!limiter.is_limited(&"k").await);
        assert_eq!(limiter.cleanup().await, 0);
    }

    proptest! {
        #[test]
        fn limited_exactly_at_max(max in 1usize..20, recorded in 0usize..40) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let limiter = AttemptLimiter::new(Duration::minutes(10), max);
                for _ in 0..recorded {
                    limiter.record(1u32).await;
                }
                prop_assert_eq!(limiter.is_limited(&1u32).await, recorded >= max);
                Ok(())
            })?;
        }
    }
}
