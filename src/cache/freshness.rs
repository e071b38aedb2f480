//! Freshness window for cached version lists

use std::time::{Duration, SystemTime};

/// How long a cached `list` entry is served before it is refreshed
pub const LIST_EXPIRE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListPolicy {
    expire: Duration,
}

impl Default for ListPolicy {
    fn default() -> Self {
        Self::new(LIST_EXPIRE)
    }
}

impl ListPolicy {
    pub fn new(expire: Duration) -> Self {
        Self { expire }
    }

    pub fn expire(&self) -> Duration {
        self.expire
    }

    /// A list written at `mod_time` is fresh while `now - mod_time < expire`.
    /// Timestamps ahead of `now` count as fresh.
    pub fn is_fresh(&self, mod_time: SystemTime, now: SystemTime) -> bool {
        match now.duration_since(mod_time) {
            Ok(age) => age < self.expire,
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window() {
        assert_eq!(ListPolicy::default().expire(), Duration::from_secs(300));
    }

    #[test]
    fn test_fresh_inside_window() {
        let policy = ListPolicy::new(Duration::from_secs(60));
        let now = SystemTime::now();
        assert!(policy.is_fresh(now - Duration::from_secs(59), now));
        assert!(!policy.is_fresh(now - Duration::from_secs(60), now));
        assert!(!policy.is_fresh(now - Duration::from_secs(3600), now));
    }

    #[test]
    fn test_future_mtime_is_fresh() {
        let policy = ListPolicy::default();
        let now = SystemTime::now();
        assert!(policy.is_fresh(now + Duration::from_secs(10), now));
    }

    #[test]
    fn test_zero_window_never_fresh() {
        let policy = ListPolicy::new(Duration::ZERO);
        let now = SystemTime::now();
        assert!(!policy.is_fresh(now, now));
    }
}
