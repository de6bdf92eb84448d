//! Cache freshness policy shared by both feeds.

use chrono::Utc;

/// Cached feeds are served without a network call for one hour.
pub const CACHE_TTL_SECS: i64 = 3600;

/// True if a record fetched at `last_fetch_epoch` may still be served at `now`.
///
/// A missing timestamp is never fresh, and a record exactly `ttl_secs` old is
/// already stale. So is a record stamped in the future (the clock moved back).
pub fn is_fresh(last_fetch_epoch: Option<i64>, now: i64, ttl_secs: i64) -> bool {
    match last_fetch_epoch {
        Some(last) => (0..ttl_secs).contains(&now.saturating_sub(last)),
        None => false,
    }
}

/// Source of "now" in epoch seconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_epoch(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch(&self) -> i64 {
        Utc::now().timestamp()
    }
}
