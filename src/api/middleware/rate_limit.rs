//! Rate Limiting
//!
//! Two layers: a database-backed sliding window per API key (limit comes from
//! the key row), and in-process keyed limiters per endpoint class for
//! user-scoped routes, keyed by user id or client IP.

use actix_web::HttpResponse;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::RateLimitSettings;
use crate::db::RateLimitStatus;

/// Rate limit headers
pub const RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
pub const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER: &str = "Retry-After";

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Endpoint classes with distinct limits, mirroring the dashboard's
/// rate limiter families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterClass {
    /// General API endpoints
    Api,
    /// Auth-sensitive endpoints (users, passkeys)
    Auth,
    /// Key management endpoints
    Keys,
}

fn quota(max: u32, window: Duration) -> Quota {
    let max = NonZeroU32::new(max.max(1)).unwrap_or(nonzero_ext::nonzero!(1u32));
    let replenish = (window / max.get()).max(Duration::from_millis(1));
    Quota::with_period(replenish)
        .unwrap_or_else(|| Quota::per_minute(max))
        .allow_burst(max)
}

/// In-process keyed limiters, one per endpoint class
pub struct ClassLimiters {
    api: KeyedLimiter,
    auth: KeyedLimiter,
    keys: KeyedLimiter,
}

impl ClassLimiters {
    pub fn new(settings: &RateLimitSettings) -> Self {
        ClassLimiters {
            api: RateLimiter::keyed(quota(settings.api_per_minute, Duration::from_secs(60))),
            auth: RateLimiter::keyed(quota(settings.auth_per_minute, Duration::from_secs(60))),
            keys: RateLimiter::keyed(quota(settings.keys_per_ten_seconds, Duration::from_secs(10))),
        }
    }

    /// Returns true when the request is allowed for this identifier
    pub fn check(&self, class: LimiterClass, identifier: &str) -> bool {
        let limiter = match class {
            LimiterClass::Api => &self.api,
            LimiterClass::Auth => &self.auth,
            LimiterClass::Keys => &self.keys,
        };
        limiter.check_key(&identifier.to_string()).is_ok()
    }
}

/// 429 response for the per-key sliding window, with standard headers
pub fn rate_limit_exceeded_response(status: &RateLimitStatus) -> HttpResponse {
    let seconds_until_reset = (status.reset_at - chrono::Utc::now()).num_seconds().max(1);

    HttpResponse::TooManyRequests()
        .insert_header((RATE_LIMIT_LIMIT, status.limit.to_string()))
        .insert_header((RATE_LIMIT_REMAINING, "0"))
        .insert_header((RATE_LIMIT_RESET, status.reset_at.timestamp().to_string()))
        .insert_header((RETRY_AFTER, seconds_until_reset.to_string()))
        .json(serde_json::json!({
            "error": "rate_limit_exceeded",
            "message": format!("Rate limit exceeded. Maximum {} requests per minute.", status.limit),
            "limit": status.limit,
            "reset_at": status.reset_at.to_rfc3339(),
            "retry_after_seconds": seconds_until_reset
        }))
}

/// 429 response for the in-process class limiters
pub fn class_limit_exceeded_response() -> HttpResponse {
    HttpResponse::TooManyRequests().json(serde_json::json!({
        "error": "rate_limit_exceeded",
        "message": "Too many requests. Please try again later."
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_limits() -> RateLimitSettings {
        RateLimitSettings {
            api_per_minute: 100,
            auth_per_minute: 2,
            keys_per_ten_seconds: 3,
        }
    }

    #[test]
    fn burst_is_allowed_up_to_the_limit() {
        let limiters = ClassLimiters::new(&tiny_limits());
        assert!(limiters.check(LimiterClass::Auth, "user:1"));
        assert!(limiters.check(LimiterClass::Auth, "user:1"));
        assert!(!limiters.check(LimiterClass::Auth, "user:1"));
    }

    #[test]
    fn identifiers_are_isolated() {
        let limiters = ClassLimiters::new(&tiny_limits());
        assert!(limiters.check(LimiterClass::Auth, "user:1"));
        assert!(limiters.check(LimiterClass::Auth, "user:1"));
        assert!(!limiters.check(LimiterClass::Auth, "user:1"));
        // A different identifier has its own budget
        assert!(limiters.check(LimiterClass::Auth, "user:2"));
    }

    #[test]
    fn classes_are_isolated() {
        let limiters = ClassLimiters::new(&tiny_limits());
        for _ in 0..2 {
            assert!(limiters.check(LimiterClass::Auth, "id"));
        }
        assert!(!limiters.check(LimiterClass::Auth, "id"));
        // Keys class still has budget for the same identifier
        assert!(limiters.check(LimiterClass::Keys, "id"));
    }

    #[test]
    fn zero_limit_clamps_to_one() {
        let limiters = ClassLimiters::new(&RateLimitSettings {
            api_per_minute: 0,
            auth_per_minute: 1,
            keys_per_ten_seconds: 1,
        });
        assert!(limiters.check(LimiterClass::Api, "id"));
        assert!(!limiters.check(LimiterClass::Api, "id"));
    }
}
