//! API Middleware Module
//!
//! Authentication, rate limiting and request logging for the metering API.

pub mod auth;
pub mod rate_limit;
pub mod service;
pub mod usage;

pub use auth::{extract_api_key, validate_api_key, ApiKeyAuth, ApiKeyExt, API_KEY_HEADER};
pub use rate_limit::{
    class_limit_exceeded_response, rate_limit_exceeded_response, ClassLimiters, LimiterClass,
    RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET, RETRY_AFTER,
};
pub use service::{classify_path, ApiMiddleware, PathClass};
pub use usage::{
    client_identifier, extract_client_ip, extract_user_agent, log_request_async, RequestTiming,
};
