//! Database module for PostgreSQL connectivity
//!
//! Provides connection pool management and repositories over the mnnr schema:
//! users, API keys, usage events, passkeys and request logs.

pub mod api_keys;
pub mod models;
pub mod passkeys;
pub mod pool;
pub mod usage;
pub mod users;

pub use api_keys::{
    generate_api_key, hash_api_key, is_valid_key_format, ApiKeyRepository,
    CreateApiKeyRequest, CreateApiKeyResponse, KeyMode,
};
pub use models::{DbApiKey, Passkey, PasskeyInfo, UsageEvent, User};
pub use passkeys::{PasskeyRepository, RegisterPasskey};
pub use pool::{DbError, DbPool};
pub use usage::{
    KeyUsageSummary, RateLimitStatus, RequestLogEntry, UsageRepository, UserUsageSummary,
};
pub use users::{UpdateProfile, UserRepository};
