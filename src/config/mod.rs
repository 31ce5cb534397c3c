//! Configuration module for the metering service

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
    pub retention: RetentionSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Database configuration for PostgreSQL
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
}

/// Authentication and key-issuance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Bearer token for admin endpoints. Empty disables them.
    pub admin_token: String,
    /// Fallback when an API key row carries no rate_limit.
    pub default_rate_limit_per_minute: i32,
    pub max_keys_per_user: i64,
}

/// Per-identifier limits for user-scoped endpoint classes
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    pub api_per_minute: u32,
    pub auth_per_minute: u32,
    pub keys_per_ten_seconds: u32,
}

/// In-process cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub max_capacity: u64,
    pub default_ttl_secs: u64,
}

/// Data retention and cleanup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    pub request_log_days: i32,
    pub cleanup_interval_secs: u64,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with MNNR_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // MNNR_SERVER__PORT, MNNR_DATABASE__URL, etc.
            .add_source(
                Environment::with_prefix("MNNR")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: None,
            },
            database: DatabaseSettings {
                url: String::new(),
                max_connections: Some(10),
            },
            auth: AuthSettings {
                admin_token: String::new(),
                default_rate_limit_per_minute: 60,
                max_keys_per_user: 10,
            },
            rate_limit: RateLimitSettings {
                api_per_minute: 100,
                auth_per_minute: 5,
                keys_per_ten_seconds: 10,
            },
            cache: CacheSettings {
                max_capacity: 10_000,
                default_ttl_secs: 300,
            },
            retention: RetentionSettings {
                request_log_days: 90,
                cleanup_interval_secs: 300,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.auth.max_keys_per_user, 10);
        assert_eq!(settings.rate_limit.auth_per_minute, 5);
        assert!(settings.auth.admin_token.is_empty());
    }
}
