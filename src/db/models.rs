//! Database row models shared across repositories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// User account row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

/// API key row. The raw key is never stored, only its SHA-256 hash.
#[derive(Debug, Clone)]
pub struct DbApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub scopes: Option<Vec<String>>,
    pub rate_limit: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

impl DbApiKey {
    /// Check if the key is usable (not revoked, not expired)
    pub fn is_valid(&self) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        if let Some(expires) = self.expires_at {
            if expires < Utc::now() {
                return false;
            }
        }
        true
    }
}

/// Usage event row recording one billable action
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UsageEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub api_key_id: Uuid,
    pub event_type: String,
    pub quantity: i64,
    pub unit: String,
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub billed_at: Option<DateTime<Utc>>,
}

/// Passkey credential row. Ceremony verification happens upstream; this
/// service only keeps the registry.
#[derive(Debug, Clone)]
pub struct Passkey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub credential_id: String,
    pub public_key: String,
    pub device_type: Option<String>,
    pub friendly_name: Option<String>,
    pub sign_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Passkey info safe to return to clients (no public key material)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasskeyInfo {
    pub id: Uuid,
    pub friendly_name: Option<String>,
    pub device_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<Passkey> for PasskeyInfo {
    fn from(p: Passkey) -> Self {
        PasskeyInfo {
            id: p.id,
            friendly_name: p.friendly_name,
            device_type: p.device_type,
            created_at: p.created_at,
            last_used_at: p.last_used_at,
        }
    }
}
