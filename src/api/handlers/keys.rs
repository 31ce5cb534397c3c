//! API Key Management Handlers
//!
//! Create, list, inspect and revoke keys for the authenticated account.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::require_user;
use crate::cache::{keys as cache_keys, ttl, Cache, CacheExt};
use crate::db::{ApiKeyRepository, CreateApiKeyRequest, DbApiKey, KeyMode};
use crate::AppState;

const MAX_KEY_NAME_LENGTH: usize = 100;

/// Request to create a new API key
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(default = "default_mode")]
    pub mode: KeyMode,
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub rate_limit: Option<i32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_mode() -> KeyMode {
    KeyMode::Live
}

/// Validate the requested key name
pub fn validate_key_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("Name is required");
    }
    if name.len() > MAX_KEY_NAME_LENGTH {
        return Err("Name too long (max 100 chars)");
    }
    Ok(())
}

/// Response after creating a new key. The api_key field is shown exactly once.
#[derive(Debug, Serialize)]
pub struct CreateKeyResponse {
    pub success: bool,
    pub id: Uuid,
    pub api_key: String,
    pub key_prefix: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub warning: &'static str,
}

/// Key info safe to return (no hash)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiKeyInfo {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub scopes: Option<Vec<String>>,
    pub rate_limit: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<DbApiKey> for ApiKeyInfo {
    fn from(key: DbApiKey) -> Self {
        ApiKeyInfo {
            id: key.id,
            name: key.name,
            key_prefix: key.key_prefix,
            scopes: key.scopes,
            rate_limit: key.rate_limit,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListKeysResponse {
    pub success: bool,
    pub keys: Vec<ApiKeyInfo>,
    pub count: usize,
}

/// POST /api/v1/keys - Create a new API key
pub async fn create_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateKeyRequest>,
) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    if let Err(message) = validate_key_name(&body.name) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "invalid_name",
            "message": message
        }));
    }

    let repo = ApiKeyRepository::new(state.db_pool.clone());

    // Enforce the per-user key cap
    match repo.count_active(user.id).await {
        Ok(count) if count >= state.settings.auth.max_keys_per_user => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "key_limit_reached",
                "message": format!(
                    "Maximum {} API keys allowed",
                    state.settings.auth.max_keys_per_user
                )
            }));
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "Failed to count API keys");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to create API key"
            }));
        }
    }

    let request = CreateApiKeyRequest {
        user_id: user.id,
        name: body.name.trim().to_string(),
        mode: body.mode,
        scopes: body.scopes.clone(),
        rate_limit: body.rate_limit,
        expires_at: body.expires_at,
    };

    match repo.create(request).await {
        Ok(created) => {
            info!(key_id = %created.id, user_id = %user.id, "API key created");
            state.cache.delete(&cache_keys::api_keys(user.id)).await;

            HttpResponse::Created().json(CreateKeyResponse {
                success: true,
                id: created.id,
                api_key: created.api_key,
                key_prefix: created.key_prefix,
                name: created.name,
                created_at: created.created_at,
                warning: "Save this key now. It will not be shown again.",
            })
        }
        Err(e) => {
            warn!(error = %e, "Failed to create API key");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to create API key"
            }))
        }
    }
}

/// GET /api/v1/keys - List the account's active keys
pub async fn list_keys(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let repo = ApiKeyRepository::new(state.db_pool.clone());

    let result = state
        .cache
        .get_or_set(&cache_keys::api_keys(user.id), ttl::MEDIUM, || async {
            let keys = repo.list_by_user(user.id).await?;
            let infos: Vec<ApiKeyInfo> = keys.into_iter().map(ApiKeyInfo::from).collect();
            let count = infos.len();
            Ok::<_, crate::db::DbError>(ListKeysResponse {
                success: true,
                keys: infos,
                count,
            })
        })
        .await;

    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            warn!(error = %e, "Failed to list API keys");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to list API keys"
            }))
        }
    }
}

/// GET /api/v1/keys/{id} - Inspect one of the account's keys
pub async fn get_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let key_id = path.into_inner();
    let repo = ApiKeyRepository::new(state.db_pool.clone());

    match repo.get_by_id(key_id).await {
        Ok(Some(key)) if key.user_id == user.id => {
            HttpResponse::Ok().json(ApiKeyInfo::from(key))
        }
        Ok(Some(_)) => HttpResponse::Forbidden().json(serde_json::json!({
            "error": "forbidden",
            "message": "You can only view your own API keys"
        })),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "not_found",
            "message": "API key not found"
        })),
        Err(e) => {
            warn!(error = %e, "Failed to get API key");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to get API key"
            }))
        }
    }
}

/// DELETE /api/v1/keys/{id} - Revoke a key
pub async fn revoke_key(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let key_id = path.into_inner();
    let repo = ApiKeyRepository::new(state.db_pool.clone());

    match repo.revoke(key_id, user.id).await {
        Ok(true) => {
            info!(key_id = %key_id, user_id = %user.id, "API key revoked");
            state.cache.delete(&cache_keys::api_keys(user.id)).await;

            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "API key revoked",
                "key_id": key_id
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "not_found",
            "message": "Key not found or already revoked"
        })),
        Err(e) => {
            warn!(error = %e, "Failed to revoke API key");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to revoke API key"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_name_validation() {
        assert!(validate_key_name("Production").is_ok());
        assert!(validate_key_name("").is_err());
        assert!(validate_key_name("   ").is_err());
        assert!(validate_key_name(&"x".repeat(100)).is_ok());
        assert!(validate_key_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn create_request_defaults_to_live_mode() {
        let req: CreateKeyRequest = serde_json::from_str(r#"{"name": "ci"}"#).unwrap();
        assert_eq!(req.mode, KeyMode::Live);
        assert!(req.scopes.is_none());
        assert!(req.expires_at.is_none());
    }

    #[test]
    fn key_info_drops_the_hash() {
        let value = serde_json::to_value(ApiKeyInfo {
            id: Uuid::new_v4(),
            name: "ci".into(),
            key_prefix: "mnnr_live_ab".into(),
            scopes: None,
            rate_limit: Some(60),
            created_at: Utc::now(),
            last_used_at: None,
            expires_at: None,
        })
        .unwrap();
        assert!(value.get("key_hash").is_none());
        assert!(value.get("api_key").is_none());
    }
}
