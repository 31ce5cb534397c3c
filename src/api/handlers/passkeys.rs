//! Passkey registry handlers
//!
//! List, register, rename and delete passkey credentials. The WebAuthn
//! ceremony itself is verified by the auth frontend before anything lands
//! here; response payloads never include public key material.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::require_user;
use crate::db::{PasskeyInfo, PasskeyRepository, RegisterPasskey};
use crate::AppState;

/// GET /api/v1/passkeys - List the account's passkeys
pub async fn list_passkeys(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let repo = PasskeyRepository::new(state.db_pool.clone());
    match repo.list_by_user(user.id).await {
        Ok(passkeys) => {
            let data: Vec<PasskeyInfo> = passkeys.into_iter().map(PasskeyInfo::from).collect();
            HttpResponse::Ok().json(serde_json::json!({ "data": data }))
        }
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "Failed to list passkeys");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to list passkeys"
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterPasskeyRequest {
    pub credential_id: String,
    pub public_key: String,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

/// POST /api/v1/passkeys - Store a credential verified upstream
pub async fn register_passkey(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RegisterPasskeyRequest>,
) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    if body.credential_id.is_empty() || body.public_key.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "invalid_credential",
            "message": "credential_id and public_key are required"
        }));
    }

    let repo = PasskeyRepository::new(state.db_pool.clone());
    let request = RegisterPasskey {
        user_id: user.id,
        credential_id: body.credential_id.clone(),
        public_key: body.public_key.clone(),
        device_type: body.device_type.clone(),
        friendly_name: body.friendly_name.clone(),
    };

    match repo.register(request).await {
        Ok(passkey) => {
            info!(passkey_id = %passkey.id, user_id = %user.id, "Passkey registered");
            HttpResponse::Created().json(serde_json::json!({ "data": PasskeyInfo::from(passkey) }))
        }
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "Failed to register passkey");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to register passkey"
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RenamePasskeyRequest {
    pub id: Uuid,
    pub friendly_name: String,
}

/// Validate the friendly name for a passkey
pub fn validate_friendly_name(name: &str) -> Result<(), &'static str> {
    if name.trim().is_empty() {
        return Err("friendly_name is required");
    }
    if name.len() > 64 {
        return Err("friendly_name too long (max 64 chars)");
    }
    Ok(())
}

/// PATCH /api/v1/passkeys - Rename a passkey
pub async fn rename_passkey(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RenamePasskeyRequest>,
) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    if let Err(message) = validate_friendly_name(&body.friendly_name) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "invalid_name",
            "message": message
        }));
    }

    let repo = PasskeyRepository::new(state.db_pool.clone());
    match repo.rename(body.id, user.id, body.friendly_name.trim()).await {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Passkey renamed"
        })),
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "not_found",
            "message": "Passkey not found"
        })),
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "Failed to rename passkey");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to rename passkey"
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeletePasskeyQuery {
    pub id: Uuid,
}

/// DELETE /api/v1/passkeys?id={id} - Delete a passkey
pub async fn delete_passkey(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<DeletePasskeyQuery>,
) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let repo = PasskeyRepository::new(state.db_pool.clone());
    match repo.delete(query.id, user.id).await {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Passkey deleted"
        })),
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "not_found",
            "message": "Passkey not found"
        })),
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "Failed to delete passkey");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to delete passkey"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_name_validation() {
        assert!(validate_friendly_name("MacBook Touch ID").is_ok());
        assert!(validate_friendly_name("").is_err());
        assert!(validate_friendly_name("  ").is_err());
        assert!(validate_friendly_name(&"x".repeat(65)).is_err());
    }
}
