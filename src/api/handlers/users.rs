//! User profile handlers
//!
//! Profile read/update and account deletion for the authenticated account.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::require_user;
use crate::db::{PasskeyRepository, UpdateProfile, User, UserRepository};
use crate::telemetry::redact_metadata;
use crate::AppState;

fn profile_json(user: &User) -> Value {
    serde_json::json!({
        "data": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
            "avatar_url": user.avatar_url,
            "created_at": user.created_at,
            "last_sign_in_at": user.last_sign_in_at,
            "metadata": user.metadata,
        }
    })
}

/// GET /api/v1/users - Current user profile
pub async fn get_profile(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match require_user(&req, &state).await {
        Ok(user) => HttpResponse::Ok().json(profile_json(&user)),
        Err(response) => response,
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// PATCH /api/v1/users - Update profile fields
pub async fn update_profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<UpdateProfileRequest>,
) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let update = UpdateProfile {
        name: body.name.clone(),
        avatar_url: body.avatar_url.clone(),
        // Client metadata may carry anything; strip credentials before storage
        metadata: body.metadata.as_ref().map(redact_metadata),
    };

    let repo = UserRepository::new(state.db_pool.clone());
    match repo.update_profile(user.id, update).await {
        Ok(Some(updated)) => HttpResponse::Ok().json(profile_json(&updated)),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "not_found",
            "message": "User not found"
        })),
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "Failed to update profile");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to update profile"
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    /// Passkey used for the assertion, when the sign-in was passkey-based
    #[serde(default)]
    pub passkey_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub sign_count: Option<i64>,
}

/// POST /api/v1/users/sign-in - Record a completed sign-in
///
/// Called by the gateway after it has verified the session (or the WebAuthn
/// assertion). Updates last_sign_in_at and, for passkey sign-ins, the
/// credential's signature counter.
pub async fn record_sign_in(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<SignInRequest>,
) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let repo = UserRepository::new(state.db_pool.clone());
    if let Err(e) = repo.record_sign_in(user.id).await {
        warn!(error = %e, user_id = %user.id, "Failed to record sign-in");
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "internal_error",
            "message": "Failed to record sign-in"
        }));
    }

    if let Some(passkey_id) = body.passkey_id {
        let passkeys = PasskeyRepository::new(state.db_pool.clone());
        let sign_count = body.sign_count.unwrap_or(0);
        match passkeys.record_use(passkey_id, user.id, sign_count).await {
            Ok(true) => {}
            Ok(false) => {
                return HttpResponse::NotFound().json(serde_json::json!({
                    "error": "not_found",
                    "message": "Passkey not found"
                }));
            }
            Err(e) => {
                warn!(error = %e, user_id = %user.id, "Failed to record passkey use");
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "internal_error",
                    "message": "Failed to record sign-in"
                }));
            }
        }
    }

    HttpResponse::Ok().json(serde_json::json!({ "success": true }))
}

/// DELETE /api/v1/users - Delete the account and all owned data
pub async fn delete_account(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let user = match require_user(&req, &state).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let repo = UserRepository::new(state.db_pool.clone());
    match repo.delete(user.id).await {
        Ok(true) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Account deleted"
        })),
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "not_found",
            "message": "User not found"
        })),
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "Failed to delete account");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to delete account"
            }))
        }
    }
}
