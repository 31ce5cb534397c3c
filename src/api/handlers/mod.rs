//! HTTP request handlers

pub mod analytics;
pub mod health;
pub mod keys;
pub mod passkeys;
pub mod status;
pub mod track;
pub mod usage;
pub mod users;

use actix_web::{HttpRequest, HttpResponse};
use tracing::warn;
use uuid::Uuid;

use crate::db::{User, UserRepository};
use crate::AppState;

/// Resolve the account for user-scoped endpoints.
///
/// Session auth lives at the gateway; it forwards the authenticated account
/// in X-User-Id, which must reference an existing user row.
pub(crate) async fn require_user(
    req: &HttpRequest,
    state: &AppState,
) -> Result<User, HttpResponse> {
    let unauthorized = || {
        HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "unauthorized",
            "message": "Unauthorized"
        }))
    };

    let user_id = req
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok());

    let user_id = match user_id {
        Some(id) => id,
        None => return Err(unauthorized()),
    };

    let repo = UserRepository::new(state.db_pool.clone());
    match repo.get_by_id(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(unauthorized()),
        Err(e) => {
            warn!(error = %e, "Failed to load user");
            Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Internal server error"
            })))
        }
    }
}
