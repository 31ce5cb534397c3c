//! Usage statistics endpoints
//!
//! Key-scoped usage aggregates and recent events, plus the account-wide
//! summary consumed by the dashboard.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::middleware::ApiKeyExt;
use crate::cache::{keys as cache_keys, ttl, CacheExt};
use crate::db::{KeyUsageSummary, UsageRepository};
use crate::telemetry::time_operation;
use crate::AppState;

/// Max events returned alongside the aggregate
const RECENT_EVENTS_LIMIT: i64 = 100;

fn default_days() -> i32 {
    30
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    #[serde(default = "default_days")]
    pub days: i32,
}

/// Clamp a user-supplied day window to a sane range
pub fn clamp_days(days: i32) -> i32 {
    days.clamp(1, 365)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecentEvent {
    pub id: Uuid,
    pub quantity: i64,
    pub unit: String,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageResponse {
    pub success: bool,
    pub period_days: i32,
    #[schema(value_type = Object)]
    pub summary: KeyUsageSummary,
    pub recent_events: Vec<RecentEvent>,
}

/// GET /api/v1/usage?days=30 - Usage statistics for the calling key
#[utoipa::path(
    get,
    path = "/api/v1/usage",
    tag = "metering",
    params(("days" = Option<i32>, Query, description = "Window in days, 1-365 (default 30)")),
    responses(
        (status = 200, description = "Usage statistics", body = UsageResponse),
        (status = 401, description = "Missing or invalid API key")
    ),
    security(("api_key" = []))
)]
pub async fn get_usage(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<UsageQuery>,
) -> HttpResponse {
    let auth = match req.api_key() {
        Some(auth) => auth,
        None => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "API key required"
            }));
        }
    };

    let days = clamp_days(query.days);
    let repo = UsageRepository::new(state.db_pool.clone());

    // The aggregate is cached briefly; recent events stay live
    let summary = state
        .cache
        .get_or_set(&cache_keys::usage(auth.key_id, days), ttl::SHORT, || {
            time_operation("db.key_summary", || repo.key_summary(auth.key_id, days))
        })
        .await;

    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, key_id = %auth.key_id, "Failed to aggregate usage");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to get usage statistics"
            }));
        }
    };

    let events = match repo.recent_events(auth.key_id, days, RECENT_EVENTS_LIMIT).await {
        Ok(events) => events,
        Err(e) => {
            warn!(error = %e, key_id = %auth.key_id, "Failed to load recent events");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to get usage statistics"
            }));
        }
    };

    HttpResponse::Ok().json(UsageResponse {
        success: true,
        period_days: days,
        summary,
        recent_events: events
            .into_iter()
            .map(|e| RecentEvent {
                id: e.id,
                quantity: e.quantity,
                unit: e.unit,
                event_type: e.event_type,
                created_at: e.created_at,
                metadata: e.metadata,
            })
            .collect(),
    })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserSummaryResponse {
    pub success: bool,
    pub period_days: i32,
    pub total_requests: i64,
    pub total_quantity: i64,
    pub units_used: i64,
    pub keys_used: i64,
}

/// GET /api/v1/usage/summary?days=30 - Account-wide summary for the key's owner
pub async fn get_usage_summary(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<UsageQuery>,
) -> HttpResponse {
    let auth = match req.api_key() {
        Some(auth) => auth,
        None => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "API key required"
            }));
        }
    };

    let days = clamp_days(query.days);
    let repo = UsageRepository::new(state.db_pool.clone());

    match time_operation("db.user_summary", || repo.user_summary(auth.user_id, days)).await {
        Ok(summary) => HttpResponse::Ok().json(UserSummaryResponse {
            success: true,
            period_days: days,
            total_requests: summary.total_requests,
            total_quantity: summary.total_quantity,
            units_used: summary.units_used,
            keys_used: summary.keys_used,
        }),
        Err(e) => {
            warn!(error = %e, user_id = %auth.user_id, "Failed to build account summary");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to get usage summary"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_window_is_clamped() {
        assert_eq!(clamp_days(0), 1);
        assert_eq!(clamp_days(-5), 1);
        assert_eq!(clamp_days(30), 30);
        assert_eq!(clamp_days(400), 365);
    }

    #[test]
    fn query_defaults_to_thirty_days() {
        let q: UsageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.days, 30);
    }
}
