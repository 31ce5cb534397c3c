//! Usage tracking endpoint
//!
//! POST /api/v1/track is the core ingestion path customers call to meter
//! their AI usage. Authenticated by API key in the middleware layer.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::warn;
use utoipa::ToSchema;

use crate::api::middleware::ApiKeyExt;
use crate::db::UsageRepository;
use crate::telemetry::{redact_metadata, time_operation};
use crate::AppState;

fn default_unit() -> String {
    "tokens".to_string()
}

fn default_event_type() -> String {
    "track".to_string()
}

/// Usage event submission
#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackRequest {
    /// Model identifier, folded into event metadata
    #[serde(default)]
    pub model: Option<String>,
    /// Legacy alias for quantity
    #[serde(default)]
    pub tokens: Option<i64>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_event_type")]
    pub event_type: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackedEvent {
    pub quantity: i64,
    pub unit: String,
    pub model: Option<String>,
    pub event_type: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackResponse {
    pub success: bool,
    pub tracked: TrackedEvent,
    pub response_time_ms: u64,
}

/// `quantity` wins over the legacy `tokens` alias
pub fn resolve_quantity(quantity: Option<i64>, tokens: Option<i64>) -> Option<i64> {
    quantity.or(tokens)
}

/// Merge the model name into redacted client metadata
pub fn build_metadata(metadata: Option<&Value>, model: Option<&str>) -> Value {
    let mut map = match metadata {
        Some(value) => match redact_metadata(value) {
            Value::Object(map) => map,
            other => {
                // Non-object metadata is preserved under a key
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        },
        None => serde_json::Map::new(),
    };

    map.insert(
        "model".to_string(),
        model.map(|m| Value::String(m.to_string())).unwrap_or(Value::Null),
    );

    Value::Object(map)
}

/// POST /api/v1/track - Record a usage event
#[utoipa::path(
    post,
    path = "/api/v1/track",
    tag = "metering",
    request_body = TrackRequest,
    responses(
        (status = 200, description = "Event recorded", body = TrackResponse),
        (status = 400, description = "Invalid quantity"),
        (status = 401, description = "Missing or invalid API key")
    ),
    security(("api_key" = []))
)]
pub async fn track_usage(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<TrackRequest>,
) -> HttpResponse {
    let start = Instant::now();

    let auth = match req.api_key() {
        Some(auth) => auth,
        None => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "API key required"
            }));
        }
    };

    let quantity = match resolve_quantity(body.quantity, body.tokens) {
        Some(q) if q >= 0 => q,
        _ => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_quantity",
                "message": "Invalid quantity/tokens value",
                "hint": "quantity must be a non-negative number"
            }));
        }
    };

    let metadata = build_metadata(body.metadata.as_ref(), body.model.as_deref());

    let repo = UsageRepository::new(state.db_pool.clone());
    let result = time_operation("db.track_usage", || {
        repo.track(
            auth.key_id,
            auth.user_id,
            &body.event_type,
            quantity,
            &body.unit,
            Some(&metadata),
        )
    })
    .await;

    match result {
        Ok(_) => HttpResponse::Ok().json(TrackResponse {
            success: true,
            tracked: TrackedEvent {
                quantity,
                unit: body.unit.clone(),
                model: body.model.clone(),
                event_type: body.event_type.clone(),
                timestamp: Utc::now().to_rfc3339(),
            },
            response_time_ms: start.elapsed().as_millis() as u64,
        }),
        Err(e) => {
            warn!(error = %e, key_id = %auth.key_id, "Failed to record usage event");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to record usage event"
            }))
        }
    }
}

/// GET /api/v1/track - Self-describing usage example
pub async fn track_info() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "endpoint": "/api/v1/track",
        "method": "POST",
        "description": "Track AI usage events",
        "example": {
            "headers": {
                "Authorization": "Bearer mnnr_live_xxxxx",
                "Content-Type": "application/json"
            },
            "body": {
                "model": "gpt-4",
                "tokens": 1500,
                "event_type": "completion",
                "metadata": { "session": "optional" }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quantity_wins_over_tokens() {
        assert_eq!(resolve_quantity(Some(10), Some(99)), Some(10));
        assert_eq!(resolve_quantity(None, Some(99)), Some(99));
        assert_eq!(resolve_quantity(None, None), None);
    }

    #[test]
    fn request_defaults_apply() {
        let req: TrackRequest = serde_json::from_str(r#"{"tokens": 1500}"#).unwrap();
        assert_eq!(req.unit, "tokens");
        assert_eq!(req.event_type, "track");
        assert_eq!(req.tokens, Some(1500));
        assert!(req.quantity.is_none());
        assert!(req.model.is_none());
    }

    #[test]
    fn metadata_carries_the_model() {
        let out = build_metadata(Some(&json!({"session": "s1"})), Some("gpt-4"));
        assert_eq!(out["model"], "gpt-4");
        assert_eq!(out["session"], "s1");

        let out = build_metadata(None, None);
        assert_eq!(out["model"], Value::Null);
    }

    #[test]
    fn metadata_is_redacted_before_storage() {
        let out = build_metadata(Some(&json!({"api_key": "mnnr_live_x", "ok": 1})), None);
        assert_eq!(out["api_key"], "[REDACTED]");
        assert_eq!(out["ok"], 1);
    }

    #[test]
    fn non_object_metadata_is_wrapped() {
        let out = build_metadata(Some(&json!("free-form")), Some("m"));
        assert_eq!(out["value"], "free-form");
        assert_eq!(out["model"], "m");
    }
}
