//! OpenAPI 3.0 specification definition

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    health::HealthResponse,
    status::{StatusChecks, StatusResponse},
    track::{TrackRequest, TrackResponse, TrackedEvent},
    usage::{RecentEvent, UsageResponse, UserSummaryResponse},
};
use crate::db::models::UsageEvent;

struct ApiKeySecurity;

impl Modify for ApiKeySecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MNNR API",
        version = "1.0.0",
        description = "Usage metering and API key management for AI and agent workloads",
        contact(
            name = "API Support",
            email = "support@mnnr.app"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "metering", description = "Usage tracking and statistics endpoints")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::status::status,
        crate::api::handlers::track::track_usage,
        crate::api::handlers::usage::get_usage,
    ),
    components(
        schemas(
            HealthResponse,
            StatusResponse,
            StatusChecks,
            TrackRequest,
            TrackResponse,
            TrackedEvent,
            UsageResponse,
            UserSummaryResponse,
            RecentEvent,
            UsageEvent,
        )
    ),
    modifiers(&ApiKeySecurity)
)]
pub struct ApiDoc;
