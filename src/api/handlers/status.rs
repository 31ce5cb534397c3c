//! Public status endpoint
//!
//! Deep health: database connectivity, schema presence, latency, and an
//! in-process operation metrics snapshot. No authentication required.

use actix_web::{web, HttpResponse};
use serde::Serialize;
use std::time::Instant;
use tracing::warn;
use utoipa::ToSchema;

use crate::telemetry::{OpSnapshot, METRICS};
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct StatusChecks {
    pub database_connected: bool,
    pub users_table: bool,
    pub api_keys_table: bool,
    pub usage_events_table: bool,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub api: &'static str,
    pub database: &'static str,
    pub version: &'static str,
    pub latency_ms: u64,
    pub checks: StatusChecks,
    #[schema(value_type = Object)]
    pub operations: Vec<OpSnapshot>,
}

/// GET /api/v1/status - API and database status
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "system",
    responses(
        (status = 200, description = "All systems operational", body = StatusResponse),
        (status = 503, description = "Database unreachable", body = StatusResponse)
    )
)]
pub async fn status(state: web::Data<AppState>) -> HttpResponse {
    let start = Instant::now();

    let mut checks = StatusChecks {
        database_connected: false,
        users_table: false,
        api_keys_table: false,
        usage_events_table: false,
    };

    match state.db_pool.get().await {
        Ok(client) => {
            checks.database_connected = client.query_one("SELECT 1", &[]).await.is_ok();

            if checks.database_connected {
                // to_regclass returns NULL for missing relations
                if let Ok(row) = client
                    .query_one(
                        "SELECT to_regclass('users') IS NOT NULL AS users, \
                                to_regclass('api_keys') IS NOT NULL AS api_keys, \
                                to_regclass('usage_events') IS NOT NULL AS usage_events",
                        &[],
                    )
                    .await
                {
                    checks.users_table = row.get("users");
                    checks.api_keys_table = row.get("api_keys");
                    checks.usage_events_table = row.get("usage_events");
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Status check could not reach database");
        }
    }

    let healthy = checks.database_connected;
    let response = StatusResponse {
        api: "operational",
        database: if healthy { "operational" } else { "error" },
        version: env!("CARGO_PKG_VERSION"),
        latency_ms: start.elapsed().as_millis() as u64,
        checks,
        operations: METRICS.snapshot(),
    };

    if healthy {
        HttpResponse::Ok()
            .insert_header(("Cache-Control", "no-store, must-revalidate"))
            .json(response)
    } else {
        HttpResponse::ServiceUnavailable()
            .insert_header(("Cache-Control", "no-store, must-revalidate"))
            .json(response)
    }
}
