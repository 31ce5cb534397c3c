//! Usage analytics handler
//!
//! Fleet-wide aggregates for the admin dashboard: daily series, unit and key
//! breakdowns, hourly distribution and period-over-period trends. Responses
//! are cached since every block is a full-table aggregate.

use actix_web::{web, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::{keys as cache_keys, ttl, CacheExt};
use crate::db::{hash_api_key, UsageRepository};
use crate::db::usage::{DailyUsage, HourlyUsage, KeyUsage, PeriodTotals, UnitUsage};
use crate::telemetry::time_operation;
use crate::AppState;

/// Parse an analytics period string into a day count
pub fn parse_period(period: &str) -> i32 {
    match period {
        "7d" => 7,
        "90d" => 90,
        _ => 30,
    }
}

/// Period-over-period change in percent. A baseline of zero reads as +100%
/// when there is any current activity.
pub fn trend_percent(current: i64, previous: i64) -> f64 {
    if previous == 0 {
        if current > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        ((current - previous) as f64 / previous as f64) * 100.0
    }
}

fn default_period() -> String {
    "30d".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default = "default_period")]
    pub period: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Trends {
    pub requests_pct: f64,
    pub quantity_pct: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub period: String,
    pub period_days: i32,
    pub totals: PeriodTotals,
    pub trends: Trends,
    pub daily: Vec<DailyUsage>,
    pub by_unit: Vec<UnitUsage>,
    pub by_key: Vec<KeyUsage>,
    pub hourly: Vec<HourlyUsage>,
}

/// GET /api/v1/analytics?period=7d|30d|90d - Usage analytics (admin only)
pub async fn get_analytics(
    auth: BearerAuth,
    state: web::Data<AppState>,
    query: web::Query<AnalyticsQuery>,
) -> HttpResponse {
    let admin_token = &state.settings.auth.admin_token;
    if admin_token.is_empty() || hash_api_key(auth.token()) != hash_api_key(admin_token) {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "unauthorized",
            "message": "Admin token required"
        }));
    }

    let days = parse_period(&query.period);
    let period = query.period.clone();
    let repo = UsageRepository::new(state.db_pool.clone());

    let report = state
        .cache
        .get_or_set(&cache_keys::analytics(&period), ttl::MEDIUM, || {
            time_operation("db.analytics", || build_report(&repo, period.clone(), days))
        })
        .await;

    match report {
        Ok(report) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "analytics": report
        })),
        Err(e) => {
            warn!(error = %e, "Failed to build analytics report");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "internal_error",
                "message": "Failed to build analytics"
            }))
        }
    }
}

async fn build_report(
    repo: &UsageRepository,
    period: String,
    days: i32,
) -> Result<AnalyticsReport, crate::db::DbError> {
    let totals = repo.period_totals(days).await?;
    let previous = repo.previous_period_totals(days).await?;
    let daily = repo.daily_usage(days).await?;
    let by_unit = repo.usage_by_unit(days, 10).await?;
    let by_key = repo.usage_by_key(days).await?;
    let hourly = repo.hourly_distribution().await?;

    let trends = Trends {
        requests_pct: trend_percent(totals.total_requests, previous.total_requests),
        quantity_pct: trend_percent(totals.total_quantity, previous.total_quantity),
    };

    Ok(AnalyticsReport {
        period,
        period_days: days,
        totals,
        trends,
        daily,
        by_unit,
        by_key,
        hourly,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parsing_defaults_to_thirty_days() {
        assert_eq!(parse_period("7d"), 7);
        assert_eq!(parse_period("30d"), 30);
        assert_eq!(parse_period("90d"), 90);
        assert_eq!(parse_period("1y"), 30);
        assert_eq!(parse_period(""), 30);
    }

    #[test]
    fn trend_math() {
        assert_eq!(trend_percent(150, 100), 50.0);
        assert_eq!(trend_percent(50, 100), -50.0);
        assert_eq!(trend_percent(100, 100), 0.0);
        assert_eq!(trend_percent(5, 0), 100.0);
        assert_eq!(trend_percent(0, 0), 0.0);
    }
}
