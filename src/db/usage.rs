//! Usage metering, rate limiting and request-log database operations

use super::models::UsageEvent;
use super::pool::{DbError, DbPool};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::IpAddr;
use tracing::info;
use uuid::Uuid;

/// Round a timestamp down to its minute boundary for the sliding window
pub fn minute_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .unwrap_or(now)
}

/// Aggregate usage for one API key over a day window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyUsageSummary {
    pub total_requests: i64,
    pub total_quantity: i64,
    pub units: Vec<UnitUsage>,
}

/// Per-unit (model class) usage breakdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitUsage {
    pub unit: String,
    pub requests: i64,
    pub quantity: i64,
}

/// Account-wide usage summary across a user's active keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUsageSummary {
    pub total_requests: i64,
    pub total_quantity: i64,
    pub units_used: i64,
    pub keys_used: i64,
}

/// One day of aggregated usage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub requests: i64,
    pub quantity: i64,
    pub active_keys: i64,
}

/// Usage attributed to one API key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyUsage {
    pub key_name: String,
    pub key_prefix: String,
    pub requests: i64,
    pub quantity: i64,
    pub last_used: Option<DateTime<Utc>>,
}

/// Requests bucketed by hour of day (last 24h)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyUsage {
    pub hour: i32,
    pub requests: i64,
    pub quantity: i64,
}

/// Period totals for trend computation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub total_requests: i64,
    pub total_quantity: i64,
    pub active_keys: i64,
    pub units_used: i64,
    pub active_days: i64,
}

/// Rate limit check result
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub current_count: i32,
    pub limit: i32,
    pub reset_at: DateTime<Utc>,
}

/// Request log entry for the per-request audit trail
#[derive(Debug)]
pub struct RequestLogEntry {
    pub api_key_id: Uuid,
    pub endpoint: String,
    pub method: String,
    pub status_code: i32,
    pub response_time_ms: Option<i32>,
    pub error_code: Option<String>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: Option<String>,
}

/// Repository for usage tracking operations
pub struct UsageRepository {
    pool: DbPool,
}

impl UsageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append a usage event
    pub async fn track(
        &self,
        api_key_id: Uuid,
        user_id: Uuid,
        event_type: &str,
        quantity: i64,
        unit: &str,
        metadata: Option<&Value>,
    ) -> Result<Uuid, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                r#"
                INSERT INTO usage_events (user_id, api_key_id, event_type, quantity, unit, metadata)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
                &[&user_id, &api_key_id, &event_type, &quantity, &unit, &metadata],
            )
            .await?;

        Ok(row.get("id"))
    }

    /// Aggregate usage for a key over the last `days` days
    pub async fn key_summary(&self, api_key_id: Uuid, days: i32) -> Result<KeyUsageSummary, DbError> {
        let client = self.pool.get().await?;

        let totals = client
            .query_one(
                r#"
                SELECT COUNT(*) AS requests, COALESCE(SUM(quantity), 0)::BIGINT AS quantity
                FROM usage_events
                WHERE api_key_id = $1 AND created_at > NOW() - make_interval(days => $2)
                "#,
                &[&api_key_id, &days],
            )
            .await?;

        let unit_rows = client
            .query(
                r#"
                SELECT unit, COUNT(*) AS requests, COALESCE(SUM(quantity), 0)::BIGINT AS quantity
                FROM usage_events
                WHERE api_key_id = $1 AND created_at > NOW() - make_interval(days => $2)
                GROUP BY unit
                ORDER BY quantity DESC
                "#,
                &[&api_key_id, &days],
            )
            .await?;

        Ok(KeyUsageSummary {
            total_requests: totals.get("requests"),
            total_quantity: totals.get("quantity"),
            units: unit_rows
                .iter()
                .map(|r| UnitUsage {
                    unit: r.get("unit"),
                    requests: r.get("requests"),
                    quantity: r.get("quantity"),
                })
                .collect(),
        })
    }

    /// Most recent events for a key, newest first
    pub async fn recent_events(
        &self,
        api_key_id: Uuid,
        days: i32,
        limit: i64,
    ) -> Result<Vec<UsageEvent>, DbError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                r#"
                SELECT id, user_id, api_key_id, event_type, quantity, unit, metadata, created_at, billed_at
                FROM usage_events
                WHERE api_key_id = $1 AND created_at > NOW() - make_interval(days => $2)
                ORDER BY created_at DESC
                LIMIT $3
                "#,
                &[&api_key_id, &days, &limit],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| UsageEvent {
                id: r.get("id"),
                user_id: r.get("user_id"),
                api_key_id: r.get("api_key_id"),
                event_type: r.get("event_type"),
                quantity: r.get("quantity"),
                unit: r.get("unit"),
                metadata: r.get("metadata"),
                created_at: r.get("created_at"),
                billed_at: r.get("billed_at"),
            })
            .collect())
    }

    /// Account-wide summary across a user's active keys
    pub async fn user_summary(&self, user_id: Uuid, days: i32) -> Result<UserUsageSummary, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                r#"
                SELECT
                    COUNT(ue.id) AS total_requests,
                    COALESCE(SUM(ue.quantity), 0)::BIGINT AS total_quantity,
                    COUNT(DISTINCT ue.unit) AS units_used,
                    COUNT(DISTINCT ue.api_key_id) AS keys_used
                FROM api_keys ak
                LEFT JOIN usage_events ue ON ak.id = ue.api_key_id
                    AND ue.created_at > NOW() - make_interval(days => $2)
                WHERE ak.user_id = $1 AND ak.revoked_at IS NULL
                "#,
                &[&user_id, &days],
            )
            .await?;

        Ok(UserUsageSummary {
            total_requests: row.get("total_requests"),
            total_quantity: row.get("total_quantity"),
            units_used: row.get("units_used"),
            keys_used: row.get("keys_used"),
        })
    }

    /// Daily usage series for the analytics report
    pub async fn daily_usage(&self, days: i32) -> Result<Vec<DailyUsage>, DbError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                r#"
                SELECT
                    DATE(created_at) AS date,
                    COUNT(*) AS requests,
                    COALESCE(SUM(quantity), 0)::BIGINT AS quantity,
                    COUNT(DISTINCT api_key_id) AS active_keys
                FROM usage_events
                WHERE created_at > NOW() - make_interval(days => $1)
                GROUP BY DATE(created_at)
                ORDER BY date ASC
                "#,
                &[&days],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| DailyUsage {
                date: r.get("date"),
                requests: r.get("requests"),
                quantity: r.get("quantity"),
                active_keys: r.get("active_keys"),
            })
            .collect())
    }

    /// Top units (model classes) by quantity
    pub async fn usage_by_unit(&self, days: i32, limit: i64) -> Result<Vec<UnitUsage>, DbError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                r#"
                SELECT unit, COUNT(*) AS requests, COALESCE(SUM(quantity), 0)::BIGINT AS quantity
                FROM usage_events
                WHERE created_at > NOW() - make_interval(days => $1)
                GROUP BY unit
                ORDER BY quantity DESC
                LIMIT $2
                "#,
                &[&days, &limit],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| UnitUsage {
                unit: r.get("unit"),
                requests: r.get("requests"),
                quantity: r.get("quantity"),
            })
            .collect())
    }

    /// Usage per active API key
    pub async fn usage_by_key(&self, days: i32) -> Result<Vec<KeyUsage>, DbError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                r#"
                SELECT
                    ak.name AS key_name,
                    ak.key_prefix,
                    COUNT(ue.id) AS requests,
                    COALESCE(SUM(ue.quantity), 0)::BIGINT AS quantity,
                    MAX(ue.created_at) AS last_used
                FROM api_keys ak
                LEFT JOIN usage_events ue ON ak.id = ue.api_key_id
                    AND ue.created_at > NOW() - make_interval(days => $1)
                WHERE ak.revoked_at IS NULL
                GROUP BY ak.id, ak.name, ak.key_prefix
                ORDER BY quantity DESC
                "#,
                &[&days],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| KeyUsage {
                key_name: r.get("key_name"),
                key_prefix: r.get("key_prefix"),
                requests: r.get("requests"),
                quantity: r.get("quantity"),
                last_used: r.get("last_used"),
            })
            .collect())
    }

    /// Hourly distribution over the last 24 hours
    pub async fn hourly_distribution(&self) -> Result<Vec<HourlyUsage>, DbError> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                r#"
                SELECT
                    EXTRACT(HOUR FROM created_at)::INT AS hour,
                    COUNT(*) AS requests,
                    COALESCE(SUM(quantity), 0)::BIGINT AS quantity
                FROM usage_events
                WHERE created_at > NOW() - INTERVAL '24 hours'
                GROUP BY EXTRACT(HOUR FROM created_at)
                ORDER BY hour ASC
                "#,
                &[],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|r| HourlyUsage {
                hour: r.get("hour"),
                requests: r.get("requests"),
                quantity: r.get("quantity"),
            })
            .collect())
    }

    /// Totals for the window ending now
    pub async fn period_totals(&self, days: i32) -> Result<PeriodTotals, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                r#"
                SELECT
                    COUNT(*) AS total_requests,
                    COALESCE(SUM(quantity), 0)::BIGINT AS total_quantity,
                    COUNT(DISTINCT api_key_id) AS active_keys,
                    COUNT(DISTINCT unit) AS units_used,
                    COUNT(DISTINCT DATE(created_at)) AS active_days
                FROM usage_events
                WHERE created_at > NOW() - make_interval(days => $1)
                "#,
                &[&days],
            )
            .await?;

        Ok(PeriodTotals {
            total_requests: row.get("total_requests"),
            total_quantity: row.get("total_quantity"),
            active_keys: row.get("active_keys"),
            units_used: row.get("units_used"),
            active_days: row.get("active_days"),
        })
    }

    /// Totals for the window preceding the current one (trend baseline)
    pub async fn previous_period_totals(&self, days: i32) -> Result<PeriodTotals, DbError> {
        let client = self.pool.get().await?;

        let row = client
            .query_one(
                r#"
                SELECT
                    COUNT(*) AS total_requests,
                    COALESCE(SUM(quantity), 0)::BIGINT AS total_quantity
                FROM usage_events
                WHERE created_at > NOW() - make_interval(days => $1 * 2)
                  AND created_at <= NOW() - make_interval(days => $1)
                "#,
                &[&days],
            )
            .await?;

        Ok(PeriodTotals {
            total_requests: row.get("total_requests"),
            total_quantity: row.get("total_quantity"),
            ..PeriodTotals::default()
        })
    }

    /// Check rate limit using sliding minute windows in the database
    pub async fn check_rate_limit(&self, api_key_id: Uuid, limit: i32) -> Result<RateLimitStatus, DbError> {
        let client = self.pool.get().await?;

        let window_start = minute_window_start(Utc::now());

        let count_row = client
            .query_one(
                r#"
                SELECT COALESCE(SUM(request_count), 0)::INTEGER AS count
                FROM rate_limit_windows
                WHERE api_key_id = $1 AND window_start > NOW() - INTERVAL '1 minute'
                "#,
                &[&api_key_id],
            )
            .await?;

        let current_count: i32 = count_row.get("count");
        let allowed = current_count < limit;

        if allowed {
            client
                .execute(
                    r#"
                    INSERT INTO rate_limit_windows (api_key_id, window_start, request_count)
                    VALUES ($1, $2, 1)
                    ON CONFLICT (api_key_id, window_start) DO UPDATE
                    SET request_count = rate_limit_windows.request_count + 1
                    "#,
                    &[&api_key_id, &window_start],
                )
                .await?;
        }

        Ok(RateLimitStatus {
            allowed,
            current_count: if allowed { current_count + 1 } else { current_count },
            limit,
            reset_at: window_start + chrono::Duration::minutes(1),
        })
    }

    /// Record a request log entry
    pub async fn log_request(&self, entry: RequestLogEntry) -> Result<(), DbError> {
        let client = self.pool.get().await?;

        let ip_str = entry.ip_address.map(|ip| ip.to_string());

        client
            .execute(
                r#"
                INSERT INTO request_logs (
                    api_key_id, endpoint, method, status_code,
                    response_time_ms, error_code, ip_address, user_agent
                ) VALUES ($1, $2, $3, $4, $5, $6, $7::inet, $8)
                "#,
                &[
                    &entry.api_key_id,
                    &entry.endpoint,
                    &entry.method,
                    &entry.status_code,
                    &entry.response_time_ms,
                    &entry.error_code,
                    &ip_str,
                    &entry.user_agent,
                ],
            )
            .await?;

        Ok(())
    }

    /// Clean up rate limit windows outside the sliding horizon
    pub async fn cleanup_rate_limits(&self) -> Result<u64, DbError> {
        let client = self.pool.get().await?;

        let deleted = client
            .execute(
                "DELETE FROM rate_limit_windows WHERE window_start < NOW() - INTERVAL '5 minutes'",
                &[],
            )
            .await?;

        if deleted > 0 {
            info!(deleted, "Cleaned up old rate limit windows");
        }

        Ok(deleted)
    }

    /// Clean up request logs past the retention window
    pub async fn cleanup_request_logs(&self, retention_days: i32) -> Result<u64, DbError> {
        let client = self.pool.get().await?;

        let deleted = client
            .execute(
                "DELETE FROM request_logs WHERE created_at < NOW() - make_interval(days => $1)",
                &[&retention_days],
            )
            .await?;

        if deleted > 0 {
            info!(deleted, retention_days, "Cleaned up old request logs");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_start_rounds_to_minute() {
        let t = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap()
            + chrono::Duration::milliseconds(535);
        let start = minute_window_start(t);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 0).unwrap());
    }

    #[test]
    fn window_start_is_idempotent_on_boundary() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(minute_window_start(t), t);
    }
}
