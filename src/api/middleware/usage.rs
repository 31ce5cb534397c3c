//! Request context extraction for the audit trail
//!
//! Client IP, user agent and timing helpers used when recording request logs.

use actix_web::dev::ServiceRequest;
use std::net::IpAddr;
use std::time::Instant;
use tracing::warn;

use crate::db::{RequestLogEntry, UsageRepository};

/// Request timing context
#[derive(Clone, Debug)]
pub struct RequestTiming {
    start: Instant,
}

impl RequestTiming {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_ms(&self) -> i32 {
        self.start.elapsed().as_millis() as i32
    }
}

impl Default for RequestTiming {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract client IP from request, preferring proxy headers
pub fn extract_client_ip(req: &ServiceRequest) -> Option<IpAddr> {
    // X-Forwarded-For may contain multiple IPs; take the first (client)
    if let Some(forwarded) = req.headers().get("X-Forwarded-For") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("X-Real-IP") {
        if let Ok(ip_str) = real_ip.to_str() {
            if let Ok(ip) = ip_str.parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }

    req.peer_addr().map(|addr| addr.ip())
}

/// Extract user agent, truncated to a sane length
pub fn extract_user_agent(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.chars().take(500).collect())
}

/// Identifier for in-process rate limiting: authenticated user, else IP
pub fn client_identifier(req: &ServiceRequest) -> String {
    if let Some(user_id) = req.headers().get("X-User-Id") {
        if let Ok(id) = user_id.to_str() {
            return format!("user:{}", id);
        }
    }

    match extract_client_ip(req) {
        Some(ip) => format!("ip:{}", ip),
        None => "ip:unknown".to_string(),
    }
}

/// Persist a request log entry asynchronously (fire and forget)
pub fn log_request_async(usage_repo: UsageRepository, entry: RequestLogEntry) {
    tokio::spawn(async move {
        if let Err(e) = usage_repo.log_request(entry).await {
            warn!(error = %e, "Failed to record request log");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .to_srv_request();
        assert_eq!(extract_client_ip(&req), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn real_ip_is_second_choice() {
        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "198.51.100.4"))
            .to_srv_request();
        assert_eq!(extract_client_ip(&req), Some("198.51.100.4".parse().unwrap()));
    }

    #[test]
    fn garbage_forwarded_header_falls_through() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "not-an-ip"))
            .to_srv_request();
        assert_eq!(extract_client_ip(&req), None);
    }

    #[test]
    fn identifier_prefers_user_header() {
        let req = TestRequest::default()
            .insert_header(("X-User-Id", "u-123"))
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_srv_request();
        assert_eq!(client_identifier(&req), "user:u-123");
    }

    #[test]
    fn identifier_falls_back_to_ip() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_srv_request();
        assert_eq!(client_identifier(&req), "ip:203.0.113.7");
    }

    #[test]
    fn user_agent_is_truncated() {
        let long_ua = "x".repeat(600);
        let req = TestRequest::default()
            .insert_header(("User-Agent", long_ua))
            .to_srv_request();
        assert_eq!(extract_user_agent(&req).map(|s| s.len()), Some(500));
    }
}
