//! Combined API middleware
//!
//! Single actix-web Transform handling, per path class:
//! - public paths: passed through untouched
//! - key-scoped paths: API key auth, per-key sliding window, request logging
//! - user/admin paths: in-process per-identifier rate limiting
//!   (handlers do their own identity checks)

use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::db::{ApiKeyRepository, DbPool, RequestLogEntry, UsageRepository};

use super::auth::{extract_api_key, validate_api_key, ApiKeyAuth};
use super::rate_limit::{
    class_limit_exceeded_response, rate_limit_exceeded_response, ClassLimiters, LimiterClass,
    RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET,
};
use super::usage::{client_identifier, extract_client_ip, extract_user_agent, log_request_async};

/// How the middleware treats a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// No auth, no limiting
    Public,
    /// API key auth + per-key sliding window
    Keyed,
    /// In-process identifier limiting
    Limited(LimiterClass),
}

/// Classify a request path
pub fn classify_path(path: &str, method: &str) -> PathClass {
    const PUBLIC: &[&str] = &["/health", "/api/v1/status", "/swagger-ui", "/api-docs"];
    if PUBLIC.iter().any(|p| path.starts_with(p)) {
        return PathClass::Public;
    }

    if path.starts_with("/api/v1/track") {
        // GET serves self-documentation and stays open
        return if method == "GET" {
            PathClass::Public
        } else {
            PathClass::Keyed
        };
    }
    if path.starts_with("/api/v1/usage") {
        return PathClass::Keyed;
    }

    if path.starts_with("/api/v1/keys") {
        return PathClass::Limited(LimiterClass::Keys);
    }
    if path.starts_with("/api/v1/users") || path.starts_with("/api/v1/passkeys") {
        return PathClass::Limited(LimiterClass::Auth);
    }

    PathClass::Limited(LimiterClass::Api)
}

/// Middleware factory
pub struct ApiMiddleware {
    pool: DbPool,
    limiters: Arc<ClassLimiters>,
    default_rate_limit: i32,
}

impl ApiMiddleware {
    pub fn new(pool: DbPool, limiters: Arc<ClassLimiters>, default_rate_limit: i32) -> Self {
        Self {
            pool,
            limiters,
            default_rate_limit,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Transform = ApiMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiMiddlewareService {
            service: Rc::new(service),
            pool: self.pool.clone(),
            limiters: self.limiters.clone(),
            default_rate_limit: self.default_rate_limit,
        })
    }
}

/// The actual middleware service
pub struct ApiMiddlewareService<S> {
    service: Rc<S>,
    pool: DbPool,
    limiters: Arc<ClassLimiters>,
    default_rate_limit: i32,
}

impl<S, B> Service<ServiceRequest> for ApiMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut core::task::Context<'_>,
    ) -> core::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let pool = self.pool.clone();
        let limiters = self.limiters.clone();
        let default_rate_limit = self.default_rate_limit;
        let path = req.path().to_string();
        let method = req.method().to_string();

        Box::pin(async move {
            let start = Instant::now();

            match classify_path(&path, &method) {
                PathClass::Public => {
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }

                PathClass::Limited(class) => {
                    let identifier = client_identifier(&req);
                    if !limiters.check(class, &identifier) {
                        warn!(%identifier, ?class, "In-process rate limit exceeded");
                        let response = class_limit_exceeded_response();
                        return Ok(req.into_response(response).map_into_right_body());
                    }
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }

                PathClass::Keyed => {
                    let api_key = match extract_api_key(&req) {
                        Some(key) => key,
                        None => {
                            let response = HttpResponse::Unauthorized().json(serde_json::json!({
                                "error": "unauthorized",
                                "message": "API key required. Provide via Authorization: Bearer <key> or X-API-Key",
                                "hint": "Keys start with mnnr_live_ or mnnr_test_"
                            }));
                            return Ok(req.into_response(response).map_into_right_body());
                        }
                    };

                    let api_key_repo = ApiKeyRepository::new(pool.clone());
                    let db_key = match validate_api_key(&api_key, &api_key_repo).await {
                        Ok(key) => key,
                        Err(e) => {
                            let response = HttpResponse::Unauthorized().json(serde_json::json!({
                                "error": "unauthorized",
                                "message": e.to_string()
                            }));
                            return Ok(req.into_response(response).map_into_right_body());
                        }
                    };

                    let auth = ApiKeyAuth::from(&db_key);
                    let key_id = auth.key_id;
                    let limit = auth.rate_limit.unwrap_or(default_rate_limit);

                    let usage_repo = UsageRepository::new(pool.clone());
                    let rate_status = match usage_repo.check_rate_limit(key_id, limit).await {
                        Ok(status) => status,
                        Err(e) => {
                            warn!(error = %e, "Rate limit check failed");
                            let response =
                                HttpResponse::InternalServerError().json(serde_json::json!({
                                    "error": "internal_error",
                                    "message": "Rate limit check failed"
                                }));
                            return Ok(req.into_response(response).map_into_right_body());
                        }
                    };

                    if !rate_status.allowed {
                        warn!(
                            key_id = %key_id,
                            current = rate_status.current_count,
                            limit = rate_status.limit,
                            "Rate limit exceeded"
                        );
                        let response = rate_limit_exceeded_response(&rate_status);
                        return Ok(req.into_response(response).map_into_right_body());
                    }

                    req.extensions_mut().insert(auth);

                    let ip_address = extract_client_ip(&req);
                    let user_agent = extract_user_agent(&req);

                    let res = service.call(req).await?;

                    let status_code = res.status();
                    let response_time_ms = start.elapsed().as_millis() as i32;
                    let error_code = if status_code.is_client_error() || status_code.is_server_error()
                    {
                        Some(status_code.to_string())
                    } else {
                        None
                    };

                    log_request_async(
                        UsageRepository::new(pool),
                        RequestLogEntry {
                            api_key_id: key_id,
                            endpoint: path,
                            method,
                            status_code: status_code.as_u16() as i32,
                            response_time_ms: Some(response_time_ms),
                            error_code,
                            ip_address,
                            user_agent,
                        },
                    );

                    // Attach rate limit headers to the successful response
                    let mut res = res.map_into_left_body();
                    let headers = res.headers_mut();
                    if let (Ok(name), Ok(value)) =
                        (RATE_LIMIT_LIMIT.parse(), rate_status.limit.to_string().parse())
                    {
                        headers.insert(name, value);
                    }
                    let remaining = (rate_status.limit - rate_status.current_count).max(0);
                    if let (Ok(name), Ok(value)) =
                        (RATE_LIMIT_REMAINING.parse(), remaining.to_string().parse())
                    {
                        headers.insert(name, value);
                    }
                    if let (Ok(name), Ok(value)) = (
                        RATE_LIMIT_RESET.parse(),
                        rate_status.reset_at.timestamp().to_string().parse(),
                    ) {
                        headers.insert(name, value);
                    }

                    Ok(res)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths_skip_auth() {
        assert_eq!(classify_path("/health", "GET"), PathClass::Public);
        assert_eq!(classify_path("/api/v1/status", "GET"), PathClass::Public);
        assert_eq!(classify_path("/swagger-ui/index.html", "GET"), PathClass::Public);
        assert_eq!(classify_path("/api-docs/openapi.json", "GET"), PathClass::Public);
    }

    #[test]
    fn metering_paths_require_a_key() {
        assert_eq!(classify_path("/api/v1/track", "POST"), PathClass::Keyed);
        assert_eq!(classify_path("/api/v1/usage", "GET"), PathClass::Keyed);
        assert_eq!(classify_path("/api/v1/usage/summary", "GET"), PathClass::Keyed);
    }

    #[test]
    fn track_docs_are_public() {
        assert_eq!(classify_path("/api/v1/track", "GET"), PathClass::Public);
    }

    #[test]
    fn user_scoped_paths_map_to_limiter_classes() {
        assert_eq!(
            classify_path("/api/v1/keys", "POST"),
            PathClass::Limited(LimiterClass::Keys)
        );
        assert_eq!(
            classify_path("/api/v1/keys/8c3f", "DELETE"),
            PathClass::Limited(LimiterClass::Keys)
        );
        assert_eq!(
            classify_path("/api/v1/users", "GET"),
            PathClass::Limited(LimiterClass::Auth)
        );
        assert_eq!(
            classify_path("/api/v1/passkeys", "PATCH"),
            PathClass::Limited(LimiterClass::Auth)
        );
        assert_eq!(
            classify_path("/api/v1/analytics", "GET"),
            PathClass::Limited(LimiterClass::Api)
        );
    }
}
