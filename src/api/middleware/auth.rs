//! API Key Authentication
//!
//! Validates bearer keys from the Authorization header or X-API-Key.
//! Stores authenticated key info in request extensions for downstream handlers.

use actix_web::{
    dev::ServiceRequest, error::ErrorUnauthorized, http::header::AUTHORIZATION, Error,
    HttpMessage,
};
use tracing::{debug, warn};

use crate::db::{is_valid_key_format, ApiKeyRepository, DbApiKey};

/// Header name for API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Extract API key from request headers
pub fn extract_api_key(req: &ServiceRequest) -> Option<String> {
    // First try X-API-Key
    if let Some(key) = req.headers().get(API_KEY_HEADER) {
        if let Ok(key_str) = key.to_str() {
            return Some(key_str.to_string());
        }
    }

    // Then Authorization: Bearer <key>
    if let Some(auth) = req.headers().get(AUTHORIZATION) {
        if let Ok(auth_str) = auth.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    None
}

/// Validate an API key and return the matching row
pub async fn validate_api_key(
    api_key: &str,
    api_key_repo: &ApiKeyRepository,
) -> Result<DbApiKey, Error> {
    if !is_valid_key_format(api_key) {
        warn!("Invalid API key format");
        return Err(ErrorUnauthorized(
            "Invalid API key format. Keys start with mnnr_live_ or mnnr_test_",
        ));
    }

    match api_key_repo.find_by_key(api_key).await {
        Ok(Some(key)) => {
            if !key.is_valid() {
                warn!(key_id = %key.id, "API key is expired");
                return Err(ErrorUnauthorized("API key has expired"));
            }

            // Update last used timestamp (fire and forget)
            let key_id = key.id;
            let pool = api_key_repo.pool.clone();
            tokio::spawn(async move {
                let repo = ApiKeyRepository::new(pool);
                let _ = repo.touch(key_id).await;
            });

            debug!(key_id = %key.id, key_prefix = %key.key_prefix, "API key validated");
            Ok(key)
        }
        Ok(None) => {
            warn!("API key not found");
            Err(ErrorUnauthorized("Invalid API key"))
        }
        Err(e) => {
            warn!(error = %e, "Failed to validate API key");
            Err(ErrorUnauthorized("Authentication failed"))
        }
    }
}

/// Authentication result stored in request extensions
#[derive(Clone)]
pub struct ApiKeyAuth {
    pub key_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub key_prefix: String,
    /// Per-minute limit; None falls back to the configured default
    pub rate_limit: Option<i32>,
}

impl From<&DbApiKey> for ApiKeyAuth {
    fn from(key: &DbApiKey) -> Self {
        Self {
            key_id: key.id,
            user_id: key.user_id,
            key_prefix: key.key_prefix.clone(),
            rate_limit: key.rate_limit,
        }
    }
}

/// Trait for reading the authenticated key from request extensions
pub trait ApiKeyExt {
    fn api_key(&self) -> Option<ApiKeyAuth>;
}

impl<T: HttpMessage> ApiKeyExt for T {
    fn api_key(&self) -> Option<ApiKeyAuth> {
        self.extensions().get::<ApiKeyAuth>().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn extracts_from_x_api_key_header() {
        let req = TestRequest::default()
            .insert_header((API_KEY_HEADER, "mnnr_live_abc"))
            .to_srv_request();
        assert_eq!(extract_api_key(&req).as_deref(), Some("mnnr_live_abc"));
    }

    #[test]
    fn extracts_from_bearer_authorization() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer mnnr_test_xyz"))
            .to_srv_request();
        assert_eq!(extract_api_key(&req).as_deref(), Some("mnnr_test_xyz"));
    }

    #[test]
    fn x_api_key_wins_over_authorization() {
        let req = TestRequest::default()
            .insert_header((API_KEY_HEADER, "mnnr_live_first"))
            .insert_header(("Authorization", "Bearer mnnr_live_second"))
            .to_srv_request();
        assert_eq!(extract_api_key(&req).as_deref(), Some("mnnr_live_first"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_srv_request();
        assert_eq!(extract_api_key(&req), None);
    }

    #[test]
    fn missing_headers_yield_none() {
        let req = TestRequest::default().to_srv_request();
        assert_eq!(extract_api_key(&req), None);
    }
}
