//! API module - HTTP routes and handlers

pub mod handlers;
pub mod middleware;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Metering endpoints (API key auth via middleware)
            .service(
                web::scope("/track")
                    .route("", web::post().to(handlers::track::track_usage))
                    .route("", web::get().to(handlers::track::track_info)),
            )
            .service(
                web::scope("/usage")
                    .route("", web::get().to(handlers::usage::get_usage))
                    .route("/summary", web::get().to(handlers::usage::get_usage_summary)),
            )
            // API key management
            .service(
                web::scope("/keys")
                    .route("", web::post().to(handlers::keys::create_key))
                    .route("", web::get().to(handlers::keys::list_keys))
                    .route("/{id}", web::get().to(handlers::keys::get_key))
                    .route("/{id}", web::delete().to(handlers::keys::revoke_key)),
            )
            // Account endpoints
            .service(
                web::scope("/users")
                    .route("", web::get().to(handlers::users::get_profile))
                    .route("", web::patch().to(handlers::users::update_profile))
                    .route("", web::delete().to(handlers::users::delete_account))
                    .route("/sign-in", web::post().to(handlers::users::record_sign_in)),
            )
            .service(
                web::scope("/passkeys")
                    .route("", web::get().to(handlers::passkeys::list_passkeys))
                    .route("", web::post().to(handlers::passkeys::register_passkey))
                    .route("", web::patch().to(handlers::passkeys::rename_passkey))
                    .route("", web::delete().to(handlers::passkeys::delete_passkey)),
            )
            // Admin analytics
            .route("/analytics", web::get().to(handlers::analytics::get_analytics))
            // Public status
            .route("/status", web::get().to(handlers::status::status)),
    )
    .route("/health", web::get().to(handlers::health::health_check))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
}
