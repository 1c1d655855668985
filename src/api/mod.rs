pub mod auth;
pub mod error;
pub mod extract;
mod recurrence;
mod reminders;
mod sync;
pub mod system;
pub mod validation;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::AppState;

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/request-code", post(auth::request_code))
        .route("/verify", post(auth::verify_code));

    // Protected API routes
    let api_routes = Router::new()
        // Reminders
        .route(
            "/reminders",
            get(reminders::list_reminders).post(reminders::create_reminder),
        )
        .route("/reminders/near-location", get(reminders::near_location))
        .route(
            "/reminders/:id",
            get(reminders::get_reminder)
                .patch(reminders::update_reminder)
                .delete(reminders::delete_reminder),
        )
        // Recurrence
        .route("/recurrence", post(recurrence::create_pattern))
        .route(
            "/recurrence/:id",
            get(recurrence::get_pattern)
                .patch(recurrence::update_pattern)
                .delete(recurrence::delete_pattern),
        )
        .route("/recurrence/:id/instances", post(recurrence::create_instances))
        // Sync
        .route("/sync", post(sync::sync))
        // Session
        .route("/auth/logout", post(auth::logout))
        .route("/test-auth", get(auth::test_auth))
        // Protected by auth
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(system::root))
        .route("/api/health", get(system::health))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .fallback(system::not_found)
        .layer(middleware::map_response(system::method_not_allowed))
        .layer(CatchPanicLayer::custom(system::handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors))
        .with_state(state)
}
