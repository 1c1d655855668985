//! Unauthenticated service routes and the global failure responses.

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;

use super::error::{ApiError, ErrorCode};
use crate::db::count_reminders;
use crate::utils::now_rfc3339;
use crate::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Routes advertised by the descriptor and the 404 body
pub const AVAILABLE_ENDPOINTS: &[&str] = &[
    "GET /",
    "GET /api/health",
    "GET /api/reminders",
    "POST /api/reminders",
    "GET /api/reminders/:id",
    "PATCH /api/reminders/:id",
    "DELETE /api/reminders/:id",
    "GET /api/reminders/near-location",
    "POST /api/recurrence",
    "GET /api/recurrence/:id",
    "PATCH /api/recurrence/:id",
    "DELETE /api/recurrence/:id",
    "POST /api/recurrence/:id/instances",
    "GET /api/test-auth",
    "POST /api/auth/request-code",
    "POST /api/auth/verify",
    "POST /api/auth/logout",
    "POST /api/sync",
];

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub timestamp: String,
}

/// Health check. Always 200; a failing store is reported in the body.
///
/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, database) = match count_reminders(&state.db).await {
        Ok(_) => ("ok", "connected"),
        Err(e) => {
            tracing::error!(error = %e, "Health check database query failed");
            ("error", "disconnected")
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: VERSION.to_string(),
        database: database.to_string(),
        timestamp: now_rfc3339(),
    })
}

/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Reminders API",
        "version": VERSION,
        "status": "running",
        "health": "/api/health",
        "endpoints": AVAILABLE_ENDPOINTS,
    }))
}

pub async fn not_found(method: Method, uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("No route for {} {}", method, uri.path()),
            "available_endpoints": AVAILABLE_ENDPOINTS,
        })),
    )
        .into_response()
}

/// Give the router's bare 405 responses the JSON error body, keeping `Allow`
pub async fn method_not_allowed(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut json = ApiError::new(
        ErrorCode::MethodNotAllowed,
        "Method not allowed for this route",
    )
    .into_response();
    if let Some(allow) = allow {
        json.headers_mut().insert(header::ALLOW, allow);
    }
    json
}

/// Convert a handler panic into a JSON 500 for `CatchPanicLayer`
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");

    ApiError::new(ErrorCode::InternalError, "An unexpected error occurred").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payloads_become_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = handle_panic(Box::new(String::from("boom")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = handle_panic(Box::new(42_u8));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_bare_405_gets_an_error_body() {
        let bare = (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET,POST")],
        )
            .into_response();
        let response = method_not_allowed(bare).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET,POST");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let ok = method_not_allowed(StatusCode::OK.into_response()).await;
        assert_eq!(ok.status(), StatusCode::OK);
    }

    #[test]
    fn test_endpoint_list_covers_health_and_crud() {
        assert!(AVAILABLE_ENDPOINTS.contains(&"GET /api/health"));
        assert!(AVAILABLE_ENDPOINTS.contains(&"DELETE /api/reminders/:id"));
    }
}
