use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use reminders::config::Config;
use reminders::{api, db, AppState, DbPool};

const TOKEN: &str = "test-token";

async fn test_app() -> (Router, DbPool) {
    let mut config = Config::default();
    config.auth.api_token = TOKEN.to_string();
    config.auth.expose_login_codes = true;

    let pool = db::init_in_memory().await.unwrap();
    let state = Arc::new(AppState::new(config, pool.clone()));
    (api::create_router(state), pool)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(app: &Router, body: Value) -> Value {
    let (status, created) = send(app, Method::POST, "/api/reminders", Some(TOKEN), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    created
}

#[tokio::test]
async fn health_reports_database_state() {
    let (app, pool) = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    pool.close().await;

    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["database"], "disconnected");
}

#[tokio::test]
async fn root_describes_the_service() {
    let (app, _pool) = test_app().await;
    let (status, body) = send(&app, Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["health"], "/api/health");
    assert!(body["endpoints"].as_array().unwrap().len() > 5);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let (app, _pool) = test_app().await;

    let (status, body) = send(&app, Method::GET, "/api/reminders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, body) = send(&app, Method::GET, "/api/reminders", Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid API token");

    let (status, body) = send(&app, Method::GET, "/api/test-auth", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["method"], "api_token");
}

#[tokio::test]
async fn empty_configured_token_rejects_everything() {
    let pool = db::init_in_memory().await.unwrap();
    let app = api::create_router(Arc::new(AppState::new(Config::default(), pool)));

    let (status, _) = send(&app, Method::GET, "/api/reminders", Some(""), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reminder_crud_round_trip() {
    let (app, _pool) = test_app().await;

    let created = create(
        &app,
        json!({
            "text": "Call mom",
            "due_date": "2025-11-04",
            "due_time": "14:30:00",
            "priority": "important",
            "category": "Family"
        }),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["location_radius"], 100);
    assert!(created["completed_at"].is_null());

    let (status, fetched) =
        send(&app, Method::GET, &format!("/api/reminders/{}", id), Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["text"], "Call mom");
    assert_eq!(fetched["priority"], "important");

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/api/reminders/{}", id),
        Some(TOKEN),
        Some(json!({"status": "completed", "category": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "completed");
    assert!(updated["completed_at"].is_string());
    assert!(updated["category"].is_null());
    assert_eq!(updated["text"], "Call mom");

    let (status, body) =
        send(&app, Method::DELETE, &format!("/api/reminders/{}", id), Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, body) =
        send(&app, Method::GET, &format!("/api/reminders/{}", id), Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");

    let (status, _) =
        send(&app, Method::DELETE, &format!("/api/reminders/{}", id), Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/reminders/missing",
        Some(TOKEN),
        Some(json!({"text": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_payloads_are_rejected() {
    let (app, _pool) = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/reminders",
        Some(TOKEN),
        Some(json!({"text": "  ", "due_date": "tomorrow", "location_lat": 91.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    let details = body["details"].as_object().unwrap();
    assert!(details.contains_key("text"));
    assert!(details.contains_key("due_date"));
    assert!(details.contains_key("location_lat"));

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/reminders?limit=0",
        Some(TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let (app, _pool) = test_app().await;

    create(&app, json!({"text": "a", "priority": "urgent", "category": "Work"})).await;
    create(&app, json!({"text": "b", "priority": "urgent", "category": "Home"})).await;
    create(&app, json!({"text": "c", "priority": "chill", "category": "Work"})).await;
    create(&app, json!({"text": "d", "status": "completed"})).await;

    let (status, body) = send(&app, Method::GET, "/api/reminders", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
    assert_eq!(body["pagination"]["total"], 4);
    assert_eq!(body["pagination"]["limit"], 100);

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/reminders?priority=urgent&category=Work",
        Some(TOKEN),
        None,
    )
    .await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["text"], "a");

    let (_, body) = send(&app, Method::GET, "/api/reminders?status=completed", Some(TOKEN), None).await;
    assert_eq!(body["data"][0]["text"], "d");
    assert!(body["data"][0]["completed_at"].is_string());

    let (_, body) = send(&app, Method::GET, "/api/reminders?limit=2&offset=3", Some(TOKEN), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 4);
    assert_eq!(body["pagination"]["returned"], 1);
}

#[tokio::test]
async fn near_location_sorts_by_distance() {
    let (app, _pool) = test_app().await;

    create(
        &app,
        json!({"text": "far", "location_lat": 37.7849, "location_lng": -122.4094}),
    )
    .await;
    create(
        &app,
        json!({"text": "near", "location_lat": 37.7750, "location_lng": -122.4195}),
    )
    .await;
    create(
        &app,
        json!({"text": "other city", "location_lat": 40.7128, "location_lng": -74.0060}),
    )
    .await;
    create(&app, json!({"text": "nowhere"})).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/reminders/near-location?lat=37.7749&lng=-122.4194&radius=2000",
        Some(TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["text"], "near");
    assert_eq!(data[1]["text"], "far");
    let first = data[0]["distance"].as_f64().unwrap();
    let second = data[1]["distance"].as_f64().unwrap();
    assert!(first < 50.0);
    assert!(first < second && second <= 2000.0);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/reminders/near-location?lat=100&lng=0",
        Some(TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_routes_list_available_endpoints() {
    let (app, _pool) = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
    assert!(body["available_endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "GET /api/health"));
}

async fn send_raw(app: &Router, method: Method, uri: &str, body: &'static str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json",
        "{} {}",
        status,
        uri
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let (app, _pool) = test_app().await;

    let (status, body) = send_raw(
        &app,
        Method::POST,
        "/api/reminders",
        r#"{"text":"x","priority":"bogus"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");
    assert_eq!(body["code"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("bogus"));

    let (status, body) = send_raw(&app, Method::POST, "/api/reminders", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    let (status, body) = send_raw(&app, Method::POST, "/api/sync", "[]").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");

    let (status, body) =
        send_raw(&app, Method::GET, "/api/reminders/near-location?lng=1", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("lat"));

    let (status, body) = send_raw(&app, Method::GET, "/api/reminders?status=bogus", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = send_raw(&app, Method::PUT, "/api/reminders", "{}").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method Not Allowed");
    assert_eq!(body["code"], "method_not_allowed");
}

#[tokio::test]
async fn token_must_match_exactly() {
    let (app, _pool) = test_app().await;
    let padded = format!("{} ", TOKEN);
    let (status, _) = send(&app, Method::GET, "/api/test-auth", Some(padded.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_code_flow_issues_a_working_session() {
    let (app, _pool) = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/request-code",
        None,
        Some(json!({"email": " Me@Example.com "})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let code = body["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/verify",
        None,
        Some(json!({"email": "me@example.com", "code": "000000"})),
    )
    .await;
    // A wrong guess only fails when it differs from the issued code
    if code != "000000" {
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/verify",
        None,
        Some(json!({"email": "me@example.com", "code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "me@example.com");
    let session = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/test-auth", Some(session.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "session");
    assert_eq!(body["email"], "me@example.com");

    // Codes are single use
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/verify",
        None,
        Some(json!({"email": "me@example.com", "code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(session.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/api/reminders", Some(session.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn request_code_rejects_bad_email() {
    let (app, _pool) = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/request-code",
        None,
        Some(json!({"email": "not-an-email"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["email"].is_array());
}

#[tokio::test]
async fn sync_applies_new_changes_and_reports_server_rows() {
    let (app, _pool) = test_app().await;
    let server_only = create(&app, json!({"text": "made on the server"})).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/sync",
        Some(TOKEN),
        Some(json!({
            "client_id": "phone",
            "changes": [{
                "id": "local-1",
                "action": "create",
                "data": {"text": "made offline", "priority": "urgent"},
                "updated_at": "2025-11-03T10:00:00.000Z"
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["applied_count"], 1);
    assert!(body["conflicts"].as_array().unwrap().is_empty());
    assert!(body["last_sync"].is_string());

    let server_changes = body["server_changes"].as_array().unwrap();
    assert_eq!(server_changes.len(), 1);
    assert_eq!(server_changes[0]["id"], server_only["id"]);
    assert_eq!(server_changes[0]["action"], "create");

    let (status, stored) = send(&app, Method::GET, "/api/reminders/local-1", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["priority"], "urgent");
    assert_eq!(stored["updated_at"], "2025-11-03T10:00:00.000Z");
    assert!(stored["synced_at"].is_string());

    // Nothing changed since the returned stamp
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/sync",
        Some(TOKEN),
        Some(json!({"client_id": "phone", "last_sync": body["last_sync"], "changes": []})),
    )
    .await;
    assert!(body["server_changes"].as_array().unwrap().is_empty());
    assert_eq!(body["applied_count"], 0);
}

#[tokio::test]
async fn sync_resolves_conflicts_by_last_write() {
    let (app, _pool) = test_app().await;
    let reminder = create(&app, json!({"text": "shared", "priority": "chill"})).await;
    let id = reminder["id"].as_str().unwrap().to_string();

    // Older client edit loses
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/sync",
        Some(TOKEN),
        Some(json!({
            "client_id": "phone",
            "last_sync": "2020-01-01T00:00:00.000Z",
            "changes": [{
                "id": id,
                "action": "update",
                "data": {"priority": "urgent"},
                "updated_at": "2021-01-01T00:00:00.000Z"
            }]
        })),
    )
    .await;
    assert_eq!(body["applied_count"], 0);
    assert_eq!(body["conflicts"][0]["resolution"], "server_wins");
    assert_eq!(body["conflicts"][0]["client_updated_at"], "2021-01-01T00:00:00.000Z");

    let (_, stored) = send(&app, Method::GET, &format!("/api/reminders/{}", id), Some(TOKEN), None).await;
    assert_eq!(stored["priority"], "chill");

    // Newer client edit wins and is still reported
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/sync",
        Some(TOKEN),
        Some(json!({
            "client_id": "phone",
            "last_sync": "2020-01-01T00:00:00.000Z",
            "changes": [{
                "id": id,
                "action": "update",
                "data": {"priority": "urgent"},
                "updated_at": "2999-01-01T00:00:00.000Z"
            }]
        })),
    )
    .await;
    assert_eq!(body["applied_count"], 1);
    assert_eq!(body["conflicts"][0]["resolution"], "client_wins");

    let (_, stored) = send(&app, Method::GET, &format!("/api/reminders/{}", id), Some(TOKEN), None).await;
    assert_eq!(stored["priority"], "urgent");
    assert_eq!(stored["text"], "shared");

    // Deletes replay too
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/sync",
        Some(TOKEN),
        Some(json!({
            "client_id": "phone",
            "changes": [{"id": id, "action": "delete", "data": null, "updated_at": "2999-01-02T00:00:00Z"}]
        })),
    )
    .await;
    assert_eq!(body["applied_count"], 1);
    let (status, _) = send(&app, Method::GET, &format!("/api/reminders/{}", id), Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sync_rejects_the_whole_batch_on_bad_input() {
    let (app, _pool) = test_app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/sync",
        Some(TOKEN),
        Some(json!({
            "client_id": "phone",
            "changes": [
                {"id": "ok", "action": "create", "data": {"text": "fine"}, "updated_at": "2025-11-03T10:00:00Z"},
                {"id": "bad", "action": "update", "data": {"text": "x"}, "updated_at": "yesterday"}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/api/reminders/ok", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/sync",
        Some(TOKEN),
        Some(json!({"client_id": " ", "changes": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cors_preflight_allows_configured_origins() {
    let (app, _pool) = test_app().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/reminders")
        .header(header::ORIGIN, "http://localhost:3077")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3077"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/health")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn recurrence_pattern_crud() {
    let (app, _pool) = test_app().await;

    let (status, pattern) = send(
        &app,
        Method::POST,
        "/api/recurrence",
        Some(TOKEN),
        Some(json!({"frequency": "weekly", "interval": 2, "days_of_week": "0,4"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", pattern);
    let id = pattern["id"].as_str().unwrap().to_string();
    assert_eq!(pattern["frequency"], "weekly");
    assert_eq!(pattern["interval"], 2);
    assert!(pattern["end_count"].is_null());

    let uri = format!("/api/recurrence/{}", id);
    let (status, fetched) = send(&app, Method::GET, &uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["days_of_week"], "0,4");

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(TOKEN),
        Some(json!({"end_count": 10, "days_of_week": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["end_count"], 10);
    assert!(updated["days_of_week"].is_null());
    assert_eq!(updated["interval"], 2);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, Method::GET, &uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
    let (status, _) = send(&app, Method::DELETE, &uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_patterns_are_rejected_field_by_field() {
    let (app, _pool) = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/recurrence",
        Some(TOKEN),
        Some(json!({
            "frequency": "monthly",
            "interval": 0,
            "day_of_month": 32,
            "end_count": 0,
            "end_date": "someday"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let details = body["details"].as_object().unwrap();
    for field in ["interval", "day_of_month", "end_count", "end_date"] {
        assert!(details.contains_key(field), "missing {}: {}", field, body);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/recurrence",
        Some(TOKEN),
        Some(json!({"frequency": "hourly"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/reminders",
        Some(TOKEN),
        Some(json!({
            "text": "Water plants",
            "recurrence_pattern": {"frequency": "weekly", "days_of_week": "7"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]
        .as_object()
        .unwrap()
        .contains_key("recurrence_pattern.days_of_week"));
}

#[tokio::test]
async fn embedded_pattern_creates_linked_instances() {
    let (app, _pool) = test_app().await;
    let today = chrono::Utc::now().date_naive();

    let base = create(
        &app,
        json!({
            "text": "Stretch",
            "priority": "important",
            "due_date": today.to_string(),
            "due_time": "07:30",
            "recurrence_pattern": {"frequency": "daily", "end_count": 3}
        }),
    )
    .await;
    let pattern_id = base["recurrence_id"].as_str().unwrap().to_string();

    let (_, body) = send(&app, Method::GET, "/api/reminders", Some(TOKEN), None).await;
    let linked: Vec<&Value> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["recurrence_id"] == pattern_id.as_str())
        .collect();
    assert_eq!(linked.len(), 3);
    let mut dates: Vec<&str> = linked.iter().map(|r| r["due_date"].as_str().unwrap()).collect();
    dates.sort();
    dates.dedup();
    assert_eq!(dates.len(), 3);
    assert_eq!(dates[0], today.to_string());
    assert!(linked.iter().all(|r| r["text"] == "Stretch" && r["priority"] == "important"));

    let uri = format!("/api/recurrence/{}", pattern_id);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let base_uri = format!("/api/reminders/{}", base["id"].as_str().unwrap());
    let (status, kept) = send(&app, Method::GET, &base_uri, Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(kept["recurrence_id"].is_null());
    let (_, body) = send(&app, Method::GET, "/api/reminders", Some(TOKEN), None).await;
    assert_eq!(body["pagination"]["total"], 3);
}

#[tokio::test]
async fn instances_are_generated_from_a_template() {
    let (app, _pool) = test_app().await;
    let today = chrono::Utc::now().date_naive();

    let (_, pattern) = send(
        &app,
        Method::POST,
        "/api/recurrence",
        Some(TOKEN),
        Some(json!({"frequency": "weekly", "end_count": 4})),
    )
    .await;
    let uri = format!("/api/recurrence/{}/instances", pattern["id"].as_str().unwrap());

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(TOKEN),
        Some(json!({"text": "Bins out", "due_date": today.to_string()})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["count"], 4);
    assert_eq!(body["pattern_id"], pattern["id"]);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data[0]["due_date"], today.to_string());
    assert_eq!(data[1]["due_date"], (today + chrono::Days::new(7)).to_string());
    assert!(data.iter().all(|r| r["recurrence_id"] == pattern["id"]));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/recurrence/missing/instances",
        Some(TOKEN),
        Some(json!({"text": "Bins out"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(TOKEN),
        Some(json!({"text": "Nested", "recurrence_pattern": {"frequency": "daily"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
