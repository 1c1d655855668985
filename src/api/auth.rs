use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::db::{
    LoginCode, RequestCodeRequest, RequestCodeResponse, Session, VerifyCodeRequest,
    VerifyCodeResponse,
};
use crate::utils::{now_rfc3339, rfc3339_in};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::validation::{validate_email, validate_login_code};

/// How the current request was authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    /// The shared secret from `auth.api_token`
    ApiToken,
    /// A session created by a verified login code
    Session { session_id: String, email: String },
}

impl AuthContext {
    pub fn method(&self) -> &'static str {
        match self {
            AuthContext::ApiToken => "api_token",
            AuthContext::Session { .. } => "session",
        }
    }
}

/// Generate a random token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Generate a six digit login code
fn generate_login_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{:06}", n)
}

/// Hash a token or code for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Extract the bearer token from request headers.
///
/// Only `Authorization: Bearer <token>` is accepted.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Resolve a presented token to an auth context, if it is valid
pub async fn authenticate(state: &AppState, token: &str) -> Result<Option<AuthContext>, ApiError> {
    let api_token = &state.config.auth.api_token;
    if !api_token.is_empty() && constant_time_eq(api_token, token) {
        return Ok(Some(AuthContext::ApiToken));
    }

    let now = now_rfc3339();
    let session: Option<Session> =
        sqlx::query_as("SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?")
            .bind(hash_token(token))
            .bind(&now)
            .fetch_optional(&state.db)
            .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    sqlx::query("UPDATE sessions SET last_used_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&session.id)
        .execute(&state.db)
        .await?;

    Ok(Some(AuthContext::Session {
        session_id: session.id,
        email: session.email,
    }))
}

/// Auth middleware that validates bearer tokens
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| {
            ApiError::unauthorized(
                "Missing or invalid authorization header. Use: Bearer YOUR_TOKEN",
            )
        })?
        .to_string();

    match authenticate(&state, &token).await? {
        Some(ctx) => {
            request.extensions_mut().insert(ctx);
            Ok(next.run(request).await)
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected request with invalid token");
            Err(ApiError::unauthorized("Invalid API token"))
        }
    }
}

/// Issue a magic login code
///
/// POST /api/auth/request-code
pub async fn request_code(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RequestCodeRequest>,
) -> Result<(StatusCode, Json<RequestCodeResponse>), ApiError> {
    let email = normalize_email(&req.email);
    validate_email(&email).map_err(|e| ApiError::validation_field("email", e))?;

    let now = now_rfc3339();
    let expires_at = rfc3339_in(chrono::Duration::minutes(state.config.auth.code_ttl_minutes));

    // Only the newest code for an address stays usable
    sqlx::query("UPDATE login_codes SET used = 1 WHERE email = ? AND used = 0")
        .bind(&email)
        .execute(&state.db)
        .await?;

    let code = generate_login_code();
    sqlx::query(
        "INSERT INTO login_codes (id, email, code_hash, created_at, expires_at, attempts, used) VALUES (?, ?, ?, ?, ?, 0, 0)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&email)
    .bind(hash_token(&code))
    .bind(&now)
    .bind(&expires_at)
    .execute(&state.db)
    .await?;

    info!(email = %email, expires_at = %expires_at, "Login code issued");

    Ok((
        StatusCode::ACCEPTED,
        Json(RequestCodeResponse {
            message: "If the address is valid, a login code has been sent".to_string(),
            expires_at,
            code: state.config.auth.expose_login_codes.then_some(code),
        }),
    ))
}

/// Exchange a login code for a session token
///
/// POST /api/auth/verify
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, ApiError> {
    let email = normalize_email(&req.email);
    let code = req.code.trim();

    let mut errors = ValidationErrorBuilder::new();
    errors.check("email", validate_email(&email));
    errors.check("code", validate_login_code(code));
    errors.finish()?;

    let now = now_rfc3339();
    let login_code: Option<LoginCode> = sqlx::query_as(
        "SELECT * FROM login_codes WHERE email = ? AND used = 0 AND expires_at > ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(&email)
    .bind(&now)
    .fetch_optional(&state.db)
    .await?;

    let login_code =
        login_code.ok_or_else(|| ApiError::unauthorized("Invalid or expired login code"))?;

    if login_code.attempts >= state.config.auth.max_code_attempts {
        sqlx::query("UPDATE login_codes SET used = 1 WHERE id = ?")
            .bind(&login_code.id)
            .execute(&state.db)
            .await?;
        warn!(email = %email, "Login code burned after too many attempts");
        return Err(ApiError::rate_limited(
            "Too many attempts. Request a new login code.",
        ));
    }

    if !constant_time_eq(&login_code.code_hash, &hash_token(code)) {
        sqlx::query("UPDATE login_codes SET attempts = attempts + 1 WHERE id = ?")
            .bind(&login_code.id)
            .execute(&state.db)
            .await?;
        return Err(ApiError::unauthorized("Invalid or expired login code"));
    }

    sqlx::query("UPDATE login_codes SET used = 1 WHERE id = ?")
        .bind(&login_code.id)
        .execute(&state.db)
        .await?;

    let token = generate_token();
    let expires_at = rfc3339_in(chrono::Duration::hours(state.config.auth.session_ttl_hours));
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    sqlx::query(
        "INSERT INTO sessions (id, email, token_hash, created_at, expires_at, last_used_at, user_agent) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&email)
    .bind(hash_token(&token))
    .bind(&now)
    .bind(&expires_at)
    .bind(&now)
    .bind(&user_agent)
    .execute(&state.db)
    .await?;

    info!(email = %email, "Session created");

    Ok(Json(VerifyCodeResponse {
        token,
        email,
        expires_at,
    }))
}

/// End the current session. Static-token callers have nothing to end.
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<StatusCode, ApiError> {
    if let AuthContext::Session { session_id, email } = ctx {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(&session_id)
            .execute(&state.db)
            .await?;
        info!(email = %email, "Session ended");
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct TestAuthResponse {
    pub authenticated: bool,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub message: String,
    pub timestamp: String,
}

/// Report how the caller authenticated
///
/// GET /api/test-auth
pub async fn test_auth(Extension(ctx): Extension<AuthContext>) -> Json<TestAuthResponse> {
    let email = match &ctx {
        AuthContext::Session { email, .. } => Some(email.clone()),
        AuthContext::ApiToken => None,
    };

    Json(TestAuthResponse {
        authenticated: true,
        method: ctx.method(),
        email,
        message: "Authentication successful".to_string(),
        timestamp: now_rfc3339(),
    })
}
