//! Credentialed login endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::throttle::LoginPolicy;
use crate::token::IssueContext;

use super::{
    session::apply_pair,
    state::AuthState,
    storage::verify_password,
    types::{ErrorResponse, IdentityResponse, LoginRequest, RateLimitedResponse},
    utils::{extract_client_agent, extract_client_ip, normalize_identifier, valid_identifier},
    LOGIN_PATH,
};

/// Verified against when the identifier matches no user, so unknown and
/// known identifiers take a comparable amount of time.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$gZiV/M1gPc22ElAH/Jh1Hw$CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, both token cookies set", body = IdentityResponse),
        (status = 400, description = "Missing or malformed credentials", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 429, description = "Blocked by attempt policy", body = RateLimitedResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<serde_json::Value>>,
) -> impl IntoResponse {
    let body = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing payload")),
            )
                .into_response()
        }
    };

    // The bound policy names the body fields that carry the credentials.
    let policy = state
        .policies()
        .resolve(LOGIN_PATH)
        .unwrap_or_else(|| Arc::new(LoginPolicy::new()));

    let Some(identifier) = body
        .get(policy.username_field())
        .and_then(serde_json::Value::as_str)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing credentials")),
        )
            .into_response();
    };
    let Some(secret) = body
        .get(policy.password_field())
        .and_then(serde_json::Value::as_str)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing credentials")),
        )
            .into_response();
    };

    let identifier = normalize_identifier(identifier);
    if !valid_identifier(&identifier) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid identifier")),
        )
            .into_response();
    }

    let user = match state.users().find_by_identifier(&identifier).await {
        Ok(user) => user,
        Err(err) => {
            error!("Login lookup failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Login failed")),
            )
                .into_response();
        }
    };

    let Some(user) = user else {
        let _ = verify_password(DUMMY_HASH, secret);
        debug!("Login attempt for unknown identifier");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Unauthorized")),
        )
            .into_response();
    };

    if !verify_password(&user.password_hash, secret) {
        debug!("Login attempt with wrong secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Unauthorized")),
        )
            .into_response();
    }

    let context = IssueContext {
        origin_address: extract_client_ip(&headers),
        client_agent: extract_client_agent(&headers),
        auto_refreshed: false,
    };
    let pair = match state.codec().issue_pair(user.id, &context) {
        Ok(pair) => pair,
        Err(err) => {
            error!("Failed to issue token pair: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Login failed")),
            )
                .into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    if !apply_pair(&mut response_headers, state.config(), &pair) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Login failed")),
        )
            .into_response();
    }

    let identity = IdentityResponse {
        id: user.id,
        username: user.username,
        role: user.role,
    };
    (StatusCode::OK, response_headers, Json(identity)).into_response()
}
