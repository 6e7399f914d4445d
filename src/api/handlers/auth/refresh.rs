//! Explicit refresh endpoint.
//!
//! Mounted outside the session interceptor so the client's own refresh
//! calls never trigger a second, nested rotation.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

use crate::token::{IssueContext, TokenType};

use super::{
    session::{apply_pair, extract_token, REFRESH_COOKIE_NAME},
    state::AuthState,
    types::{ErrorResponse, IdentityResponse},
    utils::{extract_client_agent, extract_client_ip},
};

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    responses(
        (status = 200, description = "Pair rotated, both cookies reset", body = IdentityResponse),
        (status = 401, description = "Missing or rejected refresh token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(headers: HeaderMap, state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let Some(token) = extract_token(&headers, REFRESH_COOKIE_NAME) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Authentication required")),
        )
            .into_response();
    };

    let claims = match state.codec().validate(&token) {
        Ok(claims) => claims,
        Err(err) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(format!("Refresh rejected: {err}"))),
            )
                .into_response()
        }
    };
    if let Err(err) = claims.assert_type(TokenType::Refresh) {
        error!("Refresh cookie carried a non-refresh token: {err}");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(format!("Refresh rejected: {err}"))),
        )
            .into_response();
    }

    let user = match state.users().find_by_id(claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Unknown subject")),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to resolve refresh subject: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Refresh failed")),
            )
                .into_response();
        }
    };

    // Client-initiated rotation: no auto-refresh marker.
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
                Json(ErrorResponse::new("Refresh failed")),
            )
                .into_response();
        }
    };

    let mut response_headers = HeaderMap::new();
    if !apply_pair(&mut response_headers, state.config(), &pair) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Refresh failed")),
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
