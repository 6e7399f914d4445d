//! Session interceptor for protected routes.
//!
//! Flow Overview:
//! 1) Validate the presented access cookie; pass through when it is valid
//!    or absent (downstream authorization owns the missing-credential case).
//! 2) On an expired or invalid access token, attempt a silent refresh from
//!    the refresh cookie and mint a new pair.
//! 3) After the downstream handler responds, rewrite both cookies and flag
//!    the rotation in a response header.
//!
//! The login, refresh, and logout endpoints are mounted outside this
//! middleware so a refresh can never recurse into itself. The rotated pair
//! is request-scoped: held as a local across the downstream call, never in
//! shared state keyed by request identity.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::token::{Error as TokenError, IssueContext, TokenType};

use super::{
    principal::Principal,
    session::{apply_pair, extract_token, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, ROTATED_HEADER},
    state::AuthState,
    storage::UserRecord,
    types::ErrorResponse,
    utils::{extract_client_agent, extract_client_ip},
};

pub async fn session_interceptor(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(access) = extract_token(request.headers(), ACCESS_COOKIE_NAME) else {
        // No credentials presented; defer to downstream authorization.
        return next.run(request).await;
    };

    match state.codec().validate(&access) {
        Ok(claims) => {
            if let Err(err) = claims.assert_type(TokenType::Access) {
                // A refresh token replayed as an access token is a security
                // violation, never a refresh trigger.
                error!("Rejected token in access cookie: {err}");
                return unauthorized(err.to_string());
            }
            let user = match resolve_subject(&state, claims.sub).await {
                Ok(user) => user,
                Err(response) => return response,
            };
            request.extensions_mut().insert(Principal::from(&user));
            next.run(request).await
        }
        Err(err) => refresh_and_rotate(&state, request, next, &err).await,
    }
}

async fn refresh_and_rotate(
    state: &Arc<AuthState>,
    mut request: Request,
    next: Next,
    access_error: &TokenError,
) -> Response {
    debug!("Access token rejected ({access_error}); attempting silent refresh");

    let Some(refresh) = extract_token(request.headers(), REFRESH_COOKIE_NAME) else {
        return unauthorized("Authentication required");
    };

    let claims = match state.codec().validate(&refresh) {
        Ok(claims) => claims,
        Err(err) => return unauthorized(format!("Refresh rejected: {err}")),
    };
    if let Err(err) = claims.assert_type(TokenType::Refresh) {
        error!("Refresh cookie carried a non-refresh token: {err}");
        return unauthorized(format!("Refresh rejected: {err}"));
    }

    let user = match resolve_subject(state, claims.sub).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let context = IssueContext {
        origin_address: extract_client_ip(request.headers()),
        client_agent: extract_client_agent(request.headers()),
        auto_refreshed: true,
    };
    let pair = match state.codec().issue_pair(user.id, &context) {
        Ok(pair) => pair,
        Err(err) => {
            error!("Failed to rotate token pair: {err}");
            return internal_error();
        }
    };

    request.extensions_mut().insert(Principal::from(&user));

    // Cookie rewriting has to wait until the response exists; the
    // authentication decision already happened above.
    let mut response = next.run(request).await;
    if apply_pair(response.headers_mut(), state.config(), &pair) {
        response
            .headers_mut()
            .insert(ROTATED_HEADER, HeaderValue::from_static("true"));
    }
    response
}

async fn resolve_subject(state: &Arc<AuthState>, subject: i64) -> Result<UserRecord, Response> {
    match state.users().find_by_id(subject).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(unauthorized("Unknown subject")),
        Err(err) => {
            error!("Failed to resolve token subject: {err}");
            Err(internal_error())
        }
    }
}

fn unauthorized(message: impl Into<String>) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(message.into())),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal error")),
    )
        .into_response()
}
