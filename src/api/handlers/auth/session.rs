//! Cookie transport for the token pair, plus the logout endpoint.
//!
//! Both tokens travel in `HttpOnly` cookies scoped to the API path so they
//! never reach script-readable storage. Rotation rewrites both cookies and
//! flags the response so clients can observe it without reading cookies.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

use crate::token::TokenPair;

use super::state::{AuthConfig, AuthState};

pub const ACCESS_COOKIE_NAME: &str = "agora_access";
pub const REFRESH_COOKIE_NAME: &str = "agora_refresh";

/// Response header set when the interceptor silently rotated the pair.
pub const ROTATED_HEADER: &str = "x-agora-rotated";

/// Build the two `Set-Cookie` values for a freshly minted pair.
///
/// # Errors
///
/// Returns an error if a cookie value cannot be encoded as a header.
pub(crate) fn pair_cookies(
    config: &AuthConfig,
    pair: &TokenPair,
) -> Result<(HeaderValue, HeaderValue), InvalidHeaderValue> {
    let access = build_cookie(
        config,
        ACCESS_COOKIE_NAME,
        &pair.access,
        config.access_ttl_seconds(),
    )?;
    let refresh = build_cookie(
        config,
        REFRESH_COOKIE_NAME,
        &pair.refresh,
        config.refresh_ttl_seconds(),
    )?;
    Ok((access, refresh))
}

/// Append both pair cookies to `headers`.
pub(crate) fn apply_pair(headers: &mut HeaderMap, config: &AuthConfig, pair: &TokenPair) -> bool {
    match pair_cookies(config, pair) {
        Ok((access, refresh)) => {
            headers.append(SET_COOKIE, access);
            headers.append(SET_COOKIE, refresh);
            true
        }
        Err(err) => {
            error!("Failed to build session cookies: {err}");
            false
        }
    }
}

/// Append expired cookies that clear both tokens.
pub(crate) fn apply_cleared(headers: &mut HeaderMap, config: &AuthConfig) {
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        match build_cookie(config, name, "", 0) {
            Ok(cookie) => {
                headers.append(SET_COOKIE, cookie);
            }
            Err(err) => {
                error!("Failed to build clearing cookie: {err}");
            }
        }
    }
}

fn build_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let path = config.cookie_path();
    let mut cookie =
        format!("{name}={value}; Path={path}; HttpOnly; SameSite=Lax; Max-Age={max_age_seconds}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Read one named token cookie from the request headers.
pub(crate) fn extract_token(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Cookies cleared")
    ),
    tag = "auth"
)]
pub async fn logout(state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    // Logout is idempotent; clearing cookies needs no stored session state.
    let mut headers = HeaderMap::new();
    apply_cleared(&mut headers, state.config());
    (StatusCode::NO_CONTENT, headers)
}
