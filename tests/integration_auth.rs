//! Integration tests for the auth core HTTP surface.
//!
//! This suite drives the real router in-process with in-memory
//! collaborators: a seeded user directory and an append-only attempt
//! ledger. It covers the login/throttle flow end to end and the session
//! interceptor's silent rotation on protected routes.

use agora::api;
use agora::api::handlers::auth::{
    hash_password, AuthConfig, AuthState, MemoryUserDirectory, UserRecord, LOGIN_PATH,
    LOGOUT_PATH, ME_PATH, REFRESH_PATH,
};
use agora::throttle::{AttemptOutcome, LoginPolicy, MemoryAttemptLedger, PolicyBinder};
use agora::token::IssueContext;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header::SET_COOKIE, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::Utc;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

const SECRET: &str = "0123456789abcdef0123456789abcdef";
const PASSWORD: &str = "correct horse battery staple";

struct TestApp {
    app: Router,
    state: Arc<AuthState>,
    ledger: Arc<MemoryAttemptLedger>,
}

async fn test_app(policy: LoginPolicy) -> Result<TestApp> {
    let users = Arc::new(MemoryUserDirectory::new());
    users
        .insert(UserRecord {
            id: 1,
            username: "alice".to_string(),
            role: "member".to_string(),
            password_hash: hash_password(PASSWORD)?,
        })
        .await;

    let ledger = Arc::new(MemoryAttemptLedger::new());
    let state = Arc::new(AuthState::new(
        AuthConfig::new("http://localhost:3000".to_string()),
        &SecretString::from(SECRET.to_string()),
        users,
        ledger.clone(),
        PolicyBinder::new().bind(LOGIN_PATH, policy),
    )?);

    // The pool is lazy: only `/health` would touch it, and these tests
    // never do.
    let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
    let app = api::router(state.clone(), pool);

    Ok(TestApp { app, state, ledger })
}

fn default_policy() -> LoginPolicy {
    LoginPolicy::new()
        .with_max_attempts_by_identifier(5)
        .with_max_attempts_by_origin(20)
        .with_identifier_block_duration(Duration::from_secs(3600))
        .with_origin_block_duration(Duration::from_secs(900))
}

async fn login(app: &Router, identifier: &str, secret: &str, origin: &str) -> Result<Response> {
    let body = serde_json::json!({ "identifier": identifier, "secret": secret });
    let request = Request::builder()
        .method("POST")
        .uri(LOGIN_PATH)
        .header("content-type", "application/json")
        .header("x-forwarded-for", origin)
        .body(Body::from(body.to_string()))?;
    Ok(app.clone().oneshot(request).await?)
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|cookie| {
        let (pair, _) = cookie.split_once(';')?;
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

async fn json_body(response: Response) -> Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn login_success_sets_both_cookies_and_records_success() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let response = login(&test.app, "alice", PASSWORD, "203.0.113.5").await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert!(cookie_value(&cookies, "agora_access").is_some());
    assert!(cookie_value(&cookies, "agora_refresh").is_some());
    assert!(cookies.iter().all(|cookie| cookie.contains("HttpOnly")));

    let body = json_body(response).await?;
    assert_eq!(body.get("username").and_then(|v| v.as_str()), Some("alice"));

    let attempts = test.ledger.snapshot().await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Success);
    assert_eq!(attempts[0].identifier, "alice");
    assert_eq!(attempts[0].origin_address, "203.0.113.5");
    Ok(())
}

#[tokio::test]
async fn wrong_secret_is_unauthorized_and_recorded_as_failure() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let response = login(&test.app, "alice", "wrong", "203.0.113.5").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let attempts = test.ledger.snapshot().await;
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Failure);
    Ok(())
}

#[tokio::test]
async fn sixth_attempt_is_blocked_even_with_correct_credentials() -> Result<()> {
    let test = test_app(default_policy()).await?;

    for _ in 0..5 {
        let response = login(&test.app, "alice", "wrong", "203.0.113.5").await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = login(&test.app, "alice", PASSWORD, "203.0.113.5").await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = json_body(response).await?;
    assert_eq!(body.get("retry_after").and_then(|v| v.as_u64()), Some(3600));

    // The blocked attempt itself lands in the ledger, extending the window.
    let attempts = test.ledger.snapshot().await;
    assert_eq!(attempts.len(), 6);
    assert!(attempts
        .iter()
        .all(|attempt| attempt.outcome == AttemptOutcome::Failure));
    Ok(())
}

#[tokio::test]
async fn identifier_block_follows_the_identifier_not_the_origin() -> Result<()> {
    let policy = default_policy().with_max_attempts_by_identifier(3);
    let test = test_app(policy).await?;

    for _ in 0..3 {
        login(&test.app, "alice", "wrong", "203.0.113.5").await?;
    }

    // Same identifier from a fresh origin: still blocked.
    let response = login(&test.app, "alice", PASSWORD, "198.51.100.9").await?;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different identifier from the hammered origin is evaluated
    // independently (and fails authentication, not throttling).
    let response = login(&test.app, "bob", "whatever", "203.0.113.5").await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn missing_credentials_is_bad_request_and_unrecorded() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let request = Request::builder()
        .method("POST")
        .uri(LOGIN_PATH)
        .header("content-type", "application/json")
        .body(Body::from("{}"))?;
    let response = test.app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // No identifier was claimed, so nothing is appended.
    assert!(test.ledger.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn expired_access_with_valid_refresh_rotates_silently() -> Result<()> {
    let test = test_app(default_policy()).await?;

    // Access expired just beyond its 900 s lifetime; refresh still valid.
    let issued_at = Utc::now().timestamp() - 901;
    let pair = test
        .state
        .codec()
        .issue_pair_at(1, &IssueContext::default(), issued_at)?;

    let request = Request::builder()
        .method("GET")
        .uri(ME_PATH)
        .header(
            "cookie",
            format!("agora_access={}; agora_refresh={}", pair.access, pair.refresh),
        )
        .body(Body::empty())?;
    let response = test.app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-agora-rotated")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );

    let cookies = set_cookies(&response);
    let new_access = cookie_value(&cookies, "agora_access").context("rotated access cookie")?;
    assert!(cookie_value(&cookies, "agora_refresh").is_some());
    assert_ne!(new_access, pair.access);

    // The rotated access token carries the auto-refresh marker.
    let claims = test.state.codec().validate(&new_access)?;
    assert!(claims.auto_refreshed());

    let body = json_body(response).await?;
    assert_eq!(body.get("username").and_then(|v| v.as_str()), Some("alice"));
    Ok(())
}

#[tokio::test]
async fn both_tokens_expired_is_unauthorized_without_cookies() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let issued_at = Utc::now().timestamp() - 604_801;
    let pair = test
        .state
        .codec()
        .issue_pair_at(1, &IssueContext::default(), issued_at)?;

    let request = Request::builder()
        .method("GET")
        .uri(ME_PATH)
        .header(
            "cookie",
            format!("agora_access={}; agora_refresh={}", pair.access, pair.refresh),
        )
        .body(Body::empty())?;
    let response = test.app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());
    Ok(())
}

#[tokio::test]
async fn valid_access_passes_without_rotation() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let pair = test
        .state
        .codec()
        .issue_pair(1, &IssueContext::default())?;

    let request = Request::builder()
        .method("GET")
        .uri(ME_PATH)
        .header("cookie", format!("agora_access={}", pair.access))
        .body(Body::empty())?;
    let response = test.app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-agora-rotated").is_none());
    assert!(set_cookies(&response).is_empty());
    Ok(())
}

#[tokio::test]
async fn refresh_token_in_access_cookie_is_rejected() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let pair = test
        .state
        .codec()
        .issue_pair(1, &IssueContext::default())?;

    // Swap the tokens: a refresh token must never pass as an access token.
    let request = Request::builder()
        .method("GET")
        .uri(ME_PATH)
        .header("cookie", format!("agora_access={}", pair.refresh))
        .body(Body::empty())?;
    let response = test.app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn me_without_cookies_is_unauthorized() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let request = Request::builder()
        .method("GET")
        .uri(ME_PATH)
        .body(Body::empty())?;
    let response = test.app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_endpoint_resets_both_cookies() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let pair = test
        .state
        .codec()
        .issue_pair(1, &IssueContext::default())?;

    let request = Request::builder()
        .method("POST")
        .uri(REFRESH_PATH)
        .header("cookie", format!("agora_refresh={}", pair.refresh))
        .body(Body::empty())?;
    let response = test.app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookie_value(&cookies, "agora_access").is_some());
    assert!(cookie_value(&cookies, "agora_refresh").is_some());

    let body = json_body(response).await?;
    assert_eq!(body.get("username").and_then(|v| v.as_str()), Some("alice"));
    Ok(())
}

#[tokio::test]
async fn refresh_endpoint_without_cookie_is_unauthorized() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let request = Request::builder()
        .method("POST")
        .uri(REFRESH_PATH)
        .body(Body::empty())?;
    let response = test.app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_expires_both_cookies() -> Result<()> {
    let test = test_app(default_policy()).await?;

    let request = Request::builder()
        .method("POST")
        .uri(LOGOUT_PATH)
        .body(Body::empty())?;
    let response = test.app.clone().oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|cookie| cookie.contains("Max-Age=0")));
    Ok(())
}
