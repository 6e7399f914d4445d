//! Login throttle gate and attempt logging.
//!
//! Flow Overview:
//! 1) Resolve the route's policy; without one the request passes untouched.
//! 2) Read the claimed identifier from the policy-named body field.
//! 3) Ask the throttle engine for a decision; a block is recorded as a
//!    failed attempt and short-circuits with `429` and `retry_after`.
//! 4) After the handler responds, derive the outcome from the status code
//!    (2xx means success) and append it to the ledger per the policy's
//!    logging filters.
//!
//! Ledger appends are best-effort: a persistence failure is logged and the
//! already-computed response is returned anyway.

use axum::{
    body::{to_bytes, Body},
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::throttle::{AttemptOutcome, LoginAttempt, LoginPolicy, ThrottleDecision};

use super::{
    state::AuthState,
    types::{ErrorResponse, RateLimitedResponse},
    utils::{extract_client_ip, normalize_identifier, UNKNOWN_ORIGIN},
};

/// Credential bodies are small; anything larger is not a login.
const LOGIN_BODY_LIMIT: usize = 64 * 1024;

pub async fn login_guard(
    State(state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path().to_string(), |m| m.as_str().to_string());
    let Some(policy) = state.policies().resolve(&path) else {
        return next.run(request).await;
    };

    let origin_address =
        extract_client_ip(request.headers()).unwrap_or_else(|| UNKNOWN_ORIGIN.to_string());

    // The identifier lives in the request body; buffer it so the handler
    // still sees the original bytes.
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, LOGIN_BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Failed to buffer login body: {err}");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Invalid request body")),
            )
                .into_response();
        }
    };

    let identifier = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|value| {
            value
                .get(policy.username_field())
                .and_then(serde_json::Value::as_str)
                .map(normalize_identifier)
        })
        .filter(|identifier| !identifier.is_empty());

    if let Some(identifier) = &identifier {
        let decision = state
            .throttle()
            .check(&policy, identifier, &origin_address)
            .await;
        if decision.is_blocked() {
            // A blocked attempt counts as a failure so hammering keeps the
            // window extended. It goes through the same logging filters as
            // a wrong-secret failure.
            record_outcome(
                &state,
                &policy,
                identifier,
                &origin_address,
                AttemptOutcome::Failure,
            )
            .await;
            return blocked_response(decision);
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    if let Some(identifier) = &identifier {
        let outcome = if response.status().is_success() {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        };
        record_outcome(&state, &policy, identifier, &origin_address, outcome).await;
    }

    response
}

async fn record_outcome(
    state: &Arc<AuthState>,
    policy: &LoginPolicy,
    identifier: &str,
    origin_address: &str,
    outcome: AttemptOutcome,
) {
    if !policy.should_record(outcome) {
        return;
    }
    let attempt = LoginAttempt::new(identifier, outcome, origin_address);
    if let Err(err) = state.ledger().record(attempt).await {
        error!("Failed to record login attempt: {err}");
    }
}

fn blocked_response(decision: ThrottleDecision) -> Response {
    let retry_after = decision.retry_after_seconds().unwrap_or_default();
    let message = match decision {
        ThrottleDecision::BlockedByOrigin { .. } => "Too many attempts from this address",
        ThrottleDecision::BlockedByIdentifier { .. } | ThrottleDecision::Allowed => {
            "Too many attempts for this account"
        }
    };
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitedResponse {
            error: message.to_string(),
            retry_after,
        }),
    )
        .into_response()
}
