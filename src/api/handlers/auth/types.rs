//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Login request body.
///
/// The field names shown here are the defaults; the bound [`LoginPolicy`]
/// decides which body fields actually carry the credentials.
///
/// [`LoginPolicy`]: crate::throttle::LoginPolicy
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub identifier: String,
    pub secret: String,
}

/// Authenticated identity returned by login, refresh, and `/v1/me`.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IdentityResponse {
    pub id: i64,
    pub username: String,
    pub role: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Body returned with `429 Too Many Requests`.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RateLimitedResponse {
    pub error: String,
    /// Seconds until the exceeded window no longer applies.
    pub retry_after: u64,
}
