//! Current-identity endpoint.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use super::auth::{
    types::{ErrorResponse, IdentityResponse},
    Principal,
};

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The authenticated identity", body = IdentityResponse),
        (status = 401, description = "No valid access token presented", body = ErrorResponse)
    ),
    tag = "me"
)]
pub async fn get_me(principal: Option<Extension<Principal>>) -> impl IntoResponse {
    // The interceptor injects the principal; its absence means no valid
    // token was presented. Read-only: no side effects here.
    match principal {
        Some(Extension(principal)) => (
            StatusCode::OK,
            Json(IdentityResponse {
                id: principal.user_id,
                username: principal.username,
                role: principal.role,
            }),
        )
            .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("Authentication required")),
        )
            .into_response(),
    }
}
