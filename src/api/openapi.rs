use utoipa::OpenApi;

use super::handlers::{auth, health, me};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        me::get_me,
        auth::login::login,
        auth::refresh::refresh,
        auth::session::logout,
    ),
    components(schemas(
        health::Health,
        auth::types::LoginRequest,
        auth::types::IdentityResponse,
        auth::types::ErrorResponse,
        auth::types::RateLimitedResponse,
    )),
    tags(
        (name = "auth", description = "Token lifecycle and login endpoints"),
        (name = "me", description = "Authenticated identity"),
        (name = "health", description = "Service health"),
    )
)]
struct ApiDoc;

/// Generated `OpenAPI` document for the HTTP surface.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
