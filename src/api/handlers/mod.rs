pub mod auth;

pub mod health;
pub use self::health::health;

pub mod me;
pub use self::me::get_me;

use axum::response::IntoResponse;

/// Service banner for `GET /`.
pub async fn root() -> impl IntoResponse {
    crate::APP_USER_AGENT
}
