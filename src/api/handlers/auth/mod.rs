//! Authentication endpoints, token transport, and brute-force gating.

pub mod guard;
pub mod interceptor;
pub mod login;
pub mod principal;
pub mod refresh;
pub mod session;
pub mod state;
pub mod storage;
pub mod types;
pub(crate) mod utils;

pub use principal::Principal;
pub use session::{logout, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, ROTATED_HEADER};
pub use state::{AuthConfig, AuthState};
pub use storage::{
    hash_password, MemoryUserDirectory, PgUserDirectory, UserDirectory, UserRecord,
};

/// Stable route paths; the policy binder and routers key off these.
pub const LOGIN_PATH: &str = "/v1/auth/login";
pub const REFRESH_PATH: &str = "/v1/auth/refresh";
pub const LOGOUT_PATH: &str = "/v1/auth/logout";
pub const ME_PATH: &str = "/v1/me";
