//! # Agora (Forum Authentication Core)
//!
//! `agora` is the authentication core of the Agora forum platform. It owns
//! the credential token lifecycle and the brute-force defense engine; the
//! forum's content domain (posts, threads, messaging) lives elsewhere and
//! treats this crate's HTTP surface as its auth authority.
//!
//! ## Token lifecycle
//!
//! Login mints a short-lived **access** token and a longer-lived
//! **refresh** token, both HS256-signed and carried in `HttpOnly` cookies
//! scoped to the API path. Protected routes pass through the session
//! interceptor: a valid access token flows straight through, an expired
//! one is silently rotated from the refresh token, and the response then
//! rewrites both cookies and flags the rotation in a header. A refresh
//! token can never stand in for an access token; the type tag is enforced
//! on every validation.
//!
//! ## Brute-force defense
//!
//! Every login attempt is appended to an attempt ledger. Before
//! authentication logic runs, the throttle engine counts recent failures
//! in two independent sliding windows (per origin address and per claimed
//! identifier) and blocks with `429` + `retry_after` once a window
//! overflows. Blocked attempts are themselves recorded, so hammering a
//! blocked account keeps the window extended.
//!
//! ## Client session store
//!
//! The [`client`] module is the native SDK counterpart: it holds the
//! authenticated identity behind a watch channel, refreshes silently in
//! the background, and retries a `401` exactly once after a refresh before
//! surfacing session loss.

pub mod api;
pub mod cli;
pub mod client;
pub mod throttle;
pub mod token;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
