//! Native client SDK for the auth API.
//!
//! The session store is the front-end counterpart of the server core: it
//! keeps the authenticated identity in memory behind reactive state,
//! refreshes the token pair silently in the background, and clears itself
//! on terminal auth loss. Tokens never leave the transport's cookie store.

pub mod api;
pub mod error;
pub mod session;

pub use crate::api::handlers::auth::types::IdentityResponse as Identity;
pub use api::ApiClient;
pub use error::ClientError;
pub use session::{SessionState, SessionStore};
