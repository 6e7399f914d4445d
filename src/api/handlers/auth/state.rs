//! Auth state and configuration shared across handlers and middleware.

use secrecy::SecretString;
use std::sync::Arc;

use crate::throttle::{AttemptLedger, PolicyBinder, ThrottleEngine};
use crate::token::{Error as TokenError, TokenCodec};

use super::storage::UserDirectory;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_COOKIE_PATH: &str = "/v1";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    cookie_path: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            cookie_path: DEFAULT_COOKIE_PATH.to_string(),
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie_path = path.into();
        self
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn cookie_path(&self) -> &str {
        &self.cookie_path
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    users: Arc<dyn UserDirectory>,
    throttle: ThrottleEngine,
    policies: PolicyBinder,
}

impl AuthState {
    /// Wire the auth core together from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns a token `Configuration` error when the signing secret is
    /// unusable.
    pub fn new(
        config: AuthConfig,
        token_secret: &SecretString,
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn AttemptLedger>,
        policies: PolicyBinder,
    ) -> Result<Self, TokenError> {
        let codec = TokenCodec::from_secret(
            token_secret,
            config.access_ttl_seconds(),
            config.refresh_ttl_seconds(),
        )?;
        Ok(Self {
            config,
            codec,
            users,
            throttle: ThrottleEngine::new(ledger),
            policies,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserDirectory> {
        &self.users
    }

    #[must_use]
    pub fn throttle(&self) -> &ThrottleEngine {
        &self.throttle
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn AttemptLedger> {
        self.throttle.ledger()
    }

    #[must_use]
    pub fn policies(&self) -> &PolicyBinder {
        &self.policies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::{LoginPolicy, MemoryAttemptLedger};
    use crate::token::Error as TokenError;
    use secrecy::SecretString;

    use super::super::storage::MemoryUserDirectory;

    fn secret() -> SecretString {
        SecretString::from("0123456789abcdef0123456789abcdef".to_string())
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://forum.agora-forum.dev".to_string());
        assert_eq!(config.cookie_path(), "/v1");
        assert_eq!(config.access_ttl_seconds(), 900);
        assert_eq!(config.refresh_ttl_seconds(), 604_800);
        assert!(config.cookie_secure());

        let config = config
            .with_cookie_path("/api")
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(120);
        assert_eq!(config.cookie_path(), "/api");
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_ttl_seconds(), 120);
    }

    #[test]
    fn cookie_secure_tracks_frontend_scheme() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        assert!(!config.cookie_secure());
    }

    #[test]
    fn auth_state_constructs_with_memory_collaborators() -> Result<(), TokenError> {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let state = AuthState::new(
            config,
            &secret(),
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemoryAttemptLedger::new()),
            PolicyBinder::new().bind("/v1/auth/login", LoginPolicy::new()),
        )?;
        assert!(state.policies().resolve("/v1/auth/login").is_some());
        Ok(())
    }

    #[test]
    fn auth_state_rejects_weak_secret() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let result = AuthState::new(
            config,
            &SecretString::from("short".to_string()),
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemoryAttemptLedger::new()),
            PolicyBinder::new(),
        );
        assert!(matches!(result, Err(TokenError::Configuration(_))));
    }
}
