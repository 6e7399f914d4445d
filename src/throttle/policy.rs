//! Per-endpoint login policies resolved from route configuration.
//!
//! Policies are authored at startup and bound to routes through an explicit
//! map; nothing is discovered through runtime introspection. Handlers and
//! middleware receive them read-only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::ledger::AttemptOutcome;

const DEFAULT_MAX_ATTEMPTS_BY_ORIGIN: i64 = 10;
const DEFAULT_MAX_ATTEMPTS_BY_IDENTIFIER: i64 = 5;
const DEFAULT_ORIGIN_BLOCK: Duration = Duration::from_secs(15 * 60);
const DEFAULT_IDENTIFIER_BLOCK: Duration = Duration::from_secs(60 * 60);
const DEFAULT_USERNAME_FIELD: &str = "identifier";
const DEFAULT_PASSWORD_FIELD: &str = "secret";

/// Declarative policy attached to one credentialed endpoint.
#[derive(Clone, Debug)]
pub struct LoginPolicy {
    enabled: bool,
    log_success_only: bool,
    log_failure_only: bool,
    username_field: String,
    password_field: String,
    check_blocking: bool,
    max_attempts_by_origin: i64,
    max_attempts_by_identifier: i64,
    origin_block_duration: Duration,
    identifier_block_duration: Duration,
}

impl Default for LoginPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            log_success_only: false,
            log_failure_only: false,
            username_field: DEFAULT_USERNAME_FIELD.to_string(),
            password_field: DEFAULT_PASSWORD_FIELD.to_string(),
            check_blocking: true,
            max_attempts_by_origin: DEFAULT_MAX_ATTEMPTS_BY_ORIGIN,
            max_attempts_by_identifier: DEFAULT_MAX_ATTEMPTS_BY_IDENTIFIER,
            origin_block_duration: DEFAULT_ORIGIN_BLOCK,
            identifier_block_duration: DEFAULT_IDENTIFIER_BLOCK,
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_log_success_only(mut self, log_success_only: bool) -> Self {
        self.log_success_only = log_success_only;
        self
    }

    #[must_use]
    pub fn with_log_failure_only(mut self, log_failure_only: bool) -> Self {
        self.log_failure_only = log_failure_only;
        self
    }

    #[must_use]
    pub fn with_username_field(mut self, field: impl Into<String>) -> Self {
        self.username_field = field.into();
        self
    }

    #[must_use]
    pub fn with_password_field(mut self, field: impl Into<String>) -> Self {
        self.password_field = field.into();
        self
    }

    #[must_use]
    pub fn with_check_blocking(mut self, check_blocking: bool) -> Self {
        self.check_blocking = check_blocking;
        self
    }

    #[must_use]
    pub fn with_max_attempts_by_origin(mut self, max: i64) -> Self {
        self.max_attempts_by_origin = max;
        self
    }

    #[must_use]
    pub fn with_max_attempts_by_identifier(mut self, max: i64) -> Self {
        self.max_attempts_by_identifier = max;
        self
    }

    #[must_use]
    pub fn with_origin_block_duration(mut self, duration: Duration) -> Self {
        self.origin_block_duration = duration;
        self
    }

    #[must_use]
    pub fn with_identifier_block_duration(mut self, duration: Duration) -> Self {
        self.identifier_block_duration = duration;
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn username_field(&self) -> &str {
        &self.username_field
    }

    #[must_use]
    pub fn password_field(&self) -> &str {
        &self.password_field
    }

    #[must_use]
    pub fn check_blocking(&self) -> bool {
        self.check_blocking
    }

    #[must_use]
    pub fn max_attempts_by_origin(&self) -> i64 {
        self.max_attempts_by_origin
    }

    #[must_use]
    pub fn max_attempts_by_identifier(&self) -> i64 {
        self.max_attempts_by_identifier
    }

    #[must_use]
    pub fn origin_block_duration(&self) -> Duration {
        self.origin_block_duration
    }

    #[must_use]
    pub fn identifier_block_duration(&self) -> Duration {
        self.identifier_block_duration
    }

    /// Whether an attempt with `outcome` should be appended to the ledger.
    ///
    /// The two `log_*` flags are independent filters: with neither set,
    /// every outcome is recorded; with both set, successes pass the
    /// success filter and failures pass the failure filter, so everything
    /// is still recorded. An outcome is skipped only when it matches no
    /// enabled filter.
    #[must_use]
    pub fn should_record(&self, outcome: AttemptOutcome) -> bool {
        if !self.log_success_only && !self.log_failure_only {
            return true;
        }
        match outcome {
            AttemptOutcome::Success => self.log_success_only,
            AttemptOutcome::Failure => self.log_failure_only,
        }
    }
}

/// Route-keyed policy map, built once at startup.
#[derive(Clone, Debug, Default)]
pub struct PolicyBinder {
    policies: HashMap<String, Arc<LoginPolicy>>,
}

impl PolicyBinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `policy` to the route at `path`.
    #[must_use]
    pub fn bind(mut self, path: impl Into<String>, policy: LoginPolicy) -> Self {
        self.policies.insert(path.into(), Arc::new(policy));
        self
    }

    /// Resolve the policy for a route, if one was bound and is enabled.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<Arc<LoginPolicy>> {
        self.policies
            .get(path)
            .filter(|policy| policy.enabled())
            .cloned()
    }
}
