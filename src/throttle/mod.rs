//! Sliding-window brute-force defense.
//!
//! Flow Overview:
//! 1) Resolve the route's [`LoginPolicy`].
//! 2) Count recent failures per origin and per identifier independently.
//! 3) Block before authentication logic runs when either window overflows.
//!
//! Scaling: the Postgres ledger synchronizes counts across service
//! instances; reads may race a sibling's append, which is acceptable for a
//! mitigation (the next request recounts).

pub mod ledger;
pub mod policy;

pub use ledger::{
    AttemptLedger, AttemptOutcome, AttemptScope, LoginAttempt, MemoryAttemptLedger,
    PgAttemptLedger,
};
pub use policy::{LoginPolicy, PolicyBinder};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tracing::error;

/// Outcome of a throttle check for one inbound attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    BlockedByOrigin { retry_after_seconds: u64 },
    BlockedByIdentifier { retry_after_seconds: u64 },
}

impl ThrottleDecision {
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        !matches!(self, Self::Allowed)
    }

    /// Seconds the caller should wait, when blocked.
    #[must_use]
    pub const fn retry_after_seconds(self) -> Option<u64> {
        match self {
            Self::Allowed => None,
            Self::BlockedByOrigin { retry_after_seconds }
            | Self::BlockedByIdentifier { retry_after_seconds } => Some(retry_after_seconds),
        }
    }
}

/// Evaluates the attempt ledger against a policy's two windows.
#[derive(Clone)]
pub struct ThrottleEngine {
    ledger: Arc<dyn AttemptLedger>,
}

impl ThrottleEngine {
    #[must_use]
    pub fn new(ledger: Arc<dyn AttemptLedger>) -> Self {
        Self { ledger }
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn AttemptLedger> {
        &self.ledger
    }

    /// Decide whether an attempt may proceed to authentication logic.
    ///
    /// The origin window is evaluated first and wins when both thresholds
    /// are exceeded at once. Ledger read errors fail closed: an attacker
    /// must not profit from a degraded ledger.
    pub async fn check(
        &self,
        policy: &LoginPolicy,
        identifier: &str,
        origin_address: &str,
    ) -> ThrottleDecision {
        self.check_at(policy, identifier, origin_address, Utc::now())
            .await
    }

    /// Same as [`check`](Self::check) with an explicit clock.
    pub async fn check_at(
        &self,
        policy: &LoginPolicy,
        identifier: &str,
        origin_address: &str,
        now: DateTime<Utc>,
    ) -> ThrottleDecision {
        if !policy.check_blocking() {
            return ThrottleDecision::Allowed;
        }

        let origin_window = policy.origin_block_duration();
        let origin_since = window_start(now, origin_window);
        let origin_retry = origin_window.as_secs();
        match self
            .ledger
            .count_failures(AttemptScope::Origin, origin_address, origin_since)
            .await
        {
            Ok(count) if count >= policy.max_attempts_by_origin() => {
                return ThrottleDecision::BlockedByOrigin {
                    retry_after_seconds: origin_retry,
                };
            }
            Ok(_) => {}
            Err(err) => {
                error!("Failed to count failures by origin: {err}");
                return ThrottleDecision::BlockedByOrigin {
                    retry_after_seconds: origin_retry,
                };
            }
        }

        let identifier_window = policy.identifier_block_duration();
        let identifier_since = window_start(now, identifier_window);
        let identifier_retry = identifier_window.as_secs();
        match self
            .ledger
            .count_failures(AttemptScope::Identifier, identifier, identifier_since)
            .await
        {
            Ok(count) if count >= policy.max_attempts_by_identifier() => {
                ThrottleDecision::BlockedByIdentifier {
                    retry_after_seconds: identifier_retry,
                }
            }
            Ok(_) => ThrottleDecision::Allowed,
            Err(err) => {
                error!("Failed to count failures by identifier: {err}");
                ThrottleDecision::BlockedByIdentifier {
                    retry_after_seconds: identifier_retry,
                }
            }
        }
    }
}

/// Start of a trailing window, saturating at the epoch floor so oversized
/// windows count everything instead of overflowing.
fn window_start(now: DateTime<Utc>, window: std::time::Duration) -> DateTime<Utc> {
    ChronoDuration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::time::Duration;

    fn policy() -> LoginPolicy {
        LoginPolicy::new()
            .with_max_attempts_by_origin(10)
            .with_max_attempts_by_identifier(3)
            .with_origin_block_duration(Duration::from_secs(15 * 60))
            .with_identifier_block_duration(Duration::from_secs(60 * 60))
    }

    async fn record_failures(
        ledger: &MemoryAttemptLedger,
        identifier: &str,
        origin: &str,
        count: usize,
    ) -> Result<()> {
        for _ in 0..count {
            ledger
                .record(LoginAttempt::new(
                    identifier,
                    AttemptOutcome::Failure,
                    origin,
                ))
                .await?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn allows_below_both_thresholds() -> Result<()> {
        let ledger = Arc::new(MemoryAttemptLedger::new());
        record_failures(&ledger, "alice", "10.0.0.1", 2).await?;
        let engine = ThrottleEngine::new(ledger);
        let decision = engine.check(&policy(), "alice", "10.0.0.1").await;
        assert_eq!(decision, ThrottleDecision::Allowed);
        Ok(())
    }

    #[tokio::test]
    async fn blocks_identifier_even_from_fresh_origin() -> Result<()> {
        let ledger = Arc::new(MemoryAttemptLedger::new());
        record_failures(&ledger, "alice", "10.0.0.1", 3).await?;
        let engine = ThrottleEngine::new(ledger);

        let decision = engine.check(&policy(), "alice", "192.0.2.99").await;
        assert_eq!(
            decision,
            ThrottleDecision::BlockedByIdentifier {
                retry_after_seconds: 3600,
            }
        );

        // A different identifier from the same hammered origin is evaluated
        // independently and stays below the origin threshold.
        let decision = engine.check(&policy(), "bob", "10.0.0.1").await;
        assert_eq!(decision, ThrottleDecision::Allowed);
        Ok(())
    }

    #[tokio::test]
    async fn origin_wins_when_both_windows_overflow() -> Result<()> {
        let ledger = Arc::new(MemoryAttemptLedger::new());
        record_failures(&ledger, "alice", "10.0.0.1", 10).await?;
        let engine = ThrottleEngine::new(ledger);
        let decision = engine.check(&policy(), "alice", "10.0.0.1").await;
        assert_eq!(
            decision,
            ThrottleDecision::BlockedByOrigin {
                retry_after_seconds: 900,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn retry_after_equals_configured_window() -> Result<()> {
        let ledger = Arc::new(MemoryAttemptLedger::new());
        record_failures(&ledger, "alice", "10.0.0.1", 3).await?;
        let engine = ThrottleEngine::new(ledger);
        let policy = policy().with_identifier_block_duration(Duration::from_secs(60 * 60));
        let decision = engine.check(&policy, "alice", "192.0.2.1").await;
        assert_eq!(decision.retry_after_seconds(), Some(3600));
        Ok(())
    }

    #[tokio::test]
    async fn stale_failures_fall_out_of_the_window() -> Result<()> {
        let ledger = Arc::new(MemoryAttemptLedger::new());
        let old = Utc::now() - ChronoDuration::hours(2);
        for _ in 0..3 {
            ledger
                .record(LoginAttempt {
                    identifier: "alice".to_string(),
                    outcome: AttemptOutcome::Failure,
                    origin_address: "10.0.0.1".to_string(),
                    at: old,
                })
                .await?;
        }
        let engine = ThrottleEngine::new(ledger);
        let decision = engine.check(&policy(), "alice", "10.0.0.1").await;
        assert_eq!(decision, ThrottleDecision::Allowed);
        Ok(())
    }

    #[tokio::test]
    async fn successes_never_count_toward_blocking() -> Result<()> {
        let ledger = Arc::new(MemoryAttemptLedger::new());
        for _ in 0..5 {
            ledger
                .record(LoginAttempt::new(
                    "alice",
                    AttemptOutcome::Success,
                    "10.0.0.1",
                ))
                .await?;
        }
        let engine = ThrottleEngine::new(ledger);
        let decision = engine.check(&policy(), "alice", "10.0.0.1").await;
        assert_eq!(decision, ThrottleDecision::Allowed);
        Ok(())
    }

    #[tokio::test]
    async fn check_blocking_false_bypasses_the_ledger() -> Result<()> {
        let ledger = Arc::new(MemoryAttemptLedger::new());
        record_failures(&ledger, "alice", "10.0.0.1", 50).await?;
        let engine = ThrottleEngine::new(ledger);
        let policy = policy().with_check_blocking(false);
        let decision = engine.check(&policy, "alice", "10.0.0.1").await;
        assert_eq!(decision, ThrottleDecision::Allowed);
        Ok(())
    }
}
