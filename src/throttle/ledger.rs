//! Append-only ledger of login attempts.
//!
//! The ledger owns all writes; readers only count. Appends are independent
//! rows rather than mutated counters, so concurrent attempts against the
//! same identifier or origin cannot lose records.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tokio::sync::Mutex;
use tracing::Instrument;

/// Outcome of one authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl AttemptOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Which column a failure count aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptScope {
    Identifier,
    Origin,
}

/// One recorded attempt. Never mutated after insertion; retention and
/// pruning are an operational concern, not the engine's.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub identifier: String,
    pub outcome: AttemptOutcome,
    pub origin_address: String,
    pub at: DateTime<Utc>,
}

impl LoginAttempt {
    #[must_use]
    pub fn new(identifier: &str, outcome: AttemptOutcome, origin_address: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            outcome,
            origin_address: origin_address.to_string(),
            at: Utc::now(),
        }
    }
}

/// Storage seam for attempt records.
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    /// Append one attempt record.
    ///
    /// # Errors
    ///
    /// Surfaces persistence failures; callers log and continue, they never
    /// let a failed append block the response already computed.
    async fn record(&self, attempt: LoginAttempt) -> Result<()>;

    /// Count failed attempts for `key` within `[since, now]`.
    ///
    /// # Errors
    ///
    /// Surfaces persistence failures; the throttle engine fails closed.
    async fn count_failures(
        &self,
        scope: AttemptScope,
        key: &str,
        since: DateTime<Utc>,
    ) -> Result<i64>;
}

/// Postgres-backed ledger shared across service instances.
#[derive(Debug, Clone)]
pub struct PgAttemptLedger {
    pool: PgPool,
}

impl PgAttemptLedger {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptLedger for PgAttemptLedger {
    async fn record(&self, attempt: LoginAttempt) -> Result<()> {
        let query = r"
            INSERT INTO login_attempts (identifier, outcome, origin_address, attempted_at)
            VALUES ($1, $2, $3, $4)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&attempt.identifier)
            .bind(attempt.outcome.as_str())
            .bind(&attempt.origin_address)
            .bind(attempt.at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to append login attempt")?;
        Ok(())
    }

    async fn count_failures(
        &self,
        scope: AttemptScope,
        key: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let query = match scope {
            AttemptScope::Identifier => {
                r"
                SELECT COUNT(*)
                FROM login_attempts
                WHERE identifier = $1
                  AND outcome = 'failure'
                  AND attempted_at >= $2
            "
            }
            AttemptScope::Origin => {
                r"
                SELECT COUNT(*)
                FROM login_attempts
                WHERE origin_address = $1
                  AND outcome = 'failure'
                  AND attempted_at >= $2
            "
            }
        };
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(key)
            .bind(since)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count failed login attempts")?;
        Ok(row.get(0))
    }
}

/// In-memory ledger for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryAttemptLedger {
    attempts: Mutex<Vec<LoginAttempt>>,
}

impl MemoryAttemptLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, regardless of outcome.
    pub async fn len(&self) -> usize {
        self.attempts.lock().await.len()
    }

    /// True when no attempts have been recorded.
    pub async fn is_empty(&self) -> bool {
        self.attempts.lock().await.is_empty()
    }

    /// Snapshot of all records, oldest first.
    pub async fn snapshot(&self) -> Vec<LoginAttempt> {
        self.attempts.lock().await.clone()
    }
}

#[async_trait]
impl AttemptLedger for MemoryAttemptLedger {
    async fn record(&self, attempt: LoginAttempt) -> Result<()> {
        self.attempts.lock().await.push(attempt);
        Ok(())
    }

    async fn count_failures(
        &self,
        scope: AttemptScope,
        key: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let attempts = self.attempts.lock().await;
        let count = attempts
            .iter()
            .filter(|attempt| attempt.outcome == AttemptOutcome::Failure)
            .filter(|attempt| attempt.at >= since)
            .filter(|attempt| match scope {
                AttemptScope::Identifier => attempt.identifier == key,
                AttemptScope::Origin => attempt.origin_address == key,
            })
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn attempt_at(
        identifier: &str,
        outcome: AttemptOutcome,
        origin: &str,
        at: DateTime<Utc>,
    ) -> LoginAttempt {
        LoginAttempt {
            identifier: identifier.to_string(),
            outcome,
            origin_address: origin.to_string(),
            at,
        }
    }

    #[tokio::test]
    async fn counts_only_failures_in_scope() -> Result<()> {
        let ledger = MemoryAttemptLedger::new();
        let now = Utc::now();

        ledger
            .record(attempt_at("alice", AttemptOutcome::Failure, "10.0.0.1", now))
            .await?;
        ledger
            .record(attempt_at("alice", AttemptOutcome::Success, "10.0.0.1", now))
            .await?;
        ledger
            .record(attempt_at("bob", AttemptOutcome::Failure, "10.0.0.2", now))
            .await?;

        let since = now - Duration::minutes(5);
        assert_eq!(
            ledger
                .count_failures(AttemptScope::Identifier, "alice", since)
                .await?,
            1
        );
        assert_eq!(
            ledger
                .count_failures(AttemptScope::Origin, "10.0.0.2", since)
                .await?,
            1
        );
        assert_eq!(
            ledger
                .count_failures(AttemptScope::Identifier, "carol", since)
                .await?,
            0
        );
        Ok(())
    }

    #[tokio::test]
    async fn window_excludes_older_records() -> Result<()> {
        let ledger = MemoryAttemptLedger::new();
        let now = Utc::now();

        ledger
            .record(attempt_at(
                "alice",
                AttemptOutcome::Failure,
                "10.0.0.1",
                now - Duration::minutes(30),
            ))
            .await?;
        ledger
            .record(attempt_at("alice", AttemptOutcome::Failure, "10.0.0.1", now))
            .await?;

        let since = now - Duration::minutes(5);
        assert_eq!(
            ledger
                .count_failures(AttemptScope::Identifier, "alice", since)
                .await?,
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn records_are_append_only() -> Result<()> {
        let ledger = MemoryAttemptLedger::new();
        assert!(ledger.is_empty().await);
        let now = Utc::now();
        ledger
            .record(attempt_at("alice", AttemptOutcome::Failure, "10.0.0.1", now))
            .await?;
        ledger
            .record(attempt_at("alice", AttemptOutcome::Failure, "10.0.0.1", now))
            .await?;
        assert_eq!(ledger.len().await, 2);
        Ok(())
    }
}
