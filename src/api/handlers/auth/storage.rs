//! User directory lookups for authentication.
//!
//! The directory is a thin collaborator: a key-value lookup by identifier
//! returning a user/role record. Password hashing itself lives with the
//! stored record; this module only verifies.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use async_trait::async_trait;
use rand::rngs::OsRng;
use sqlx::{PgPool, Row};
use tokio::sync::Mutex;
use tracing::Instrument;

/// Minimal fields the auth core needs from a user row.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub password_hash: String,
}

/// Lookup seam over the user store.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by the claimed login identifier.
    ///
    /// # Errors
    ///
    /// Surfaces persistence failures.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>>;

    /// Look up a user by subject id (used when resolving token subjects).
    ///
    /// # Errors
    ///
    /// Surfaces persistence failures.
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>>;
}

/// Postgres-backed directory.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, username, role::text AS role, password_hash
            FROM users
            WHERE username = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by identifier")?;
        Ok(row.map(|row| UserRecord {
            id: row.get("id"),
            username: row.get("username"),
            role: row.get("role"),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, username, role::text AS role, password_hash
            FROM users
            WHERE id = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;
        Ok(row.map(|row| UserRecord {
            id: row.get("id"),
            username: row.get("username"),
            role: row.get("role"),
            password_hash: row.get("password_hash"),
        }))
    }
}

/// In-memory directory for single-node setups and tests.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: Mutex<Vec<UserRecord>>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserRecord) {
        self.users.lock().await.push(user);
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users
            .iter()
            .find(|user| user.username == identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|user| user.id == id).cloned())
    }
}

/// Hash a password into a PHC string for seeding directories.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a candidate secret against a stored PHC hash.
///
/// Malformed stored hashes verify as false rather than erroring: a broken
/// row must read as a failed login, not a 500.
#[must_use]
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    })
}
