//! Authenticated principal injected by the session interceptor.

use super::storage::UserRecord;

/// User context derived from a validated access token (or a just-rotated
/// pair). Present in request extensions only on protected routes.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: String,
}

impl From<&UserRecord> for Principal {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
        }
    }
}
