use thiserror::Error;

use super::codec::TokenType;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong token type: expected {expected}, found {found}")]
    WrongTokenType {
        expected: TokenType,
        found: TokenType,
    },
    #[error("invalid token version")]
    InvalidVersion,
    #[error("signing key unavailable: {0}")]
    Configuration(String),
}

impl Error {
    /// Expired tokens trigger the refresh flow instead of a terminal error.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}
