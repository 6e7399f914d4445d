//! HS256 compact token signing and verification.
//!
//! Tokens are three base64url segments (`header.claims.signature`) signed
//! with a process-wide secret. Claims carry the subject id, a type tag so a
//! refresh token can never stand in for an access token, and the issuance
//! context (origin address, client agent, auto-refresh marker).

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;

use super::error::Error;

pub const TOKEN_VERSION: u8 = 1;

/// Minimum number of bytes required in the signing secret.
const MIN_SECRET_BYTES: usize = 32;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Decoded token claims.
///
/// `extra` flattens any issuance-context claims (`origin`, `agent`,
/// `auto_refreshed`) alongside the registered fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub v: u8,
    pub sub: i64,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Claims {
    /// Enforce the type tag on a validated token.
    ///
    /// # Errors
    ///
    /// Returns `Error::WrongTokenType` when the claim does not match the
    /// type the caller requires.
    pub fn assert_type(&self, expected: TokenType) -> Result<(), Error> {
        if self.token_type == expected {
            Ok(())
        } else {
            Err(Error::WrongTokenType {
                expected,
                found: self.token_type,
            })
        }
    }

    /// True when the pair was minted by the interceptor rather than an
    /// explicit refresh call.
    #[must_use]
    pub fn auto_refreshed(&self) -> bool {
        self.extra
            .get("auto_refreshed")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Issuance context shared by both tokens of a pair.
#[derive(Debug, Clone, Default)]
pub struct IssueContext {
    pub origin_address: Option<String>,
    pub client_agent: Option<String>,
    pub auto_refreshed: bool,
}

impl IssueContext {
    fn extra_claims(&self) -> BTreeMap<String, serde_json::Value> {
        let mut extra = BTreeMap::new();
        if let Some(origin) = &self.origin_address {
            extra.insert("origin".to_string(), serde_json::json!(origin));
        }
        if let Some(agent) = &self.client_agent {
            extra.insert("agent".to_string(), serde_json::json!(agent));
        }
        if self.auto_refreshed {
            extra.insert("auto_refreshed".to_string(), serde_json::json!(true));
        }
        extra
    }
}

/// A freshly minted access/refresh pair. The raw strings go straight into
/// cookies; the expiries drive the cookie `Max-Age`.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: i64,
    pub refresh_expires_at: i64,
}

/// Stateless signer/verifier bound to the process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("mac", &"***")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

impl TokenCodec {
    /// Build a codec from the configured secret and token lifetimes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` when the secret is missing or too
    /// short to sign with.
    pub fn from_secret(
        secret: &SecretString,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> Result<Self, Error> {
        let bytes = secret.expose_secret().as_bytes();
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(Error::Configuration(format!(
                "token secret must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }
        let mac = HmacSha256::new_from_slice(bytes)
            .map_err(|_| Error::Configuration("invalid token secret".to_string()))?;
        Ok(Self {
            mac,
            access_ttl_seconds,
            refresh_ttl_seconds,
        })
    }

    /// Mint an access/refresh pair for `subject`, stamped with the shared
    /// issuance context.
    ///
    /// # Errors
    ///
    /// Returns an error if claims cannot be encoded.
    pub fn issue_pair(&self, subject: i64, context: &IssueContext) -> Result<TokenPair, Error> {
        self.issue_pair_at(subject, context, chrono::Utc::now().timestamp())
    }

    /// Same as [`issue_pair`](Self::issue_pair) with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns an error if claims cannot be encoded.
    pub fn issue_pair_at(
        &self,
        subject: i64,
        context: &IssueContext,
        now_unix_seconds: i64,
    ) -> Result<TokenPair, Error> {
        let extra = context.extra_claims();
        let access_expires_at = now_unix_seconds + self.access_ttl_seconds;
        let refresh_expires_at = now_unix_seconds + self.refresh_ttl_seconds;

        let access = self.sign(&Claims {
            v: TOKEN_VERSION,
            sub: subject,
            token_type: TokenType::Access,
            iat: now_unix_seconds,
            exp: access_expires_at,
            extra: extra.clone(),
        })?;
        let refresh = self.sign(&Claims {
            v: TOKEN_VERSION,
            sub: subject,
            token_type: TokenType::Refresh,
            iat: now_unix_seconds,
            exp: refresh_expires_at,
            extra,
        })?;

        Ok(TokenPair {
            access,
            refresh,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Verify signature and expiry, returning the decoded claims.
    ///
    /// Side-effect free: validating the same token twice yields identical
    /// claims.
    ///
    /// # Errors
    ///
    /// Returns `Error::TokenFormat`/`Error::Base64`/`Error::Json` for
    /// structural problems, `Error::InvalidSignature` on a bad signature,
    /// and `Error::Expired` once `exp` has passed.
    pub fn validate(&self, token: &str) -> Result<Claims, Error> {
        self.validate_at(token, chrono::Utc::now().timestamp())
    }

    /// Same as [`validate`](Self::validate) with an explicit clock.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn validate_at(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, Error> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
        let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
        if parts.next().is_some() {
            return Err(Error::TokenFormat);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != "HS256" {
            return Err(Error::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
        let mut mac = self.mac.clone();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| Error::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if claims.v != TOKEN_VERSION {
            return Err(Error::InvalidVersion);
        }
        if claims.exp <= now_unix_seconds {
            return Err(Error::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, Error> {
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let mut mac = self.mac.clone();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);
        Ok(format!("{header_b64}.{claims_b64}.{signature_b64}"))
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}
