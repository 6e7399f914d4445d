//! Small helpers for auth validation and request metadata.

use regex::Regex;

/// Normalize an identifier for lookup and ledger keys.
pub(crate) fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Basic identifier shape check on already-normalized input.
pub(crate) fn valid_identifier(identifier: &str) -> bool {
    Regex::new(r"^[a-z0-9][a-z0-9_.@+-]{2,63}$").is_ok_and(|regex| regex.is_match(identifier))
}

/// Extract a client origin address for throttling from common proxy headers.
pub(crate) fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Origin key used when no proxy header identifies the client.
pub(crate) const UNKNOWN_ORIGIN: &str = "unknown";

/// Extract the client agent string, if any.
pub(crate) fn extract_client_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
