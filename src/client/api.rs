//! HTTP helpers for the JSON API with consistent timeouts and error
//! handling. The cookie store carries both token cookies ambiently; the
//! helpers never read or expose them.

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

use super::error::ClientError;

/// Default request timeout applied to all HTTP helpers.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum number of error body characters surfaced to callers.
const MAX_ERROR_CHARS: usize = 200;

/// Thin JSON client over the auth API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client with an ambient cookie store for the token pair.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(DEFAULT_TIMEOUT)
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .map_err(|err| ClientError::Config(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Fetch JSON with ambient cookies.
    ///
    /// # Errors
    ///
    /// Returns a mapped [`ClientError`] on network, HTTP, or decode failure.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.build_url(path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(map_request_error)?;
        handle_json_response(response).await
    }

    /// Post JSON with ambient cookies and parse a JSON response.
    ///
    /// # Errors
    ///
    /// Returns a mapped [`ClientError`] on network, HTTP, or decode failure.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.build_url(path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_request_error)?;
        handle_json_response(response).await
    }

    /// Post an empty body and parse a JSON response (used for refresh).
    ///
    /// # Errors
    ///
    /// Returns a mapped [`ClientError`] on network, HTTP, or decode failure.
    pub async fn post_empty_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.build_url(path);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(map_request_error)?;
        handle_json_response(response).await
    }

    /// Post an empty body and ignore the response body (used for logout).
    ///
    /// # Errors
    ///
    /// Returns a mapped [`ClientError`] on network or HTTP failure.
    pub async fn post_empty(&self, path: &str) -> Result<(), ClientError> {
        let url = self.build_url(path);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(map_request_error)?;
        handle_empty_response(response).await
    }

    fn build_url(&self, path: &str) -> String {
        build_url_with_base(&self.base_url, path)
    }
}

/// Builds a URL from a base URL and the provided path.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// Maps network errors into `ClientError` variants with timeout detection.
fn map_request_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout("Request timed out. Please try again.".to_string())
    } else {
        ClientError::Network(format!("Unable to reach the server: {err}"))
    }
}

/// Parses JSON responses and surfaces HTTP errors with sanitized bodies.
async fn handle_json_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| ClientError::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(http_error(response).await)
    }
}

/// Handles empty responses and returns sanitized HTTP errors when needed.
async fn handle_empty_response(response: reqwest::Response) -> Result<(), ClientError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(http_error(response).await)
    }
}

async fn http_error(response: reqwest::Response) -> ClientError {
    let status: StatusCode = response.status();
    let body = response.text().await.unwrap_or_default();
    ClientError::Http {
        status: status.as_u16(),
        message: sanitize_body(body),
    }
}

/// Sanitizes HTTP error bodies for user-facing messages by trimming and
/// truncating.
fn sanitize_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_joins_base_and_path() {
        assert_eq!(
            build_url_with_base("http://localhost:8080/", "/v1/me"),
            "http://localhost:8080/v1/me"
        );
        assert_eq!(
            build_url_with_base("http://localhost:8080", "v1/me"),
            "http://localhost:8080/v1/me"
        );
        assert_eq!(build_url_with_base("", "/v1/me"), "/v1/me");
    }

    #[test]
    fn sanitize_body_trims_and_truncates() {
        assert_eq!(sanitize_body("  ".to_string()), "Request failed.");
        assert_eq!(sanitize_body(" oops ".to_string()), "oops");
        let long = "x".repeat(500);
        assert_eq!(sanitize_body(long).len(), MAX_ERROR_CHARS);
    }
}
