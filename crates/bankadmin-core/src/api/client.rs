//! API client for communicating with the bank CMS REST API.
//!
//! Every authenticated request goes through `ApiClient::execute`, which owns
//! the bearer header and the 401/403 expiry check so individual screens never
//! special-case token expiry.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::models::{LoginRequest, LoginResponse, UserSummary, VerifyResponse};

use super::{signals_session_expiry, ApiError, SessionEventSink, TokenSource};

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint, relative to the base URL
const LOGIN_PATH: &str = "auth/login";

/// Token re-validation endpoint, relative to the base URL
const VERIFY_PATH: &str = "auth/verify";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the CMS backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
    events: Arc<dyn SessionEventSink>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// `tokens` supplies the bearer token per request; `events` is told when
    /// the backend rejects that token.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenSource>,
        events: Arc<dyn SessionEventSink>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Authentication =====

    /// Exchange credentials for a token.
    ///
    /// Sent without a bearer header and never retried. A 401 here means bad
    /// credentials, so it is reported as-is instead of as a session expiry.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = self.url(LOGIN_PATH);
        debug!(url = %url, username = username, "Sending login request");

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        let login: LoginResponse = Self::parse_json(response, &url).await?;
        info!(username = username, "Login accepted by backend");
        Ok(login)
    }

    /// Ask the backend whether the current token is still good.
    pub async fn verify(&self) -> Result<UserSummary, ApiError> {
        let verified: VerifyResponse = self.get(VERIFY_PATH).await?;
        Ok(verified.user)
    }

    // ===== Generic requests =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute::<()>(Method::GET, path, None).await?;
        Self::parse_json(response, path).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.execute(Method::POST, path, Some(body)).await?;
        Self::parse_json(response, path).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.execute(Method::PUT, path, Some(body)).await?;
        Self::parse_json(response, path).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Send an authenticated request, retrying on 429 with exponential backoff.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(token) = self.tokens.bearer_token() {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status, &body, &url));
        }
    }

    /// Map a failed response to an error, reporting session expiry when the
    /// backend says the token itself was rejected.
    fn classify_failure(&self, status: StatusCode, body: &str, url: &str) -> ApiError {
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            // Only the backend's own envelope counts; proxy pages are not sniffed
            if let Some(message) = ApiError::envelope_message(body) {
                if signals_session_expiry(&message) {
                    warn!(url = url, status = status.as_u16(), message = %message, "Backend rejected session token");
                    self.events.session_expired();
                    return ApiError::SessionExpired(message);
                }
            }
            debug!(url = url, status = status.as_u16(), "Request denied");
        }
        ApiError::from_status(status, body)
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", context, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoSession;

    impl TokenSource for NoSession {
        fn bearer_token(&self) -> Option<String> {
            None
        }
    }

    impl SessionEventSink for NoSession {
        fn session_expired(&self) {}
    }

    fn client(base: &str) -> ApiClient {
        let session = Arc::new(NoSession);
        ApiClient::new(base, Duration::from_secs(5), session.clone(), session).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client("https://cms.bank.example/api/");
        assert_eq!(api.base_url(), "https://cms.bank.example/api");
        assert_eq!(api.url("news"), "https://cms.bank.example/api/news");
        assert_eq!(api.url("/auth/login"), "https://cms.bank.example/api/auth/login");
    }
}
