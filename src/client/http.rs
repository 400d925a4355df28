//! Authenticated CRM HTTP client with retry, backoff, and classification
//!
//! Every attempt first passes through the sliding-window rate limiter.
//! Transient failures (transport errors, 429, 5xx) are retried with
//! exponential backoff; a server-provided `Retry-After` overrides the
//! computed delay for that attempt. Terminal failures surface as classified
//! [`ApiError`] values carrying the HTTP status and request id when known.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::client::config::{
    calculate_backoff, DEALS_PATH, DEFAULT_BASE_URL, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS,
    MAX_PAGE_SIZE, MAX_RETRIES, RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW, REQUEST_TIMEOUT,
    USER_AGENT,
};
use crate::client::rate_limit::SlidingWindowLimiter;
use crate::client::response::DealsPage;
use crate::client::{ApiError, ApiResult, ErrorDetail};
use crate::metrics;

/// Client configuration with builder-style overrides.
#[derive(Debug, Clone)]
pub struct CrmClientConfig {
    /// API base URL; trailing slashes are stripped.
    pub base_url: String,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Timeout for a single HTTP attempt.
    pub timeout: Duration,
    /// Retries beyond the first attempt.
    pub max_retries: u32,
    /// Initial exponential backoff delay.
    pub backoff_initial: Duration,
    /// Exponential backoff cap.
    pub backoff_max: Duration,
    /// Sliding-window budget: maximum requests per window.
    pub rate_limit_max_requests: usize,
    /// Sliding-window budget: window length.
    pub rate_limit_window: Duration,
}

impl Default for CrmClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout: REQUEST_TIMEOUT,
            max_retries: MAX_RETRIES,
            backoff_initial: Duration::from_millis(INITIAL_BACKOFF_MS),
            backoff_max: Duration::from_millis(MAX_BACKOFF_MS),
            rate_limit_max_requests: RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window: RATE_LIMIT_WINDOW,
        }
    }
}

impl CrmClientConfig {
    /// Override the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the backoff curve.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.backoff_initial = initial;
        self.backoff_max = max;
        self
    }

    /// Override the sliding-window rate limit.
    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.rate_limit_max_requests = max_requests;
        self.rate_limit_window = window;
        self
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.backoff_initial, self.backoff_max)
    }
}

/// Authenticated CRM API client.
///
/// One long-lived instance is reused across all pages of an extraction run;
/// several runs may share one instance, in which case they also share its
/// rate-limit budget.
#[derive(Debug)]
pub struct CrmHttpClient {
    client: reqwest::Client,
    config: CrmClientConfig,
    base_url: String,
    access_token: String,
    rate_limiter: Arc<SlidingWindowLimiter>,
}

impl CrmHttpClient {
    /// Create a client with the given default access token.
    ///
    /// # Errors
    /// Returns [`ApiError::Configuration`] when the token is empty or the
    /// underlying HTTP client cannot be constructed.
    pub fn new(access_token: impl Into<String>, config: CrmClientConfig) -> ApiResult<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(ApiError::Configuration(
                "access token must be provided".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let rate_limiter =
            SlidingWindowLimiter::shared(config.rate_limit_max_requests, config.rate_limit_window);

        Ok(Self {
            client,
            config,
            base_url,
            access_token,
            rate_limiter,
        })
    }

    /// Replace the rate limiter with a shared one so several clients enforce
    /// a single combined budget.
    pub fn with_shared_limiter(mut self, limiter: Arc<SlidingWindowLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Handle to this client's rate limiter.
    pub fn rate_limiter(&self) -> Arc<SlidingWindowLimiter> {
        self.rate_limiter.clone()
    }

    /// Compose the full request URL from the base URL and a relative path,
    /// or pass an absolute URL through unchanged.
    fn resolve_url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}{path_or_url}", self.base_url)
        }
    }

    /// Issue a request, retrying transient failures, and return the
    /// successful response.
    ///
    /// The rate limiter is consulted before every attempt, including
    /// retries. A call-level `token_override` takes precedence over the
    /// configured default token.
    ///
    /// # Errors
    /// A classified [`ApiError`]; retryable kinds are only surfaced after
    /// the retry budget is exhausted.
    pub async fn request(
        &self,
        method: Method,
        path_or_url: &str,
        params: &[(&str, String)],
        body: Option<&Value>,
        token_override: Option<&str>,
    ) -> ApiResult<Response> {
        let url = self.resolve_url(path_or_url);
        let token = token_override.unwrap_or(&self.access_token);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.rate_limiter.acquire().await;

            debug!(method = %method, url = %url, attempt, "sending API request");
            let request = {
                let mut builder = self
                    .client
                    .request(method.clone(), &url)
                    .bearer_auth(token)
                    .header(CONTENT_TYPE, "application/json")
                    .header(ACCEPT, "application/json")
                    .query(params);
                if let Some(body) = body {
                    builder = builder.json(body);
                }
                builder
            };

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(attempt, error = %e, "transport error");
                    if attempt > self.config.max_retries {
                        return Err(ApiError::Network(format!(
                            "network error after {} retries: {e}",
                            self.config.max_retries
                        )));
                    }
                    self.sleep_backoff(attempt, "network").await;
                    continue;
                }
            };

            let status = response.status();
            metrics::record_api_request(method.as_str(), status.as_u16());

            if status.is_success() {
                debug!(attempt, status = status.as_u16(), "request succeeded");
                return Ok(response);
            }

            let retry_after = parse_retry_after(response.headers());
            let detail = error_detail(response).await;

            match status.as_u16() {
                401 => return Err(ApiError::Unauthorized(detail)),
                403 => return Err(ApiError::Forbidden(detail)),
                404 => return Err(ApiError::NotFound(detail)),
                429 => {
                    metrics::record_rate_limited();
                    warn!(attempt, retry_after = ?retry_after, "rate limited (429)");
                    if attempt > self.config.max_retries {
                        return Err(ApiError::RateLimited {
                            detail,
                            retry_after,
                        });
                    }
                    match retry_after {
                        Some(seconds) if seconds > 0.0 => {
                            metrics::record_api_retry("rate_limited");
                            sleep(Duration::from_secs_f64(seconds)).await;
                        }
                        _ => self.sleep_backoff(attempt, "rate_limited").await,
                    }
                }
                s if (500..600).contains(&s) => {
                    warn!(status = s, attempt, "server error");
                    if attempt > self.config.max_retries {
                        return Err(ApiError::Server(detail));
                    }
                    self.sleep_backoff(attempt, "server_error").await;
                }
                _ => return Err(ApiError::Api(detail)),
            }
        }
    }

    /// Issue a request and deserialize the JSON response body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path_or_url: &str,
        params: &[(&str, String)],
        token_override: Option<&str>,
    ) -> ApiResult<T> {
        let response = self
            .request(Method::GET, path_or_url, params, None, token_override)
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Parse(format!("failed to deserialize response: {e}")))
    }

    /// Fetch one page of the deals collection.
    ///
    /// `limit` is clamped to the API maximum; `after` carries the pagination
    /// cursor from the previous page.
    pub async fn fetch_deals(
        &self,
        limit: u32,
        after: Option<&str>,
        token_override: Option<&str>,
        path_override: Option<&str>,
    ) -> ApiResult<DealsPage> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let mut params = vec![
            ("limit", limit.to_string()),
            ("archived", "false".to_string()),
        ];
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }

        let path = path_override.unwrap_or(DEALS_PATH);
        self.get_json(path, &params, token_override).await
    }

    /// Lightweight token check: fetch a minimal page of deals.
    ///
    /// Returns `Ok(false)` on a credential rejection; other failures
    /// propagate unchanged.
    pub async fn validate_credentials(&self) -> ApiResult<bool> {
        match self.fetch_deals(1, None, None, None).await {
            Ok(_) => {
                debug!("credential validation succeeded");
                Ok(true)
            }
            Err(ApiError::Unauthorized(detail)) => {
                warn!(detail = %detail, "credential validation failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn sleep_backoff(&self, attempt: u32, reason: &'static str) {
        metrics::record_api_retry(reason);
        let delay = self.config.backoff_delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
        sleep(delay).await;
    }
}

/// Parse a positive `Retry-After` header value in seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
    headers
        .get("Retry-After")?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
}

/// Build the error context for a non-2xx response, consuming it.
///
/// The message comes from the JSON body's `message` or `error` field when
/// the body parses, otherwise the raw response text.
async fn error_detail(response: Response) -> ErrorDetail {
    let status = response.status().as_u16();
    let request_id = response
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = response.text().await.unwrap_or_default();

    ErrorDetail {
        message: error_message_from_body(&text).unwrap_or(text),
        status: Some(status),
        request_id,
    }
}

/// Extract `message` or `error` from a JSON error body.
fn error_message_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
