//! Rate-limited CRM API client
//!
//! The client stack has three layers:
//!
//! 1. [`rate_limit::SlidingWindowLimiter`] - process-local request budget
//! 2. [`http::CrmHttpClient`] - authenticated requests with retry, backoff,
//!    and response classification
//! 3. [`response`] - typed page envelope with cursor resolution

use std::fmt;

pub mod config;
pub mod http;
pub mod rate_limit;
pub mod response;

pub use http::{CrmClientConfig, CrmHttpClient};
pub use rate_limit::SlidingWindowLimiter;
pub use response::{DealsPage, Paging, PagingNext, RawDeal};

/// Context attached to a classified API failure.
#[derive(Debug, Clone, Default)]
pub struct ErrorDetail {
    /// Message extracted from the response body.
    pub message: String,
    /// HTTP status code, when the failure came from a response.
    pub status: Option<u16>,
    /// Request id echoed by the API, when present.
    pub request_id: Option<String>,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "[HTTP {status}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(request_id) = &self.request_id {
            write!(f, " (request_id={request_id})")?;
        }
        Ok(())
    }
}

/// Classified API client errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Invalid or missing client configuration; raised before any network
    /// activity.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 401 - credentials rejected; never retried.
    #[error("unauthorized: {0}")]
    Unauthorized(ErrorDetail),

    /// 403 - access denied; never retried.
    #[error("forbidden: {0}")]
    Forbidden(ErrorDetail),

    /// 404 - resource missing; never retried.
    #[error("not found: {0}")]
    NotFound(ErrorDetail),

    /// 429 - budget exhausted upstream; retried internally until the retry
    /// budget runs out.
    #[error("rate limited: {detail}")]
    RateLimited {
        /// Response context.
        detail: ErrorDetail,
        /// Server-provided retry delay in seconds, when parseable.
        retry_after: Option<f64>,
    },

    /// 5xx - upstream failure; retried internally.
    #[error("server error: {0}")]
    Server(ErrorDetail),

    /// Other non-2xx responses; never retried.
    #[error("API error: {0}")]
    Api(ErrorDetail),

    /// Transport-level failure; retried internally.
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be deserialized.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    /// HTTP status associated with the error, when known.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(d)
            | ApiError::Forbidden(d)
            | ApiError::NotFound(d)
            | ApiError::Server(d)
            | ApiError::Api(d) => d.status,
            ApiError::RateLimited { detail, .. } => detail.status,
            _ => None,
        }
    }

    /// Whether the client retries this failure internally.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. } | ApiError::Server(_) | ApiError::Network(_)
        )
    }
}

/// Result type for client operations.
pub type ApiResult<T> = Result<T, ApiError>;
