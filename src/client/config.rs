//! HTTP client configuration constants and backoff calculation

use std::time::Duration;

/// Default CRM API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.hubapi.com";

/// Default endpoint path for the deals collection.
pub const DEALS_PATH: &str = "/crm/v3/objects/deals";

/// Descriptive client identifier sent with every request.
pub const USER_AGENT: &str = "crm-data-extractor/0.1";

/// Maximum number of retries beyond the first attempt.
/// 3 retries recovers from transient network and 5xx failures while keeping
/// the worst-case wall time for a doomed request under ~15 seconds.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay. 800ms is long enough for most burst rate-limit
/// windows to drain but short enough not to stall a healthy extraction.
pub const INITIAL_BACKOFF_MS: u64 = 800;

/// Maximum backoff delay. Caps exponential growth at 8 seconds so a single
/// flaky page never blocks the pagination loop for minutes.
pub const MAX_BACKOFF_MS: u64 = 8_000;

/// Jitter step added per attempt to spread out concurrent retriers.
pub const JITTER_STEP_MS: u64 = 50;

/// Request timeout for a single HTTP attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sliding-window rate limit: maximum requests per window.
/// Matches the upstream API budget of 150 requests per 10 seconds.
pub const RATE_LIMIT_MAX_REQUESTS: usize = 150;

/// Sliding-window rate limit: window length.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(10);

/// Largest page size the API accepts; larger requests are clamped.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Calculate the exponential backoff delay for a retry attempt (1-indexed).
///
/// `min(max, initial * 2^(attempt-1))` plus a small deterministic jitter
/// proportional to the attempt number.
pub fn calculate_backoff(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = initial.saturating_mul(2_u32.pow(exp)).min(max);
    delay + Duration::from_millis(JITTER_STEP_MS * u64::from(attempt % 3))
}
