//! Process-local sliding-window rate limiting
//!
//! Keeps an ordered window of request timestamps and blocks callers until a
//! new request would fit inside the budget. The limiter is deliberately
//! process-local; coordinating a budget across processes is out of scope.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

/// Sliding-window rate limiter.
///
/// `acquire()` never fails and never returns a "would block" signal: callers
/// are simply suspended until the oldest timestamp leaves the trailing
/// window. The window lives behind a mutex so a single limiter can be shared
/// (via [`Arc`]) between several extraction runs to enforce one combined
/// budget.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    hits: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter allowing `max_requests` per trailing `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            hits: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a shared limiter wrapped in [`Arc`].
    pub fn shared(max_requests: usize, window: Duration) -> Arc<Self> {
        Arc::new(Self::new(max_requests, window))
    }

    /// Block until issuing one more request stays within the budget, then
    /// record the request timestamp.
    ///
    /// Timestamps older than the window are purged on every call. When the
    /// window is saturated the caller sleeps until the oldest entry expires
    /// and then re-checks, so concurrent callers cannot overshoot the budget.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut hits = self.hits.lock().await;
                let now = Instant::now();
                while hits
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= self.window)
                {
                    hits.pop_front();
                }

                match hits.front() {
                    Some(&oldest) if hits.len() >= self.max_requests => {
                        self.window.saturating_sub(now.duration_since(oldest))
                    }
                    _ => {
                        hits.push_back(now);
                        return;
                    }
                }
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limit window full, waiting");
            sleep(wait).await;
        }
    }

    /// Number of requests currently counted inside the window.
    pub async fn current_usage(&self) -> usize {
        let mut hits = self.hits.lock().await;
        let now = Instant::now();
        while hits
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            hits.pop_front();
        }
        hits.len()
    }
}
