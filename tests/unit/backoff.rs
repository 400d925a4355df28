//! Backoff curve unit tests

use std::time::Duration;

use crm_data_extractor::client::config::calculate_backoff;

fn delay(attempt: u32) -> Duration {
    calculate_backoff(attempt, Duration::from_millis(800), Duration::from_millis(8_000))
}

#[test]
fn test_delays_grow_exponentially_until_the_cap() {
    let mut last = Duration::ZERO;
    for attempt in 1..=4 {
        let d = delay(attempt);
        assert!(d > last, "attempt {attempt} should back off longer");
        last = d;
    }
}

#[test]
fn test_cap_bounds_every_late_attempt() {
    for attempt in 5..=20 {
        // Cap plus worst-case jitter of two steps
        assert!(delay(attempt) <= Duration::from_millis(8_000 + 100));
    }
}

#[test]
fn test_huge_attempt_numbers_do_not_overflow() {
    let d = calculate_backoff(u32::MAX, Duration::from_millis(800), Duration::from_secs(8));
    assert!(d <= Duration::from_millis(8_100));
}
