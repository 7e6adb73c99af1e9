//! Retry policy for transient HTTP failures.
//!
//! Only completed HTTP exchanges are retried, and only when their status is
//! one of [`RETRYABLE_STATUS_CODES`]. Each retry waits twice as long as the
//! previous one.

use http::StatusCode;
use std::time::Duration;

/// Statuses that signal a timeout, an overloaded backend or a gateway failure.
pub const RETRYABLE_STATUS_CODES: [u16; 7] = [408, 500, 502, 503, 504, 522, 524];

/// Default number of dispatches per request (the first attempt included).
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(300);

/// Returns `true` if `status` belongs to the retryable set.
pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status.as_u16())
}

/// Decides when a failed response is retried and how long to wait first.
///
/// # Examples
///
/// ```
/// use restline::RetryPolicy;
/// use http::StatusCode;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_millis(100));
///
/// // Two attempts left, retryable status: go again.
/// assert!(policy.should_retry(StatusCode::SERVICE_UNAVAILABLE, 2));
/// // Last attempt used up.
/// assert!(!policy.should_retry(StatusCode::SERVICE_UNAVAILABLE, 1));
/// // Client errors are final.
/// assert!(!policy.should_retry(StatusCode::NOT_FOUND, 3));
///
/// assert_eq!(policy.next_backoff(Duration::from_millis(100)), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of dispatches for one request.
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` dispatches, starting the
    /// backoff at `base_backoff`.
    pub fn new(max_attempts: usize, base_backoff: Duration) -> Self {
        Self {
            max_attempts,
            base_backoff,
        }
    }

    /// Returns `true` if a response with `status` should be dispatched again,
    /// given the attempts left including the one that just failed.
    pub fn should_retry(&self, status: StatusCode, attempts_remaining: usize) -> bool {
        attempts_remaining > 1 && is_retryable_status(status)
    }

    /// Returns the delay that follows `current`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2)
    }

    /// Returns the initial state for a fresh request.
    pub fn start(&self) -> RetryState {
        RetryState {
            attempts_remaining: self.max_attempts,
            backoff: self.base_backoff,
        }
    }
}

/// Attempt and backoff bookkeeping for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Dispatches still allowed, counting the current one.
    pub attempts_remaining: usize,
    /// Delay to wait before the next dispatch.
    pub backoff: Duration,
}

impl RetryState {
    /// Consumes one attempt and doubles the backoff.
    pub fn advance(&mut self, policy: &RetryPolicy) {
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        self.backoff = policy.next_backoff(self.backoff);
    }

    /// The 1-indexed number of the attempt about to be made.
    pub fn attempt(&self, policy: &RetryPolicy) -> usize {
        policy.max_attempts.saturating_sub(self.attempts_remaining) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_set() {
        for code in [408u16, 500, 502, 503, 504, 522, 524] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(is_retryable_status(status), "{} should be retryable", code);
        }
        for code in [400u16, 401, 403, 404, 409, 422, 429, 501] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(!is_retryable_status(status), "{} should be final", code);
        }
    }

    #[test]
    fn test_exponential_backoff_delays() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        let mut state = policy.start();

        let mut delays = Vec::new();
        while policy.should_retry(StatusCode::BAD_GATEWAY, state.attempts_remaining) {
            delays.push(state.backoff);
            state.advance(&policy);
        }

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
        assert_eq!(state.attempts_remaining, 1);
        assert_eq!(state.attempt(&policy), 5);
    }

    #[test]
    fn test_single_attempt_never_retries() {
        let policy = RetryPolicy::new(1, Duration::from_millis(100));
        assert!(!policy.should_retry(StatusCode::SERVICE_UNAVAILABLE, policy.start().attempts_remaining));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_backoff(Duration::MAX), Duration::MAX);
        assert_eq!(policy.start().backoff, DEFAULT_BASE_BACKOFF);
        assert_eq!(policy.start().attempts_remaining, DEFAULT_MAX_ATTEMPTS);
    }
}
