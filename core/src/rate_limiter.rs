//! Fixed-window admission control.
//!
//! At most `limit` permits are granted per window of `period`. The window
//! starts at the first acquisition after the previous one has elapsed, so
//! `limit + 1` acquisitions inside one period produce exactly one denial.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Granted,
    /// Denied until the current window closes.
    Denied { retry_after: Duration },
}

impl Permit {
    pub const fn is_granted(&self) -> bool {
        matches!(self, Permit::Granted)
    }

    /// `Granted` as `Ok`, `Denied` as `RateLimitExceeded`.
    pub fn into_result(self) -> Result<(), RagError> {
        match self {
            Permit::Granted => Ok(()),
            Permit::Denied { retry_after } => Err(RagError::RateLimitExceeded { retry_after }),
        }
    }
}

#[derive(Debug)]
struct RateState {
    /// Unset until the first acquisition.
    window_start: Option<Instant>,
    used: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<RateState>,
    limit: u32,
    period: Duration,
}

impl RateLimiter {
    pub const fn new(limit: u32, period: Duration) -> Self {
        Self {
            state: Mutex::new(RateState {
                window_start: None,
                used: 0,
            }),
            limit,
            period,
        }
    }

    /// Never blocks beyond the internal lock.
    pub fn try_acquire(&self) -> Permit {
        // The state is two plain counters and is valid after any panic.
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        let window_start = match guard.window_start {
            Some(start) if now.duration_since(start) < self.period => start,
            _ => {
                guard.window_start = Some(now);
                guard.used = 0;
                now
            }
        };
        if guard.used < self.limit {
            guard.used += 1;
            Permit::Granted
        } else {
            let retry_after = self.period.saturating_sub(now.duration_since(window_start));
            debug!(limit = self.limit, ?retry_after, "rate limit reached");
            Permit::Denied { retry_after }
        }
    }

    pub const fn limit(&self) -> u32 {
        self.limit
    }

    pub const fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    #[tokio::test(start_paused = true)]
    async fn test_one_denial_past_the_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let denied = (0..6).filter(|_| !limiter.try_acquire().is_granted()).count();
        assert_eq!(denied, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_rollover_admits_again() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_acquire().is_granted());
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(limiter.try_acquire().is_granted());

        match limiter.try_acquire() {
            Permit::Denied { retry_after } => assert_eq!(retry_after, Duration::from_secs(40)),
            Permit::Granted => panic!("third acquisition should be denied"),
        }

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(limiter.try_acquire().is_granted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_opens_at_first_acquisition() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        tokio::time::advance(Duration::from_millis(59_500)).await;

        let mut denied = (0..5).filter(|_| !limiter.try_acquire().is_granted()).count();
        tokio::time::advance(Duration::from_secs(1)).await;
        denied += usize::from(!limiter.try_acquire().is_granted());
        assert_eq!(denied, 1);
    }

    #[test]
    fn test_denial_maps_to_rate_limit_error() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire().into_result().is_ok());
        let err = limiter.try_acquire().into_result().unwrap_err();
        assert!(matches!(err, RagError::RateLimitExceeded { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_concurrent_acquisition_never_over_admits() {
        let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(3600)));
        let granted = Arc::new(AtomicU32::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let granted = Arc::clone(&granted);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if limiter.try_acquire().is_granted() {
                            granted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(granted.load(Ordering::SeqCst), 100);
    }
}
