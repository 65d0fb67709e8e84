use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::CompletionService;
use super::ServiceFailure;
use crate::config::RagConfig;
use crate::error::RagError;
use crate::error::Result;
use crate::rate_limiter::RateLimiter;

/// Retry configuration for the completion call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: true,
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            max_attempts: config.gemini_max_retries,
            base_delay: config.retry_base_delay(),
            attempt_timeout: config.gemini_timeout(),
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// scaled by a jitter factor in `[0.5, 1.5)`, never above `max_delay`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let mut delay = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if self.jitter {
            let jitter_factor = rand::rng().random_range(0.5..1.5);
            delay = delay.mul_f64(jitter_factor);
        }
        delay.min(self.max_delay)
    }
}

/// Rate-limited, retrying front for a [`CompletionService`].
pub struct InferenceClient {
    service: Arc<dyn CompletionService>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl InferenceClient {
    pub fn new(
        service: Arc<dyn CompletionService>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            service,
            limiter,
            policy,
        }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// One permit per call; a denial fails immediately and is not retried.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        self.limiter.try_acquire().into_result()?;

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            let outcome = tokio::time::timeout(self.policy.attempt_timeout, self.service.generate(prompt))
                .await
                .unwrap_or_else(|_| {
                    Err(ServiceFailure::Transient(format!(
                        "timed out after {:?}",
                        self.policy.attempt_timeout
                    )))
                });

            match outcome {
                Ok(answer) => {
                    debug!(attempt, "completion succeeded");
                    return Ok(answer);
                }
                Err(ServiceFailure::Rejected(message)) => {
                    warn!(attempt, error = %message, "completion rejected");
                    return Err(RagError::InferenceService(message));
                }
                Err(ServiceFailure::Transient(message)) => {
                    last_error = message;
                    if attempt < max_attempts {
                        let delay = self.policy.backoff_delay(attempt);
                        warn!(
                            attempt,
                            ?delay,
                            error = %last_error,
                            "completion attempt failed, retrying"
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        error!(attempts = max_attempts, error = %last_error, "completion retries exhausted");
        Err(RagError::InferenceRetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}
