//! Bounded retry with exponential backoff and a per-call timeout
//!
//! Remote provider calls are the only operations in the pipeline expected to
//! block. Each attempt is bounded by a hard timeout; failed attempts are
//! retried with exponential backoff until the attempt budget runs out, and the
//! final state is reported as a [`RetryOutcome`] rather than an empty result.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ProviderSettings;
use crate::error::Error;
use crate::provider::{Provider, ProviderError, ProviderRequest, ProviderResponse};

/// Retry policy for one class of remote call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound on any delay
    pub max_delay: Duration,
    /// Growth factor between delays
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
    /// Hard timeout for a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&ProviderSettings::default())
    }
}

impl RetryPolicy {
    /// Build a policy from provider settings
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_backoff_ms),
            max_delay: Duration::from_millis(settings.max_backoff_ms),
            backoff_multiplier: 2.0,
            jitter: settings.jitter,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    /// A policy with no waiting, for tests
    pub fn immediate(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
            timeout,
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64;
        let exponential = base * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let mut delay = Duration::from_millis(exponential as u64).min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let jitter = (delay.as_millis() as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay += Duration::from_millis(jitter);
        }
        delay
    }
}

/// Final state of a retried call
#[derive(Debug)]
pub enum RetryOutcome {
    /// A response arrived
    Success {
        /// The response
        response: ProviderResponse,
        /// Attempts used
        attempts: u32,
    },
    /// Every attempt failed, or a non-retryable error stopped the loop
    Exhausted {
        /// Attempts used
        attempts: u32,
        /// Error of the final attempt
        last_error: ProviderError,
    },
}

impl RetryOutcome {
    /// Convert into a result, mapping exhaustion to `ProviderUnavailable`
    pub fn into_result(self) -> crate::Result<ProviderResponse> {
        match self {
            RetryOutcome::Success { response, .. } => Ok(response),
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(Error::ProviderUnavailable {
                attempts,
                last_error: last_error.to_string(),
            }),
        }
    }
}

/// Call the provider under the policy
pub async fn call_with_retry(
    provider: &dyn Provider,
    request: &ProviderRequest,
    policy: &RetryPolicy,
) -> RetryOutcome {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = match tokio::time::timeout(policy.timeout, provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(policy.timeout)),
        };

        match result {
            Ok(response) => {
                if attempt > 1 {
                    debug!(
                        stage = %request.stage,
                        attempt = attempt,
                        "provider call succeeded after retry"
                    );
                }
                return RetryOutcome::Success {
                    response,
                    attempts: attempt,
                };
            }
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay(attempt);
                warn!(
                    stage = %request.stage,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying provider call after delay"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                warn!(
                    stage = %request.stage,
                    attempts = attempt,
                    error = %err,
                    "provider call exhausted"
                );
                return RetryOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ScriptedProvider, Stage};

    fn request() -> ProviderRequest {
        ProviderRequest::new(Stage::Parse, "counter")
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            jitter: false,
            timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(300));
        assert_eq!(policy.delay(9), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
            timeout: Duration::from_secs(1),
        };
        let delay = policy.delay(1);
        assert!(delay >= Duration::from_millis(400));
        assert!(delay <= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let provider = ScriptedProvider::new()
            .fail(Stage::Parse, ProviderError::transient("connection reset"))
            .reply(Stage::Parse, "{}");
        let policy = RetryPolicy::immediate(3, Duration::from_secs(1));

        match call_with_retry(&provider, &request(), &policy).await {
            RetryOutcome::Success { attempts, response } => {
                assert_eq!(attempts, 2);
                assert_eq!(response.text, "{}");
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhaustion_is_reported() {
        let provider = ScriptedProvider::new()
            .fail(Stage::Parse, ProviderError::transient("503"))
            .fail(Stage::Parse, ProviderError::transient("503"));
        let policy = RetryPolicy::immediate(2, Duration::from_secs(1));

        let outcome = call_with_retry(&provider, &request(), &policy).await;
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_immediately() {
        let provider = ScriptedProvider::new()
            .fail(Stage::Parse, ProviderError::fatal("invalid api key"))
            .reply(Stage::Parse, "{}");
        let policy = RetryPolicy::immediate(3, Duration::from_secs(1));

        match call_with_retry(&provider, &request(), &policy).await {
            RetryOutcome::Exhausted { attempts, .. } => assert_eq!(attempts, 1),
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_transient() {
        let provider = ScriptedProvider::new()
            .stall(Stage::Parse, Duration::from_secs(30))
            .reply(Stage::Parse, "ok");
        let policy = RetryPolicy::immediate(2, Duration::from_secs(5));

        match call_with_retry(&provider, &request(), &policy).await {
            RetryOutcome::Success { attempts, .. } => assert_eq!(attempts, 2),
            other => panic!("expected success after timeout, got {:?}", other),
        }
    }
}
