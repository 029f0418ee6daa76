// Retry With Backoff
//
// Used only for idempotent gateway lookups (transaction status). Signing
// performs no I/O and refunds are never replayed.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::PaymentError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// delay = initial_delay * multiplier^attempt, capped at max_delay
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }
        Duration::from_millis(delay_ms.max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy runs out of attempts. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, PaymentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PaymentError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(attempt = attempt + 1, "Gateway call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                let retryable = is_retryable(&error);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = max_attempts,
                    retryable = retryable,
                    error = %error,
                    "Gateway call failed"
                );

                if !retryable || attempt + 1 >= max_attempts {
                    return Err(error);
                }

                let delay = policy.delay_for_attempt(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Sleeping before retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Timeouts, connection failures and 5xx responses are worth another try.
/// A 5xx always arrives as `GatewayStatus` since the transport reads the
/// status itself.
/// Everything else is permanent for this call.
pub fn is_retryable(error: &PaymentError) -> bool {
    match error {
        PaymentError::Http(e) => e.is_timeout() || e.is_connect(),
        PaymentError::GatewayStatus { status, .. } => *status >= 500,
        PaymentError::InvalidInput(_)
        | PaymentError::MalformedResponse(_)
        | PaymentError::UnknownOperation(_) => false,
    }
}
