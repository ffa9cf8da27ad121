//! Fixed-budget retry for transient external failures
//!
//! HTTP calls to the attribute API are retried a fixed number of times with a
//! fixed delay when the failure looks transient (5xx, timeout, connection
//! reset). Any other failure returns immediately.

use std::future::Future;
use std::time::Duration;

/// Retry budget for one external call
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Run `operation` until it succeeds, fails non-transiently, or the budget
/// runs out; the last error is returned in the latter cases
pub async fn retry_transient<F, Fut, T, E>(
    operation_name: &str,
    policy: RetryPolicy,
    is_transient: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying external call");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "External call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_transient(&err) {
                    return Err(err);
                }

                if attempt >= policy.attempts {
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "External call failed: retry budget exhausted"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, will retry after delay"
                );

                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
