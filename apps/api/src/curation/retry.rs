//! Fixed-delay retry for language-model calls.
//!
//! Only [`LlmErrorKind::Timeout`] is retried. Everything else is returned on the
//! first failure.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::llm_client::{LlmError, LlmErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    pub fn is_retriable(err: &LlmError) -> bool {
        err.kind() == LlmErrorKind::Timeout
    }
}

/// Error from [`retry_on_timeout`], carrying how many attempts were made.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: LlmError,
}

/// Runs `operation` until it succeeds, fails with a non-timeout error, runs out
/// of attempts, or `cancel` fires. A cancelled token stops further attempts but
/// never interrupts one already in flight.
pub async fn retry_on_timeout<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !RetryPolicy::is_retriable(&err) || attempt >= max_attempts || cancel.is_cancelled() {
            return Err(RetryExhausted {
                attempts: attempt,
                last_error: err,
            });
        }

        warn!(
            "{label}: attempt {attempt}/{max_attempts} timed out, retrying in {}s",
            policy.delay.as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep(policy.delay) => {}
            _ = cancel.cancelled() => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
        }
    }
}
