//! Resilient invocation layer
//!
//! Every outbound call goes through `invoke`: bounded attempts, exponential
//! backoff with a cap, and a per-attempt timeout race. Errors are classified
//! retryable or fatal up front; fatal errors short-circuit immediately and
//! the last classified error is always surfaced, never swallowed.
//!
//! The layer holds no state of its own - concurrent invocations share
//! nothing beyond the policy values passed in.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Message fragments that mark a failure as not worth retrying
const FATAL_MARKERS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "not found",
    "invalid api key",
    "invalid token",
    "authentication",
];

/// A failure from an outbound call, classified for retry decisions
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("retryable failure: {message}")]
    Retryable { message: String, status: Option<u16> },
    #[error("fatal failure: {message}")]
    Fatal { message: String, status: Option<u16> },
}

impl InvokeError {
    pub fn retryable(message: impl Into<String>) -> Self {
        InvokeError::Retryable {
            message: message.into(),
            status: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        InvokeError::Fatal {
            message: message.into(),
            status: None,
        }
    }

    /// Classify by HTTP status class: anything in 4xx is non-retryable,
    /// everything else (5xx, transport-level trouble) is worth another try.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if (400..500).contains(&status) {
            InvokeError::Fatal {
                message,
                status: Some(status),
            }
        } else {
            InvokeError::Retryable {
                message,
                status: Some(status),
            }
        }
    }

    /// Classify by message content when no status code is available
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if FATAL_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            InvokeError::Fatal {
                message,
                status: None,
            }
        } else {
            InvokeError::Retryable {
                message,
                status: None,
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, InvokeError::Retryable { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            InvokeError::Retryable { status, .. } | InvokeError::Fatal { status, .. } => *status,
        }
    }
}

/// Terminal failure after the retry budget is spent (or a fatal error cut
/// it short). Carries the attempt count for reporting.
#[derive(Debug, Clone, Error)]
#[error("{label} failed after {attempts} attempt(s): {source}")]
pub struct InvokeFailure {
    pub label: String,
    pub attempts: u32,
    #[source]
    pub source: InvokeError,
}

/// Retry/backoff/timeout settings for one invocation
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per-attempt deadline; a slow attempt counts as a retryable failure
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry: base * 2^(attempt-1), capped
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Run `op` under the retry policy. Each attempt races against the
/// per-attempt timeout; a timeout is retryable and advances the counter.
/// Fatal classifications return immediately without further attempts.
pub async fn invoke<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, InvokeFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, InvokeError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = InvokeError::retryable("no attempts were made");

    for attempt in 1..=max_attempts {
        let result = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(InvokeError::retryable(format!(
                "attempt timed out after {:?}",
                policy.attempt_timeout
            ))),
        };

        match result {
            Ok(value) => {
                debug!(label, attempt, "invocation succeeded");
                return Ok(value);
            }
            Err(error) if error.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retryable failure, backing off"
                );
                last_error = error;
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                warn!(label, attempt, error = %error, "invocation failed");
                return Err(InvokeFailure {
                    label: label.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }
        }
    }

    Err(InvokeFailure {
        label: label.to_string(),
        attempts: max_attempts,
        source: last_error,
    })
}
