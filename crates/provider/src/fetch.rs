//! Bounded retry for receipt fetches.
//!
//! Policy varies by bank: most sources get a single attempt, Abyssinia gets
//! a short fixed-delay loop. The policy is an explicit value so the calling
//! code, not the client internals, decides the retry shape.

use crate::VerifyError;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Query the source once, bounded by `timeout`.
    pub fn single(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            timeout,
        }
    }

    /// Fixed number of attempts with a fixed inter-attempt delay.
    pub fn fixed(max_attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            timeout,
        }
    }
}

/// Run `build_request` up to `policy.max_attempts` times until a 200 comes
/// back. Non-200 statuses and transport errors both count as failed attempts.
pub async fn fetch_with_policy<F>(
    policy: RetryPolicy,
    build_request: F,
) -> Result<reqwest::Response, VerifyError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_failure: Option<VerifyError> = None;

    for attempt in 1..=policy.max_attempts {
        let result = build_request().timeout(policy.timeout).send().await;
        match result {
            Ok(response) if response.status().as_u16() == 200 => return Ok(response),
            Ok(response) => {
                let status = response.status().as_u16();
                tracing::warn!(attempt, max = policy.max_attempts, status, "source returned non-200");
                last_failure = Some(VerifyError::Http(status));
            }
            Err(err) => {
                tracing::warn!(attempt, max = policy.max_attempts, error = %err, "fetch attempt failed");
                last_failure = Some(VerifyError::Transport(err));
            }
        }
        if attempt < policy.max_attempts {
            sleep(policy.delay).await;
        }
    }

    let last = last_failure.unwrap_or(VerifyError::Http(0));
    if policy.max_attempts > 1 {
        Err(VerifyError::Exhausted {
            attempts: policy.max_attempts,
            reason: last.to_string(),
        })
    } else {
        Err(last)
    }
}
