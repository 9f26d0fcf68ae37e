use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded retry with a fixed inter-attempt delay. Shared by question
/// generation and answer scoring, which use identical policies.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    /// Up to 3 attempts, 1 second apart.
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_secs(1))
    }
}

/// Runs `op` until it succeeds or the policy is exhausted, returning the last
/// error. Any failure, whatever its kind, falls through to the next attempt.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.max_attempts => {
                warn!(
                    "attempt {attempt}/{} failed, giving up: {e}",
                    policy.max_attempts
                );
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "attempt {attempt}/{} failed, retrying in {:?}: {e}",
                    policy.max_attempts, policy.delay
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
