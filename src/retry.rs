//! Bounded retry with a fixed inter-attempt delay.
//!
//! Retry policy is plain data carried in config; the combinator is applied
//! explicitly at each flow's call site in the orchestrator rather than
//! attached to the flows themselves.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Invoke `op` up to `policy.attempts` times, sleeping `policy.delay`
/// between attempts. Each failed attempt is logged; the final failure is
/// propagated with the label attached.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(
                    flow = label,
                    attempt,
                    max_attempts = attempts,
                    error = %format!("{err:#}"),
                    "Attempt failed"
                );
                last_err = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("no attempt was made"))
        .context(format!("{label}: all {attempts} attempts failed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            delay: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(3), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(7) }
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(3), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    anyhow::bail!("transient")
                }
                Ok(n)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_propagates_last_error_with_label() {
        let calls = AtomicU32::new(0);
        let err = with_retry(policy(3), "account switch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(anyhow::anyhow!("boom")) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let message = format!("{err:#}");
        assert!(message.contains("account switch: all 3 attempts failed"));
        assert!(message.contains("boom"));
    }
}
