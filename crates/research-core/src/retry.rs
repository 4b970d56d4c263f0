//! Bounded retry with exponential backoff for capability calls
//!
//! Every reasoner and paper-source call goes through [`call_with_retry`].
//! Attempt counters and delays are local to the call, so concurrent
//! syntheses never share retry state.

use crate::config::RetryConfig;
use crate::error::CapabilityError;
use std::future::Future;
use std::time::Duration;

/// Execute an async capability call with a per-attempt timeout and
/// exponential backoff between transient failures.
///
/// `Permanent` errors return immediately. After `max_attempts` the last
/// error is returned and the caller decides how to degrade.
pub async fn call_with_retry<F, Fut, T>(
    config: &RetryConfig,
    call_timeout: Duration,
    operation_name: &str,
    operation: F,
) -> Result<T, CapabilityError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = match tokio::time::timeout(call_timeout, operation()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CapabilityError::Timeout {
                timeout_secs: call_timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt >= max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %e,
                    "Capability call gave up"
                );
                return Err(e);
            }
            Err(e) => {
                let backoff_ms = compute_backoff(config, attempt - 1, &e);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt,
                    max = max_attempts,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                if backoff_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}

/// Backoff for the given zero-based retry, honouring server rate-limit hints
fn compute_backoff(config: &RetryConfig, retry: u32, err: &CapabilityError) -> u64 {
    let computed = compute_exponential_backoff(config, retry);
    match err {
        CapabilityError::RateLimited {
            retry_after_secs: Some(secs),
        } => computed.max(secs.saturating_mul(1000)),
        _ => computed,
    }
}

/// Pure exponential backoff with optional jitter
fn compute_exponential_backoff(config: &RetryConfig, retry: u32) -> u64 {
    let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(exponent);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter && capped > 0 {
        // Up to 25% extra
        let jitter = (capped as f64 * 0.25 * rand::random::<f64>()) as u64;
        capped + jitter
    } else {
        capped
    }
}
