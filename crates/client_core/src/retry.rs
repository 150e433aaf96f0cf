use std::future::Future;

use tracing::{error, warn};

use crate::{config::RetryPolicy, error::SyncError, remote::ConnectivityIndicator};

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted. The indicator reports degraded connectivity for as
/// long as a retry is pending.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    indicator: &ConnectivityIndicator,
    mut op: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut retry = 0;
    let outcome = loop {
        match op().await {
            Ok(value) => break Ok(value),
            Err(err) if err.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                warn!(
                    op = label,
                    attempt = retry,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "remote: write failed, retrying"
                );
                if retry == 1 {
                    indicator.retry_started();
                }
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_retryable() {
                    error!(op = label, attempts = retry + 1, error = %err, "remote: write gave up");
                }
                break Err(err);
            }
        }
    };

    if retry > 0 {
        indicator.retry_finished();
    }
    outcome
}
