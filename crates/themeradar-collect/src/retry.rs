//! Bounded retry loop shared by all collectors.

use themeradar_core::SourceId;

use crate::cancel::CancelFlag;
use crate::error::CollectError;
use crate::failure::FailureClassifier;
use crate::rate::RateGovernor;

/// Runs `op` until it succeeds, the classifier rules the error final, the
/// attempt budget runs out, or the cancel flag trips.
///
/// Each attempt first waits for a rate window slot, so a burst of retries
/// cannot blow through the source's request budget. `max_attempts` is the
/// total number of attempts, not the number of retries after the first.
///
/// # Errors
///
/// Returns the last error from `op` when it is non-retryable,
/// [`CollectError::RetryExhausted`] when the budget runs out, or
/// [`CollectError::Cancelled`] when the flag trips between attempts.
pub async fn fetch_with_retry<T, F, Fut>(
    source: SourceId,
    governor: &RateGovernor,
    classifier: &FailureClassifier,
    cancel: &CancelFlag,
    max_attempts: u32,
    mut op: F,
) -> Result<T, CollectError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, CollectError>>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(CollectError::Cancelled);
        }

        governor.wait_until_available(source).await;

        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                classifier.log_error(source, &error);
                if !classifier.should_retry(&error) {
                    return Err(error);
                }
                attempt += 1;
                governor.backoff(source, attempt, max_attempts).await?;
            }
        }
    }
}
