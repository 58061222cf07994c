// Retry with exponential backoff for collaborator transport calls

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Run `operation` up to `max_retries + 1` times.
///
/// `should_retry` decides whether a given error is transient; the delay
/// doubles after every failed attempt starting from `base_delay`.
pub async fn with_retry<F, Fut, T, E, R>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= max_retries || !should_retry(&error) {
                    return Err(error);
                }
                attempt += 1;

                let delay = base_delay * 2u32.pow((attempt - 1).min(5));
                warn!(attempt, max_retries, error = %error, delay_ms = delay.as_millis() as u64, "Retrying after failure");
                sleep(delay).await;
            }
        }
    }
}
