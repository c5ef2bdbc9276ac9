use crate::error::AnalysisError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;
pub const RETRY_DELAY_MS: u64 = 1000;

/// Bounded retry with linear backoff. Only transport failures are retried;
/// empty and unparseable responses return immediately.
pub async fn retry_transport<F, Fut, T>(
    max_attempts: u32,
    delay: Duration,
    mut f: F,
) -> Result<T, AnalysisError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalysisError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transport() && attempt < max_attempts => {
                warn!("Attempt {} failed: {}. Retrying...", attempt, e);
                sleep(delay * attempt).await;
                attempt += 1;
            }
            Err(e) => {
                if max_attempts > 1 && e.is_transport() {
                    error!("All {} attempts failed: {}", max_attempts, e);
                }
                return Err(e);
            }
        }
    }
}
