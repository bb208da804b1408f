//! Rate limit retry.
//!
//! The tracker is retried with a fixed delay for as long as it keeps
//! answering with a rate limit. There is no attempt cap; an overall timeout
//! belongs to whoever runs the process.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::TrackerError;

/// Runs `fetch_fn` until it returns anything other than a rate limit.
///
/// ## Errors
///
/// Any non rate limit error from `fetch_fn`, returned immediately.
///
/// ## Examples
///
/// ```
/// use changelog_lib::retry::retry_on_rate_limit;
/// use changelog_lib::error::TrackerError;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let value = retry_on_rate_limit(Duration::ZERO, || async {
///     Ok::<_, TrackerError>(42)
/// })
/// .await
/// .unwrap();
/// assert_eq!(value, 42);
/// # }
/// ```
pub async fn retry_on_rate_limit<F, Fut, T>(delay: Duration, fetch_fn: F) -> Result<T, TrackerError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, TrackerError>>,
{
    loop {
        match fetch_fn().await {
            Err(e) if e.is_rate_limit() => {
                warn!("Faced rate limit, sleeping {:?}", delay);
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}
