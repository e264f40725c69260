//! Fixed-delay polling against the asynchronous server-side work
//! (case import, study creation, node build, computations).

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Delay between two probe attempts.
pub const POLL_PERIOD: Duration = Duration::from_secs(1);

/// Re-runs `probe` once per second until it yields a value, for at most
/// `max_attempts` additional attempts (so a `max_attempts` of N bounds the
/// wait to roughly N seconds). Returns `None` when the wait is exhausted.
pub async fn poll_until<T, F, Fut>(max_attempts: u64, probe: F) -> Option<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 0..=max_attempts {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if attempt < max_attempts {
            sleep(POLL_PERIOD).await;
        }
    }
    warn!("waiting time exceeded");
    None
}

/// Boolean variant: polls until `probe` returns `true`.
pub async fn poll_while_false<F, Fut>(max_attempts: u64, probe: F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_until(max_attempts, || async {
        if probe().await {
            Some(())
        } else {
            None
        }
    })
    .await
    .is_some()
}
