//! Explicit retry helper with a per-attempt delay schedule.
//!
//! Call sites that need retry wrap their operation explicitly instead
//! of relying on hidden cross-cutting machinery, so the control flow
//! stays visible at the point of use.

use std::future::Future;
use std::time::Duration;

/// Run `op` up to `max_attempts` times, sleeping between attempts.
///
/// `delays[n]` is the sleep after the `n+1`-th failure; when the
/// schedule is shorter than the attempt count the last entry repeats.
/// An empty schedule retries immediately. The final error is returned
/// once attempts are exhausted.
pub async fn retry_with_delays<T, E, F, Fut>(
    max_attempts: u32,
    delays: &[Duration],
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts.max(1) {
                    return Err(e);
                }

                let delay = delays
                    .get((attempt - 1) as usize)
                    .or_else(|| delays.last())
                    .copied()
                    .unwrap_or(Duration::ZERO);

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
