//! Shared helpers
//!
//! `poll_until` is the bounded retry-with-interval combinator used wherever
//! the app waits for something outside its control (page elements, the
//! driver's status endpoint).

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Result of [`poll_until`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Found(T),
    TimedOut { attempts: u32, waited: Duration },
}

impl<T> PollOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::TimedOut { .. } => None,
        }
    }

    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Probe repeatedly until it yields a value or `timeout` elapses.
///
/// The probe always runs at least once. Sleeps between probes are clamped to
/// the remaining budget so the call never overshoots `timeout` by more than
/// one probe.
pub async fn poll_until<T, F, Fut>(interval: Duration, timeout: Duration, mut probe: F) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = probe().await {
            return PollOutcome::Found(value);
        }

        let waited = started.elapsed();
        if waited >= timeout {
            return PollOutcome::TimedOut { attempts, waited };
        }
        sleep(interval.min(timeout - waited)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_found_on_third_probe() {
        let calls = AtomicU32::new(0);
        let outcome = poll_until(Duration::from_millis(250), Duration::from_secs(200), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { (n == 3).then_some(n) }
        })
        .await;

        assert_eq!(outcome, PollOutcome::Found(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_budget() {
        let started = Instant::now();
        let outcome: PollOutcome<()> =
            poll_until(Duration::from_millis(250), Duration::from_secs(2), || async { None }).await;

        match outcome {
            PollOutcome::TimedOut { attempts, waited } => {
                assert_eq!(attempts, 9);
                assert!(waited >= Duration::from_secs(2));
            }
            PollOutcome::Found(()) => panic!("probe never succeeds"),
        }
        assert!(started.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_probes_once() {
        let calls = AtomicU32::new(0);
        let outcome: PollOutcome<()> = poll_until(Duration::from_millis(250), Duration::ZERO, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { None }
        })
        .await;

        assert!(!outcome.is_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
