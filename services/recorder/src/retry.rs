//! Retry helper: bounded attempts, fixed interval, cooperative
//! cancellation. The inter-attempt sleep races the cancellation token so a
//! cancelled scope never blocks on a full sleep.

use std::fmt::Display;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max: u32,
    pub interval: Duration,
}

pub enum RetryOutcome<T, E> {
    Ok(T),
    Cancelled,
    ExhaustedWith(E),
}

/// Calls `supplier` up to `cfg.max + 1` times. After a failure, sleeps
/// `cfg.interval` and re-enters, unless `cancel` fires first. Returns the
/// last error after exhausting attempts.
pub async fn retry<T, E, F, Fut>(
    cfg: &RetryConfig,
    cancel: &CancellationToken,
    mut supplier: F,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = cfg.max + 1;
    let mut last_err = None;

    for attempt in 1..=attempts {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled;
        }

        match supplier().await {
            Ok(value) => return RetryOutcome::Ok(value),
            Err(e) => {
                warn!(
                    attempt,
                    max = cfg.max,
                    interval_secs = cfg.interval.as_secs(),
                    error = %e,
                    "retry: attempt failed"
                );
                let is_last = attempt == attempts;
                last_err = Some(e);
                if is_last {
                    break;
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return RetryOutcome::Cancelled,
                    () = tokio::time::sleep(cfg.interval) => {}
                }
            }
        }
    }

    match last_err {
        Some(e) => RetryOutcome::ExhaustedWith(e),
        None => unreachable!("loop always runs at least once and captures an error before exiting without Ok"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_up_to_max_plus_one_times() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig {
            max: 2,
            interval: Duration::from_millis(1),
        };
        let cancel = CancellationToken::new();

        let outcome = retry(&cfg, &cancel, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), &str>("boom") }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(outcome, RetryOutcome::ExhaustedWith("boom")));
    }

    #[tokio::test]
    async fn returns_ok_without_exhausting_attempts() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig {
            max: 5,
            interval: Duration::from_millis(1),
        };
        let cancel = CancellationToken::new();

        let outcome = retry(&cfg, &cancel, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(outcome, RetryOutcome::Ok(42)));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_exhausting_attempts() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig {
            max: 10,
            interval: Duration::from_secs(3600),
        };
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let handle = tokio::spawn(async move {
            retry(&cfg, &cancel_clone, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), &str>("boom") }
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, RetryOutcome::Cancelled));
    }
}
