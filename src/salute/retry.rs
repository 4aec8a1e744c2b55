use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder, Retryable};
use rand::Rng as _;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::config::SaluteResolvedConfig;
use crate::error::IsRetryable;
use crate::salute::Operation;

const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(250);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Bounded exponential backoff with full jitter.
///
/// Stops after `max_attempts` attempts (first one included) or once the next sleep would
/// cross `max_elapsed` since the first attempt, whichever comes first.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: usize,
    max_elapsed: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, max_elapsed: Duration) -> Self {
        Self {
            min_delay: DEFAULT_MIN_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: max_attempts.max(1),
            max_elapsed,
        }
    }

    pub fn from_config(cfg: &SaluteResolvedConfig) -> Self {
        Self::new(cfg.retry_max_attempts, cfg.retry_max_elapsed)
    }

    pub fn with_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self.max_delay = max_delay.max(min_delay);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Runs `call`, retrying only failures classified as retryable.
    pub async fn run<T, E, F, Fut>(&self, op: Operation, call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsRetryable + std::fmt::Display,
    {
        call.retry(*self)
            .when(|err: &E| err.is_retryable())
            .notify(|err: &E, dur: Duration| {
                warn!(
                    op = %op,
                    "[Salute] {} retrying after transient error {} in {:?}",
                    op, err, dur
                );
            })
            .await
    }
}

impl BackoffBuilder for RetryPolicy {
    type Backoff = FullJitterBackoff;

    fn build(self) -> Self::Backoff {
        let inner = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts.saturating_sub(1))
            .build();

        FullJitterBackoff {
            inner,
            started: Instant::now(),
            max_elapsed: self.max_elapsed,
        }
    }
}

/// Exponential schedule where each sleep is drawn uniformly from `[0, delay)`.
#[derive(Debug)]
pub struct FullJitterBackoff {
    inner: ExponentialBackoff,
    started: Instant,
    max_elapsed: Duration,
}

impl Iterator for FullJitterBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let ceiling = self.inner.next()?;
        let delay = ceiling.mul_f64(rand::rng().random::<f64>());
        if self.started.elapsed() + delay >= self.max_elapsed {
            return None;
        }
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_secs(30))
            .with_delays(Duration::from_millis(1), Duration::from_millis(4))
    }

    #[tokio::test]
    async fn succeeds_on_fifth_attempt() {
        let attempts = AtomicUsize::new(0);

        let result = fast_policy()
            .run(Operation::Status, || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 5 {
                    Err(TestError::Transient)
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.expect("fifth attempt succeeds"), 5);
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn gives_up_after_five_attempts() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), TestError> = fast_policy()
            .run(Operation::Upload, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Transient)
            })
            .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), TestError> = fast_policy()
            .run(Operation::Recognize, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Fatal)
            })
            .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_budget_stops_retrying_early() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy::new(1000, Duration::from_secs(30))
            .with_delays(Duration::from_secs(4), Duration::from_secs(8));
        let started = Instant::now();

        let result: Result<(), TestError> = policy
            .run(Operation::Token, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Transient)
            })
            .await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(attempts.load(Ordering::SeqCst) < 1000);
    }

    #[test]
    fn jittered_delays_never_exceed_ceiling() {
        let policy = RetryPolicy::new(50, Duration::from_secs(3600))
            .with_delays(Duration::from_millis(10), Duration::from_millis(80));

        let delays: Vec<_> = policy.build().collect();
        assert_eq!(delays.len(), 49);
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(80)));
    }
}
