//! Bounded polling for cloud resource state
//!
//! Every wait in stepler goes through [`until`]: poll a probe at a fixed
//! interval until it reports ready, or fail with a [`WaitError`] carrying the
//! last state the probe saw.
//!
//! # Example
//!
//! ```ignore
//! use stepler::wait::{until, Probe};
//!
//! let volume = until(format!("volume/{id}"), || async {
//!     let volume = api.get_volume(&id).await?;
//!     Ok::<_, StepError>(if volume.status == "available" {
//!         Probe::Ready(volume)
//!     } else {
//!         Probe::Pending(format!("status={}", volume.status))
//!     })
//! })
//! .policy(timeouts.volume_available)
//! .ready()
//! .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::WaitPolicy;

/// Rich error context for a wait that ran out of time
#[derive(Debug, Clone)]
pub struct WaitError {
    /// Resource reference (e.g., "volume/4f1c...")
    pub resource: String,
    /// Description of the last observed state
    pub last_state: String,
    /// How long we waited before giving up
    pub elapsed: Duration,
    /// The timeout that was configured
    pub timeout: Duration,
    /// Number of probes made
    pub attempts: u32,
}

impl WaitError {
    pub fn new(resource: impl Into<String>, timeout: Duration, elapsed: Duration) -> Self {
        Self {
            resource: resource.into(),
            last_state: "unknown".to_string(),
            elapsed,
            timeout,
            attempts: 0,
        }
    }

    /// Set the last observed state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.last_state = state.into();
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Wait timeout for {}", self.resource)?;
        writeln!(f, "├─ Last state: {}", self.last_state)?;
        writeln!(f, "├─ Attempts: {}", self.attempts)?;
        writeln!(f, "├─ Elapsed: {:?}", self.elapsed)?;
        write!(f, "└─ Timeout: {:?}", self.timeout)
    }
}

impl std::error::Error for WaitError {}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// Condition holds; the wait returns this value
    Ready(T),
    /// Not yet; the string describes what was observed
    Pending(String),
}

impl<T> Probe<T> {
    /// `Ready(value)` when `ready` holds, otherwise `Pending(state)`
    pub fn when(ready: bool, value: T, state: impl Into<String>) -> Self {
        if ready {
            Probe::Ready(value)
        } else {
            Probe::Pending(state.into())
        }
    }
}

/// Builder for a bounded poll
pub struct Wait<F> {
    resource: String,
    probe: F,
    timeout: Duration,
    interval: Duration,
}

/// Poll `probe` until it reports ready
///
/// Default timeout: 60 seconds
/// Default interval: 1 second
pub fn until<F>(resource: impl Into<String>, probe: F) -> Wait<F> {
    Wait {
        resource: resource.into(),
        probe,
        timeout: Duration::from_secs(60),
        interval: Duration::from_secs(1),
    }
}

impl<F> Wait<F> {
    /// Set the timeout duration
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Take timeout and interval from a policy
    pub fn policy(self, policy: WaitPolicy) -> Self {
        self.timeout(policy.timeout).interval(policy.interval)
    }

    /// Run the poll
    ///
    /// A probe error ends the wait immediately. The final probe happens at the
    /// deadline, so a timeout is reported at most one interval late.
    pub async fn ready<T, E, Fut>(mut self) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Probe<T>, E>>,
        E: From<WaitError>,
    {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            let last_state = match (self.probe)().await? {
                Probe::Ready(value) => {
                    debug!(
                        resource = %self.resource,
                        attempts,
                        elapsed = ?start.elapsed(),
                        "Condition met"
                    );
                    return Ok(value);
                }
                Probe::Pending(state) => state,
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::new(&self.resource, self.timeout, start.elapsed())
                    .with_state(last_state)
                    .with_attempts(attempts)
                    .into());
            }

            debug!(
                resource = %self.resource,
                state = %last_state,
                elapsed = ?start.elapsed(),
                "Condition not met, waiting..."
            );

            sleep(self.interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum TestError {
        Wait(WaitError),
        Probe(&'static str),
    }

    impl From<WaitError> for TestError {
        fn from(e: WaitError) -> Self {
            TestError::Wait(e)
        }
    }

    #[tokio::test]
    async fn test_ready_immediately() {
        let value = until("thing", || async { Ok::<_, TestError>(Probe::Ready(7)) })
            .timeout(Duration::from_millis(100))
            .ready()
            .await
            .unwrap();

        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = until("thing", move || {
            let c = counter_clone.clone();
            async move {
                let count = c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(Probe::when(count >= 3, count, format!("count={count}")))
            }
        })
        .timeout(Duration::from_secs(2))
        .interval(Duration::from_millis(10))
        .ready()
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_timeout_reports_last_state() {
        let start = std::time::Instant::now();
        let result = until("volume/abc", || async {
            Ok::<Probe<()>, TestError>(Probe::Pending("status=extending".to_string()))
        })
        .timeout(Duration::from_millis(200))
        .interval(Duration::from_millis(50))
        .ready()
        .await;
        let elapsed = start.elapsed();

        match result {
            Err(TestError::Wait(err)) => {
                assert_eq!(err.resource, "volume/abc");
                assert_eq!(err.last_state, "status=extending");
                assert!(err.attempts > 1);
                assert!(err.to_string().contains("status=extending"));
            }
            other => panic!("expected wait timeout, got {other:?}"),
        }
        assert!(elapsed >= Duration::from_millis(200));
        // at most one interval late, plus scheduling slack
        assert!(elapsed < Duration::from_millis(200 + 50 + 150), "{elapsed:?}");
    }

    #[tokio::test]
    async fn test_probe_error_stops_wait() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = until("thing", move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            async { Err::<Probe<()>, _>(TestError::Probe("boom")) }
        })
        .timeout(Duration::from_secs(5))
        .interval(Duration::from_millis(10))
        .ready()
        .await;

        assert!(matches!(result, Err(TestError::Probe("boom"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_policy_sets_both() {
        let wait = until("x", || async { Ok::<_, TestError>(Probe::Ready(())) })
            .policy(WaitPolicy::new(Duration::from_millis(5), Duration::from_millis(1)));
        assert_eq!(wait.timeout, Duration::from_millis(5));
        assert_eq!(wait.interval, Duration::from_millis(1));
    }

    #[test]
    fn test_wait_error_display() {
        let err = WaitError::new("stack/web", Duration::from_secs(60), Duration::from_secs(61))
            .with_state("stack_status=CREATE_IN_PROGRESS")
            .with_attempts(12);

        let output = err.to_string();
        assert!(output.contains("stack/web"));
        assert!(output.contains("CREATE_IN_PROGRESS"));
        assert!(output.contains("60s"));
        assert!(output.contains("12"));
    }
}
