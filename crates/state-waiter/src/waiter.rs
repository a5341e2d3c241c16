//! Polling loop
//!
//! One refresh per iteration, with a sleep between iterations. Every sleep
//! and every in-flight refresh is raced against the deadline and the
//! cancellation token, so a wait never outlives either.

use crate::error::WaitError;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);
const BACKOFF_START: Duration = Duration::from_millis(100);
const BACKOFF_MAX: Duration = Duration::from_secs(10);
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// One successful refresh of a remote resource
#[derive(Debug, Clone, PartialEq)]
pub struct Observed<T> {
    /// Whatever the caller wants back once the target is reached
    pub snapshot: T,
    /// Status label compared against the pending and target sets
    pub status: String,
    /// Server-reported messages, surfaced on unexpected states
    pub messages: Vec<String>,
}

impl<T> Observed<T> {
    pub fn new(snapshot: T, status: impl Into<String>) -> Self {
        Self {
            snapshot,
            status: status.into(),
            messages: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<String>) -> Self {
        self.messages = messages;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    /// Reach a target status
    Target,
    /// Reach a target status or disappear
    Absence,
}

/// Configuration for a single wait
///
/// Built with chained setters, then consumed by [`StateWaiter::wait`] or
/// [`StateWaiter::wait_until_gone`]. The same waiter can be reused for
/// several waits; it holds no per-wait state.
#[derive(Debug, Clone)]
pub struct StateWaiter {
    resource: String,
    pending: BTreeSet<String>,
    target: BTreeSet<String>,
    timeout: Duration,
    poll_interval: Option<Duration>,
    min_poll_interval: Duration,
    initial_delay: Duration,
    not_found_tolerance: u32,
    cancel: CancellationToken,
}

impl StateWaiter {
    /// Create a waiter for the named resource (used in logs and errors)
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            pending: BTreeSet::new(),
            target: BTreeSet::new(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: None,
            min_poll_interval: Duration::ZERO,
            initial_delay: Duration::ZERO,
            not_found_tolerance: 0,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = states.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn target<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = states.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fixed interval between refreshes
    ///
    /// Without one, the interval grows exponentially from 100ms to 10s.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Lower bound applied to every interval, fixed or backed off
    #[must_use]
    pub fn min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    /// Sleep before the first refresh
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Number of consecutive "not found" refreshes to ride out
    ///
    /// For eventually-consistent backends where a freshly created resource
    /// may not be readable yet.
    #[must_use]
    pub fn not_found_tolerance(mut self, checks: u32) -> Self {
        self.not_found_tolerance = checks;
        self
    }

    #[must_use]
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Poll until the status is in the target set
    ///
    /// `refresh` returns `Ok(None)` when the resource is not found.
    pub async fn wait<T, E, F, Fut>(&self, refresh: F) -> Result<T, WaitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<Observed<T>>, E>>,
        E: std::error::Error + 'static,
    {
        match self.run(refresh, Goal::Target).await? {
            Some(snapshot) => Ok(snapshot),
            None => Err(WaitError::NotFound {
                resource: self.resource.clone(),
                checks: self.not_found_tolerance.saturating_add(1),
            }),
        }
    }

    /// Poll until the resource disappears (or reaches a target status)
    pub async fn wait_until_gone<T, E, F, Fut>(&self, refresh: F) -> Result<(), WaitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<Observed<T>>, E>>,
        E: std::error::Error + 'static,
    {
        self.run(refresh, Goal::Absence).await.map(|_| ())
    }

    async fn run<T, E, F, Fut>(&self, mut refresh: F, goal: Goal) -> Result<Option<T>, WaitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<Observed<T>>, E>>,
        E: std::error::Error + 'static,
    {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut last_status: Option<String> = None;
        let mut not_found: u32 = 0;
        let mut refreshes: u32 = 0;
        let mut delay = self.initial_delay;

        debug!(
            "Waiting for {} to reach {:?} (pending: {:?}, timeout: {:?})",
            self.resource, self.target, self.pending, self.timeout
        );

        loop {
            if !delay.is_zero() {
                let wake = (Instant::now() + delay).min(deadline);
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Err(self.cancelled()),
                    () = sleep_until(wake) => {}
                }
            }

            if Instant::now() >= deadline {
                return Err(self.timed_out(last_status, started));
            }

            let observed = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(self.cancelled()),
                () = sleep_until(deadline) => return Err(self.timed_out(last_status, started)),
                result = refresh() => result.map_err(|source| WaitError::Refresh {
                    resource: self.resource.clone(),
                    source,
                })?,
            };
            refreshes = refreshes.saturating_add(1);

            match observed {
                None if goal == Goal::Absence => {
                    debug!("{} is gone after {} refreshes", self.resource, refreshes);
                    return Ok(None);
                }
                None => {
                    not_found += 1;
                    if not_found > self.not_found_tolerance {
                        return Err(WaitError::NotFound {
                            resource: self.resource.clone(),
                            checks: not_found,
                        });
                    }
                    trace!(
                        "{} not found ({}/{} tolerated)",
                        self.resource, not_found, self.not_found_tolerance
                    );
                }
                Some(observed) => {
                    not_found = 0;
                    if self.target.contains(&observed.status) {
                        debug!(
                            "{} reached '{}' after {} refreshes",
                            self.resource, observed.status, refreshes
                        );
                        return Ok(Some(observed.snapshot));
                    }
                    if !self.pending.contains(&observed.status) {
                        return Err(WaitError::UnexpectedState {
                            resource: self.resource.clone(),
                            status: observed.status,
                            expected: self.target.iter().cloned().collect(),
                            messages: observed.messages,
                        });
                    }
                    trace!("{} still '{}'", self.resource, observed.status);
                    last_status = Some(observed.status);
                }
            }

            delay = self.next_interval(refreshes);
        }
    }

    fn next_interval(&self, refreshes: u32) -> Duration {
        let base = self.poll_interval.unwrap_or_else(|| {
            let doublings = refreshes.saturating_sub(1).min(16);
            BACKOFF_START.saturating_mul(1u32 << doublings).min(BACKOFF_MAX)
        });
        base.max(self.min_poll_interval).max(MIN_SLEEP)
    }

    fn cancelled<E>(&self) -> WaitError<E>
    where
        E: std::error::Error + 'static,
    {
        debug!("Wait for {} cancelled", self.resource);
        WaitError::Cancelled {
            resource: self.resource.clone(),
        }
    }

    fn timed_out<E>(&self, last_status: Option<String>, started: Instant) -> WaitError<E>
    where
        E: std::error::Error + 'static,
    {
        WaitError::Timeout {
            resource: self.resource.clone(),
            last_status,
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    #[error("transport exploded")]
    struct Boom;

    fn batch_waiter() -> StateWaiter {
        StateWaiter::new("vlan batch b-1")
            .pending(["queued", "in_progress"])
            .target(["completed"])
            .timeout(Duration::from_secs(60))
            .poll_interval(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_snapshot_once_target_reached() {
        let mut calls = 0u32;
        let result = batch_waiter()
            .wait(|| {
                calls += 1;
                let n = calls;
                async move {
                    let status = match n {
                        1 => "queued",
                        2 => "in_progress",
                        _ => "completed",
                    };
                    Ok::<_, Boom>(Some(Observed::new(n, status)))
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_bounded_refreshes() {
        let started = Instant::now();
        let mut calls = 0u32;
        let result = batch_waiter()
            .wait(|| {
                calls += 1;
                async { Ok::<_, Boom>(Some(Observed::new((), "queued"))) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout(), "expected timeout, got {err}");
        assert_eq!(err.last_status(), Some("queued"));
        // 60s / 5s + 1
        assert!(calls <= 13, "too many refreshes: {calls}");
        assert!(calls >= 12, "too few refreshes: {calls}");
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(started.elapsed() < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_state_carries_all_messages() {
        let result = batch_waiter()
            .wait(|| async {
                Ok::<_, Boom>(Some(
                    Observed::new((), "failed").with_messages(vec!["x".to_string(), "y".to_string()]),
                ))
            })
            .await;

        match result {
            Err(WaitError::UnexpectedState { status, messages, expected, .. }) => {
                assert_eq!(status, "failed");
                assert_eq!(messages, vec!["x".to_string(), "y".to_string()]);
                assert_eq!(expected, vec!["completed".to_string()]);
            }
            other => panic!("expected UnexpectedState, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_propagates_immediately() {
        let mut calls = 0u32;
        let result: Result<(), _> = batch_waiter()
            .wait(|| {
                calls += 1;
                async { Err::<Option<Observed<()>>, _>(Boom) }
            })
            .await;

        assert!(matches!(result, Err(WaitError::Refresh { .. })));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_within_tolerance_keeps_polling() {
        let mut calls = 0u32;
        let result = batch_waiter()
            .not_found_tolerance(2)
            .wait(|| {
                calls += 1;
                let n = calls;
                async move {
                    if n <= 2 {
                        Ok::<_, Boom>(None)
                    } else {
                        Ok(Some(Observed::new("fleet", "completed")))
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "fleet");
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_beyond_tolerance_fails() {
        let result: Result<(), _> = batch_waiter()
            .not_found_tolerance(1)
            .wait(|| async { Ok::<Option<Observed<()>>, Boom>(None) })
            .await;

        match result {
            Err(WaitError::NotFound { checks, .. }) => assert_eq!(checks, 2),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_found_result_resets_not_found_counter() {
        let mut calls = 0u32;
        let result = batch_waiter()
            .not_found_tolerance(1)
            .wait(|| {
                calls += 1;
                let n = calls;
                async move {
                    match n {
                        1 | 3 => Ok::<_, Boom>(None),
                        2 => Ok(Some(Observed::new(n, "queued"))),
                        _ => Ok(Some(Observed::new(n, "completed"))),
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_gone_treats_absence_as_success() {
        let mut calls = 0u32;
        let result = StateWaiter::new("gateway gw-1")
            .pending(["deleting"])
            .poll_interval(Duration::from_secs(1))
            .wait_until_gone(|| {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Ok::<_, Boom>(Some(Observed::new((), "deleting")))
                    } else {
                        Ok(None)
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_the_wait() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        let counter = Arc::clone(&calls);
        let result = batch_waiter()
            .cancel_on(token)
            .wait(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Boom>(Some(Observed::new((), "in_progress"))) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_cancelled(), "expected cancellation, got {err}");
        // refreshes at 0s, 5s, 10s; cancelled during the sleep towards 15s
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_in_flight_refresh() {
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<(), _> = batch_waiter()
            .cancel_on(token)
            .wait(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<Option<Observed<()>>, Boom>(None)
            })
            .await;

        assert!(matches!(result, Err(WaitError::Cancelled { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_delay_precedes_first_refresh() {
        let started = Instant::now();
        let mut first_refresh_at = None;
        let result = batch_waiter()
            .initial_delay(Duration::from_secs(5))
            .wait(|| {
                first_refresh_at.get_or_insert_with(|| started.elapsed());
                async { Ok::<_, Boom>(Some(Observed::new((), "completed"))) }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(first_refresh_at, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_backoff_grows_and_respects_floor() {
        let waiter = StateWaiter::new("anything");
        assert_eq!(waiter.next_interval(1), Duration::from_millis(100));
        assert_eq!(waiter.next_interval(2), Duration::from_millis(200));
        assert_eq!(waiter.next_interval(3), Duration::from_millis(400));
        assert_eq!(waiter.next_interval(40), BACKOFF_MAX);

        let floored = StateWaiter::new("anything").min_poll_interval(Duration::from_secs(5));
        assert_eq!(floored.next_interval(1), Duration::from_secs(5));
        assert_eq!(floored.next_interval(40), Duration::from_secs(10));

        let fixed = StateWaiter::new("anything")
            .poll_interval(Duration::from_secs(2))
            .min_poll_interval(Duration::from_secs(5));
        assert_eq!(fixed.next_interval(7), Duration::from_secs(5));
    }
}
