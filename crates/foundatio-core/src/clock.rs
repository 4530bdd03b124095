//! Injected time source used by every foundatio component.
//!
//! Components never call `Utc::now()` or `Instant::now()` directly; they
//! hold an `Arc<dyn Clock>` supplied through their config builder. The
//! production [`SystemClock`] delegates to the OS; the [`TestClock`] is
//! frozen and only moves through [`TestClock::advance`], which also wakes
//! any in-flight [`Clock::sleep`] whose deadline has passed.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// A process-wide time source.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current wall-clock time (UTC).
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic span since the clock was created. Unaffected by wall-clock
    /// adjustments; suitable for measuring elapsed time.
    fn monotonic(&self) -> Duration;

    /// Suspends the caller for `duration`.
    ///
    /// Callers that need a cancellable wait race this against their
    /// cancellation token:
    ///
    /// ```ignore
    /// tokio::select! {
    ///     _ = clock.sleep(delay) => {}
    ///     _ = token.cancelled() => {}
    /// }
    /// ```
    async fn sleep(&self, duration: Duration);
}

/// The real clock: OS wall time and `tokio::time::sleep`.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Duration {
        self.started.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if duration > Duration::ZERO {
            tokio::time::sleep(duration).await;
        }
    }
}

struct Sleeper {
    due: Duration,
    waker: oneshot::Sender<()>,
}

struct TestClockState {
    now: DateTime<Utc>,
    elapsed: Duration,
    sleepers: Vec<Sleeper>,
}

/// A frozen clock for tests.
///
/// `now()` and `monotonic()` return fixed readings that only move via
/// [`advance`](TestClock::advance). A task blocked in [`Clock::sleep`]
/// resumes when enough simulated time has passed; it never resumes on its
/// own.
pub struct TestClock {
    state: Mutex<TestClockState>,
}

impl TestClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(TestClockState {
                now: start,
                elapsed: Duration::ZERO,
                sleepers: Vec::new(),
            }),
        }
    }

    /// Moves wall and monotonic time forward by `duration` and completes
    /// every pending sleep whose deadline has been reached.
    pub fn advance(&self, duration: Duration) {
        let ready = {
            let mut state = self.state.lock().unwrap();
            state.now += TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
            state.elapsed += duration;
            let elapsed = state.elapsed;
            let (ready, pending): (Vec<_>, Vec<_>) = state
                .sleepers
                .drain(..)
                .partition(|sleeper| sleeper.due <= elapsed);
            state.sleepers = pending;
            ready
        };
        for sleeper in ready {
            // A dropped receiver just means the sleeper was cancelled.
            let _ = sleeper.waker.send(());
        }
    }

    /// Number of tasks currently blocked in `sleep`.
    pub fn waiter_count(&self) -> usize {
        self.state.lock().unwrap().sleepers.len()
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

#[async_trait]
impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().unwrap().now
    }

    fn monotonic(&self) -> Duration {
        self.state.lock().unwrap().elapsed
    }

    async fn sleep(&self, duration: Duration) {
        if duration == Duration::ZERO {
            return;
        }
        let rx = {
            let mut state = self.state.lock().unwrap();
            let (tx, rx) = oneshot::channel();
            let due = state.elapsed + duration;
            state.sleepers.push(Sleeper { due, waker: tx });
            rx
        };
        // Err means the clock was dropped; treat it as the deadline passing.
        let _ = rx.await;
    }
}
