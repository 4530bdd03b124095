//! Single-shot, rearmable maintenance timer.
//!
//! The cache, message bus and queue each keep one of these armed at their
//! earliest pending deadline (entry expiry, delayed-message due time, lease
//! expiry). Arming an earlier deadline interrupts the current wait; the
//! callback runs outside any component lock and may return the next due
//! time to re-arm the timer.

use crate::clock::Clock;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Async callback invoked when the timer fires. Returning `Some(when)`
/// re-arms the timer for `when`.
pub type MaintenanceCallback =
    Arc<dyn Fn() -> BoxFuture<'static, Option<DateTime<Utc>>> + Send + Sync>;

struct Shared {
    clock: Arc<dyn Clock>,
    next: Mutex<Option<DateTime<Utc>>>,
    rearm: Notify,
}

/// A single-shot timer that always waits for the earliest scheduled instant.
pub struct MaintenanceTimer {
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl MaintenanceTimer {
    /// Spawns the timer task. The timer starts unarmed.
    pub fn new(clock: Arc<dyn Clock>, callback: MaintenanceCallback) -> Self {
        let shared = Arc::new(Shared {
            clock,
            next: Mutex::new(None),
            rearm: Notify::new(),
        });
        let shutdown = CancellationToken::new();

        tokio::spawn(run(Arc::clone(&shared), callback, shutdown.clone()));

        Self { shared, shutdown }
    }

    /// Arms the timer for `when`. If an earlier instant is already armed,
    /// this is a no-op; a later armed instant is replaced.
    pub fn schedule_next(&self, when: DateTime<Utc>) {
        let mut next = self.shared.next.lock().unwrap();
        if matches!(*next, Some(current) if current <= when) {
            return;
        }
        *next = Some(when);
        self.shared.rearm.notify_one();
    }

    /// Arms the timer to fire as soon as possible.
    pub fn schedule_now(&self) {
        self.schedule_next(self.shared.clock.now());
    }

    /// Stops the timer task. Pending callbacks are not interrupted.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for MaintenanceTimer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run(shared: Arc<Shared>, callback: MaintenanceCallback, shutdown: CancellationToken) {
    loop {
        // Read-and-release: the guard must not be held across the waits.
        let due = *shared.next.lock().unwrap();
        let when = match due {
            Some(when) => when,
            None => {
                tokio::select! {
                    _ = shared.rearm.notified() => {}
                    _ = shutdown.cancelled() => return,
                }
                continue;
            }
        };

        let now = shared.clock.now();
        if when > now {
            let wait = (when - now).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = shared.clock.sleep(wait) => {}
                _ = shared.rearm.notified() => {}
                _ = shutdown.cancelled() => return,
            }
            // Re-evaluate: the wait may have been interrupted by an earlier
            // schedule, and the clock may not have reached `when` yet.
            continue;
        }

        {
            let mut next = shared.next.lock().unwrap();
            if *next == Some(when) {
                *next = None;
            }
        }

        if let Some(next_due) = callback().await {
            let mut next = shared.next.lock().unwrap();
            if !matches!(*next, Some(current) if current <= next_due) {
                *next = Some(next_due);
            }
        }
    }
}
