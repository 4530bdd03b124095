//! The job host.

use crate::error::JobError;
use crate::job::{run_continuous, Job, JobResult};
use cron::Schedule;
use foundatio_core::clock::{Clock, SystemClock};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Registration-time attributes of a job.
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub name: String,
    pub description: Option<String>,
    pub interval: Option<Duration>,
    pub iteration_limit: Option<u64>,
    pub instance_count: usize,
    pub cron: Option<String>,
}

impl JobOptions {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: None,
            interval: None,
            iteration_limit: None,
            instance_count: 1,
            cron: None,
        }
    }

    pub fn description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Pause between iterations of a continuous run.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Stop after this many non-cancelled iterations.
    pub fn iteration_limit(mut self, iteration_limit: u64) -> Self {
        self.iteration_limit = Some(iteration_limit);
        self
    }

    /// Number of independent parallel runners sharing the job instance.
    pub fn instance_count(mut self, instance_count: usize) -> Self {
        self.instance_count = instance_count.max(1);
        self
    }

    /// Schedule iterations with a cron expression instead of an interval.
    /// Both 5-field (`min hour dom month dow`) and 6-field (leading
    /// seconds) forms are accepted.
    pub fn cron<S: Into<String>>(mut self, expression: S) -> Self {
        self.cron = Some(expression.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Hosts long-running jobs: spawns their runners, tracks them, and drains
/// them on shutdown.
///
/// Shutdown is cooperative: the shared token is cancelled, no new
/// iterations start, and in-flight iterations finish (or observe the token
/// and report [`JobResult::Cancelled`]).
pub struct JobRunner {
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::default()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            shutdown: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// The token jobs observe; cancelling it is equivalent to `shutdown`
    /// without the drain.
    pub fn cancellation(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawns `instance_count` runners for `job`. Cron-scheduled jobs fire
    /// per schedule; others run continuously paced by `interval`.
    pub fn register(&self, job: Arc<dyn Job>, options: JobOptions) -> Result<(), JobError> {
        let schedule = options
            .cron
            .as_deref()
            .map(parse_cron)
            .transpose()?
            .map(Arc::new);

        for _instance in 0..options.instance_count {
            let job = Arc::clone(&job);
            let clock = Arc::clone(&self.clock);
            let token = self.shutdown.child_token();
            let schedule = schedule.clone();
            let interval = options.interval;
            let iteration_limit = options.iteration_limit;
            #[cfg(feature = "tracing")]
            let job_name = options.name.clone();

            let handle = tokio::spawn(async move {
                #[cfg(feature = "tracing")]
                tracing::debug!(job = %job_name, instance = _instance, "job runner started");

                let _iterations = match schedule {
                    Some(schedule) => {
                        run_cron(job.as_ref(), clock.as_ref(), &schedule, iteration_limit, token)
                            .await
                    }
                    None => {
                        run_continuous(
                            job.as_ref(),
                            clock.as_ref(),
                            interval,
                            iteration_limit,
                            token,
                        )
                        .await
                    }
                };

                #[cfg(feature = "tracing")]
                tracing::debug!(job = %job_name, instance = _instance, iterations = _iterations, "job runner stopped");
            });
            self.handles.lock().unwrap().push(handle);
        }
        Ok(())
    }

    /// Drain and stop: cancels the shared token and waits for every runner
    /// to finish its in-flight iteration.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<_> = {
            let mut guard = self.handles.lock().unwrap();
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Blocks until ctrl-c, then drains.
    pub async fn run_until_ctrl_c(&self) {
        let _ = tokio::signal::ctrl_c().await;
        #[cfg(feature = "tracing")]
        tracing::info!("shutdown signal received, draining jobs");
        self.shutdown().await;
    }
}

/// Fires `job` at each cron occurrence. A clock jump past one or more
/// occurrences triggers a single immediate run.
async fn run_cron(
    job: &dyn Job,
    clock: &dyn Clock,
    schedule: &Schedule,
    iteration_limit: Option<u64>,
    token: CancellationToken,
) -> u64 {
    let mut iterations = 0u64;
    if iteration_limit == Some(0) {
        return iterations;
    }

    loop {
        if token.is_cancelled() {
            break;
        }
        let now = clock.now();
        let Some(next) = schedule.after(&now).next() else {
            break;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = clock.sleep(wait) => {}
            _ = token.cancelled() => break,
        }
        if token.is_cancelled() {
            break;
        }

        let result = job.run(token.clone()).await;
        if result.is_cancelled() {
            break;
        }
        if let JobResult::Failed(_message) = &result {
            #[cfg(feature = "tracing")]
            tracing::warn!(message = %_message, "cron job iteration failed");
        }
        iterations += 1;
        if iteration_limit.is_some_and(|limit| iterations >= limit) {
            break;
        }
    }
    iterations
}

/// Accepts the classic 5-field cron form by prepending a seconds field.
fn parse_cron(expression: &str) -> Result<Schedule, JobError> {
    let normalized = if expression.split_whitespace().count() == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    Schedule::from_str(&normalized).map_err(|source| JobError::InvalidCron {
        expression: expression.to_string(),
        source,
    })
}
