use thiserror::Error;

/// Errors raised while registering jobs.
///
/// Job execution failures are not errors; they surface as
/// [`crate::JobResult::Failed`] and the continuous runner keeps going.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid cron expression {expression:?}: {source}")]
    InvalidCron {
        expression: String,
        #[source]
        source: cron::error::Error,
    },
}
