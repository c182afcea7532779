use super::context::JobContext;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a single task invocation.
///
/// None of these ever stop the task's schedule: the failure is logged and
/// the task runs again at its next tick.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Trait for the domain jobs shipped with the server.
///
/// A job is turned into a scheduler [`Task`](super::Task) with
/// [`Task::from_job`](super::Task::from_job).
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job, used as the task name in logs.
    fn id(&self) -> &'static str;

    /// Description of what this job does.
    fn description(&self) -> &'static str;

    /// Delay between the end of one run and the start of the next.
    fn period(&self) -> Duration;

    /// Whether the first run happens right at start-up instead of after one period.
    fn run_first_immediately(&self) -> bool {
        false
    }

    /// Quiet jobs don't log each run's outcome.
    fn quiet(&self) -> bool {
        false
    }

    /// Execute the job once.
    ///
    /// The implementation should periodically check `ctx.is_cancelled()` for
    /// long-running operations and return early with `JobError::Cancelled` if true.
    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
