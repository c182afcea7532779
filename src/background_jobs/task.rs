use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use crate::server::metrics;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Type-erased task action.
pub type TaskAction =
    Arc<dyn Fn(JobContext) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;

/// A named unit of recurring work.
///
/// Tasks are immutable once registered with a [`JobScheduler`](super::JobScheduler).
#[derive(Clone)]
pub struct Task {
    name: String,
    action: TaskAction,
    period: Duration,
    run_first_immediately: bool,
    quiet: bool,
}

impl Task {
    /// Create a task that waits one `period` before its first invocation.
    pub fn new<F, Fut>(name: impl Into<String>, period: Duration, action: F) -> Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(move |ctx: JobContext| action(ctx).boxed()),
            period,
            run_first_immediately: false,
            quiet: false,
        }
    }

    /// Build a task out of a domain job.
    pub fn from_job(job: Arc<dyn BackgroundJob>) -> Self {
        let name = job.id();
        let period = job.period();
        let run_first_immediately = job.run_first_immediately();
        let quiet = job.quiet();

        Task::new(name, period, move |ctx: JobContext| {
            let job = Arc::clone(&job);
            async move { job.execute(&ctx).await }
        })
        .run_first_immediately(run_first_immediately)
        .quiet(quiet)
    }

    pub fn run_first_immediately(mut self, run_first_immediately: bool) -> Self {
        self.run_first_immediately = run_first_immediately;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn runs_first_immediately(&self) -> bool {
        self.run_first_immediately
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Invoke the action once. A panicking action is reported as a failure.
    async fn invoke(&self, ctx: JobContext) -> Result<(), JobError> {
        let action = Arc::clone(&self.action);
        match AssertUnwindSafe(async move { action(ctx).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(JobError::Panicked(panic_message(panic.as_ref()))),
        }
    }

    async fn run_once(&self, root: &CancellationToken) {
        let ctx = JobContext::new(root.child_token());
        let start_time = Instant::now();
        let result = self.invoke(ctx).await;
        let elapsed = start_time.elapsed();

        let status_label = match result {
            Ok(()) => {
                if !self.quiet {
                    info!("Task {} completed in {:?}", self.name, elapsed);
                }
                "success"
            }
            Err(JobError::Cancelled) => {
                if !self.quiet {
                    info!("Task {} was cancelled after {:?}", self.name, elapsed);
                }
                "cancelled"
            }
            Err(e) => {
                if !self.quiet {
                    error!("Task {} failed after {:?}: {}", self.name, elapsed, e);
                }
                "failed"
            }
        };

        metrics::record_background_job_execution(&self.name, status_label, elapsed);
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("run_first_immediately", &self.run_first_immediately)
            .field("quiet", &self.quiet)
            .finish()
    }
}

/// Execution loop of a single task.
///
/// Invocations are strictly sequential. The stop signal is only observed
/// between invocations, so an in-flight invocation always runs to completion.
/// The loop returning is the completion signal observed by the scheduler.
pub(super) async fn run_loop(task: Task, root: CancellationToken, stop: CancellationToken) {
    metrics::inc_background_job_loops();

    let keep_going = task.run_first_immediately || wait_next_tick(&stop, task.period).await;
    if keep_going {
        loop {
            task.run_once(&root).await;
            if !wait_next_tick(&stop, task.period).await {
                break;
            }
        }
    }

    if !task.quiet {
        info!("Task {} exited", task.name);
    }
    metrics::dec_background_job_loops();
}

/// Race the stop signal against one period. Returns false when stop wins.
async fn wait_next_tick(stop: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        biased;
        _ = stop.cancelled() => false,
        _ = tokio::time::sleep(period) => true,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
