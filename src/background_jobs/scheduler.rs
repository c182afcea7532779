use super::context::JobContext;
use super::job::{BackgroundJob, JobError};
use super::task::{run_loop, Task};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors reported by the scheduler itself, never by individual tasks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler was already started")]
    AlreadyStarted,

    #[error("Scheduler did not stop within {0:?}, running tasks were cancelled")]
    DeadlineExceeded(Duration),

    #[error("Scheduler stop was interrupted, running tasks were cancelled")]
    Interrupted,
}

/// Runs a fixed set of periodic tasks, one loop per task.
///
/// Tasks are registered before [`start`](Self::start). Each loop waits for
/// the stop signal or its period, whichever comes first, so a
/// [`stop`](Self::stop) lets every in-flight invocation finish before the
/// loop exits. When the stop deadline expires first, the root token is
/// cancelled and the remaining loops are left to wind down on their own.
pub struct JobScheduler {
    /// Registered tasks, in registration order.
    tasks: Vec<Task>,

    /// Root scope of every invocation context. Cancelled only on forced stop.
    root_token: CancellationToken,

    /// Graceful stop signal observed by the loops between invocations.
    stop_token: CancellationToken,

    /// Completion handle of each running loop.
    running_handles: Vec<(String, JoinHandle<()>)>,

    started: bool,
}

impl JobScheduler {
    /// Create a scheduler whose root scope is derived from `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            tasks: Vec::new(),
            root_token: parent.child_token(),
            stop_token: CancellationToken::new(),
            running_handles: Vec::new(),
            started: false,
        }
    }

    /// Register a task from its parts.
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        period: Duration,
        run_first_immediately: bool,
        action: F,
    ) -> Result<(), SchedulerError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.register_task(
            Task::new(name, period, action).run_first_immediately(run_first_immediately),
        )
    }

    /// Register a domain job.
    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) -> Result<(), SchedulerError> {
        debug!("Registering job: {} - {}", job.id(), job.description());
        self.register_task(Task::from_job(job))
    }

    /// Register a task. Only allowed before the scheduler is started.
    pub fn register_task(&mut self, task: Task) -> Result<(), SchedulerError> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }

        info!(
            "Registering task: {} (every {:?}, first run {})",
            task.name(),
            task.period(),
            if task.runs_first_immediately() {
                "immediately"
            } else {
                "after one period"
            }
        );
        self.tasks.push(task);
        Ok(())
    }

    /// Get the number of registered tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether loops were started and not yet collected by a stop.
    pub fn is_running(&self) -> bool {
        !self.running_handles.is_empty()
    }

    /// Number of loops started and not yet collected by a stop.
    pub fn running_task_count(&self) -> usize {
        self.running_handles.len()
    }

    /// Root token shared by all invocation contexts.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.root_token.clone()
    }

    /// Spawn one loop per registered task and return right away.
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.started = true;

        info!(
            "Starting job scheduler with {} registered tasks",
            self.tasks.len()
        );

        for task in &self.tasks {
            let name = task.name().to_string();
            let handle = tokio::spawn(run_loop(
                task.clone(),
                self.root_token.clone(),
                self.stop_token.clone(),
            ));
            info!("Started task: {}", name);
            self.running_handles.push((name, handle));
        }

        Ok(())
    }

    /// Stop all loops, waiting at most `deadline` for them to finish.
    pub async fn stop(&mut self, deadline: Duration) -> Result<(), SchedulerError> {
        self.stop_interruptible(deadline, &CancellationToken::new())
            .await
    }

    /// Like [`stop`](Self::stop), but gives up as soon as `interrupt` is
    /// cancelled, forcing cancellation of the running invocations.
    pub async fn stop_interruptible(
        &mut self,
        deadline: Duration,
        interrupt: &CancellationToken,
    ) -> Result<(), SchedulerError> {
        info!(
            "Stopping job scheduler, waiting up to {:?} for {} tasks...",
            deadline,
            self.running_handles.len()
        );

        self.stop_token.cancel();

        let waits = std::mem::take(&mut self.running_handles)
            .into_iter()
            .map(|(name, handle)| async move {
                if let Err(e) = handle.await {
                    error!("Task {} loop terminated abnormally: {}", name, e);
                }
            });
        let all_stopped = join_all(waits);

        tokio::select! {
            biased;
            _ = all_stopped => {
                info!("All scheduled tasks stopped");
                Ok(())
            }
            _ = tokio::time::sleep(deadline) => {
                warn!(
                    "Scheduled tasks did not stop within {:?}, cancelling in-flight invocations",
                    deadline
                );
                self.root_token.cancel();
                Err(SchedulerError::DeadlineExceeded(deadline))
            }
            _ = interrupt.cancelled() => {
                warn!("Scheduler stop interrupted, cancelling in-flight invocations");
                self.root_token.cancel();
                Err(SchedulerError::Interrupted)
            }
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.stop_token.cancel();
    }
}
