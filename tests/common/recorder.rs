//! Task actions that record when and how they were invoked.

use forum_server::background_jobs::{JobContext, JobError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
pub struct InvocationRecorder {
    starts: Arc<Mutex<Vec<Instant>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl InvocationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action that records its start and then works for `work`.
    pub fn action(
        &self,
        work: Duration,
    ) -> impl Fn(JobContext) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync + 'static
    {
        self.action_with_result(work, || Ok(()))
    }

    /// Action that always fails after recording its start.
    pub fn failing_action(
        &self,
    ) -> impl Fn(JobContext) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync + 'static
    {
        self.action_with_result(Duration::ZERO, || {
            Err(JobError::ExecutionFailed("always fails".to_string()))
        })
    }

    fn action_with_result<R>(
        &self,
        work: Duration,
        result: R,
    ) -> impl Fn(JobContext) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync + 'static
    where
        R: Fn() -> Result<(), JobError> + Send + Sync + Clone + 'static,
    {
        let recorder = self.clone();
        move |_ctx: JobContext| {
            let recorder = recorder.clone();
            let result = result.clone();
            async move {
                recorder.enter();
                if !work.is_zero() {
                    tokio::time::sleep(work).await;
                }
                recorder.exit();
                result()
            }
            .boxed()
        }
    }

    fn enter(&self) {
        self.starts.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.starts.lock().unwrap().len()
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }

    pub fn first_start(&self) -> Option<Instant> {
        self.starts.lock().unwrap().first().copied()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}
