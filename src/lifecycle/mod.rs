//! Process lifecycle: start-up order, termination handling and the ordered,
//! bounded shutdown of listeners and scheduled tasks.
//!
//! The [`Program`] walks a linear [`LifecycleState`] sequence. It reads
//! [`LifecycleEvent`]s from a channel rather than OS signals directly, so
//! the whole sequence can be driven from tests; [`os_signals`] feeds the
//! channel in production.

mod bootstrap;
pub mod os_signals;

pub use bootstrap::build_program;

use crate::background_jobs::JobScheduler;
use crate::config::LifecycleSettings;
use crate::store::ForumStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    DatabaseOpen,
    ListenersStarted,
    SchedulerStarted,
    Running,
    ShutdownSignalReceived,
    ListenersStopping,
    SchedulerStopping,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Termination requested (SIGINT, SIGTERM, SIGQUIT or Ctrl-C).
    Terminate,
}

/// How the shutdown sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every phase finished within its deadline.
    Graceful,
    /// At least one phase timed out or was interrupted by a second signal.
    Forced,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("Listeners did not stop within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Listener shutdown was interrupted")]
    Interrupted,

    #[error("Listener failed: {0}")]
    Transport(String),
}

/// The request-serving side of the process.
#[async_trait]
pub trait RequestServer: Send {
    /// Bind and start serving. Returns once the listeners accept connections.
    async fn start(&mut self) -> Result<()>;

    /// Stop accepting connections and drain in-flight requests.
    ///
    /// Gives up after `deadline`, or as soon as `interrupt` is cancelled,
    /// terminating whatever is still running.
    async fn shutdown(
        &mut self,
        deadline: Duration,
        interrupt: &CancellationToken,
    ) -> Result<(), ShutdownError>;

    /// Address of the primary listener once started.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Lifecycle coordinator of the forum server process.
pub struct Program<S: RequestServer> {
    server: S,
    scheduler: JobScheduler,
    store: Arc<dyn ForumStore>,
    dsn: String,
    settings: LifecycleSettings,
    history: Vec<LifecycleState>,
}

impl<S: RequestServer> Program<S> {
    /// Assemble a program around an opened store.
    ///
    /// The program only reaches [`LifecycleState::DatabaseOpen`] once the
    /// store has answered a query.
    pub fn with_components(
        server: S,
        scheduler: JobScheduler,
        store: Arc<dyn ForumStore>,
        dsn: impl Into<String>,
        settings: LifecycleSettings,
    ) -> Result<Self> {
        let mut program = Self {
            server,
            scheduler,
            store,
            dsn: dsn.into(),
            settings,
            history: vec![LifecycleState::Created],
        };

        let posts = program
            .store
            .count_posts()
            .with_context(|| format!("Database {} is not usable", program.dsn))?;
        debug!("Database {} holds {} posts", program.dsn, posts);
        program.transition(LifecycleState::DatabaseOpen);

        Ok(program)
    }

    pub fn state(&self) -> LifecycleState {
        self.history
            .last()
            .copied()
            .unwrap_or(LifecycleState::Created)
    }

    /// Every state visited so far, in order.
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn store(&self) -> Arc<dyn ForumStore> {
        self.store.clone()
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!("Lifecycle: {:?} -> {:?}", self.state(), next);
        self.history.push(next);
    }

    /// Run until a termination event arrives, then shut down in order.
    ///
    /// Start-up failures are returned as errors. Shutdown timeouts are not:
    /// they are logged and reported through [`ShutdownOutcome::Forced`].
    pub async fn serve(
        &mut self,
        mut events: mpsc::Receiver<LifecycleEvent>,
    ) -> Result<ShutdownOutcome> {
        self.server
            .start()
            .await
            .context("Failed to start listeners")?;
        self.transition(LifecycleState::ListenersStarted);
        if let Some(addr) = self.server.local_addr() {
            info!("Listening on {}", addr);
        }

        // Events received meanwhile stay queued in the channel
        tokio::time::sleep(self.settings.scheduler_start_delay).await;
        self.scheduler
            .start()
            .context("Failed to start job scheduler")?;
        self.transition(LifecycleState::SchedulerStarted);

        self.transition(LifecycleState::Running);
        info!("Forum server running on database {}", self.dsn);

        match events.recv().await {
            Some(LifecycleEvent::Terminate) => info!("Termination requested, shutting down..."),
            None => warn!("Lifecycle event source closed, shutting down..."),
        }
        self.transition(LifecycleState::ShutdownSignalReceived);

        // A further termination event cuts both shutdown phases short
        let interrupt = CancellationToken::new();
        let forwarder = tokio::spawn(interrupt_on_next_event(events, interrupt.clone()));

        let mut forced = false;

        self.transition(LifecycleState::ListenersStopping);
        match self
            .server
            .shutdown(self.settings.listener_timeout, &interrupt)
            .await
        {
            Ok(()) => info!("Listeners stopped"),
            Err(e @ ShutdownError::Transport(_)) => error!("{}", e),
            Err(e) => {
                warn!("{}", e);
                forced = true;
            }
        }

        self.transition(LifecycleState::SchedulerStopping);
        if let Err(e) = self
            .scheduler
            .stop_interruptible(self.settings.scheduler_timeout, &interrupt)
            .await
        {
            warn!("{}", e);
            forced = true;
        }

        forwarder.abort();
        self.transition(LifecycleState::Terminated);

        if forced {
            warn!("Forum server forcefully exited");
            Ok(ShutdownOutcome::Forced)
        } else {
            info!("Forum server stopped gracefully");
            Ok(ShutdownOutcome::Graceful)
        }
    }
}

async fn interrupt_on_next_event(
    mut events: mpsc::Receiver<LifecycleEvent>,
    interrupt: CancellationToken,
) {
    if events.recv().await.is_some() {
        warn!("Second termination request received, forcing shutdown");
        interrupt.cancel();
    }
}
