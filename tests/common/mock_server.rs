//! In-memory stand-in for the HTTP listeners.

use async_trait::async_trait;
use forum_server::lifecycle::{RequestServer, ShutdownError};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Ordered log of what the mock server and test tasks did.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

#[allow(dead_code)]
impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn contains(&self, event: &str) -> bool {
        self.position(event).is_some()
    }
}

pub struct MockServer {
    log: EventLog,
    fail_start: bool,
    drain_time: Duration,
}

#[allow(dead_code)]
impl MockServer {
    /// Server whose shutdown takes `drain_time` to finish draining.
    pub fn new(log: EventLog, drain_time: Duration) -> Self {
        Self {
            log,
            fail_start: false,
            drain_time,
        }
    }

    pub fn failing_to_start(log: EventLog) -> Self {
        Self {
            log,
            fail_start: true,
            drain_time: Duration::ZERO,
        }
    }
}

#[async_trait]
impl RequestServer for MockServer {
    async fn start(&mut self) -> anyhow::Result<()> {
        if self.fail_start {
            self.log.push("server:start_failed");
            anyhow::bail!("address already in use");
        }
        self.log.push("server:start");
        Ok(())
    }

    async fn shutdown(
        &mut self,
        deadline: Duration,
        interrupt: &CancellationToken,
    ) -> Result<(), ShutdownError> {
        self.log.push("server:shutdown_begin");
        tokio::select! {
            biased;
            _ = interrupt.cancelled() => {
                self.log.push("server:shutdown_interrupted");
                Err(ShutdownError::Interrupted)
            }
            _ = tokio::time::sleep(self.drain_time) => {
                self.log.push("server:shutdown_done");
                Ok(())
            }
            _ = tokio::time::sleep(deadline) => {
                self.log.push("server:shutdown_timeout");
                Err(ShutdownError::DeadlineExceeded(deadline))
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}
