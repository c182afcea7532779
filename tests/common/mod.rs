//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.

mod log_capture;
mod mock_server;
mod recorder;

#[allow(unused_imports)]
pub use log_capture::LogCapture;
#[allow(unused_imports)]
pub use mock_server::{EventLog, MockServer};
#[allow(unused_imports)]
pub use recorder::InvocationRecorder;

use std::time::{Duration, Instant};

/// Grab a free local port. The listener is dropped right away, so another
/// process could steal it, which is good enough for tests.
#[allow(dead_code)]
pub async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Generous upper bound for "returns promptly" checks on loaded CI machines.
#[allow(dead_code)]
pub const PROMPT: Duration = Duration::from_millis(500);

/// Poll `condition` until it holds, giving up after `timeout`.
#[allow(dead_code)]
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while !condition() {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    true
}
