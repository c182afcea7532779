//! Forwards OS termination signals to the lifecycle event channel.
//!
//! On Unix SIGINT, SIGTERM and SIGQUIT are handled; elsewhere only Ctrl-C.
//! Every signal is forwarded, so a second one reaches the coordinator while
//! it is shutting down.

use super::LifecycleEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Spawn the forwarder. It runs until the receiving side is dropped.
#[cfg(unix)]
pub fn spawn_signal_forwarder(
    sender: mpsc::Sender<LifecycleEvent>,
) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
                _ = sigquit.recv() => "SIGQUIT",
            };
            info!("Received {}", name);
            if sender.send(LifecycleEvent::Terminate).await.is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_forwarder(
    sender: mpsc::Sender<LifecycleEvent>,
) -> std::io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            if sender.send(LifecycleEvent::Terminate).await.is_err() {
                break;
            }
        }
    }))
}
