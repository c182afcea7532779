//! Network listeners of the forum server.
//!
//! The primary listener serves the application router, over TLS when
//! certificates are configured. When HTTPS is served on port 443 a second,
//! plain HTTP listener on port 80 redirects every request to HTTPS.

use super::ServerConfig;
use crate::lifecycle::{RequestServer, ShutdownError};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use axum::{
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use futures::future::join_all;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type ListenerTask = (&'static str, JoinHandle<std::io::Result<()>>);

pub struct HttpServer {
    config: ServerConfig,
    app: Router,
    graceful: CancellationToken,
    tls_handle: Option<axum_server::Handle>,
    listeners: Vec<ListenerTask>,
    local_addr: Option<SocketAddr>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, app: Router) -> Self {
        Self {
            config,
            app,
            graceful: CancellationToken::new(),
            tls_handle: None,
            listeners: Vec::new(),
            local_addr: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of listener tasks currently owned by the server.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    async fn start_primary(&mut self) -> Result<()> {
        let address = self.config.listen_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        let app = self.app.clone();
        let task = match &self.config.ssl {
            Some(ssl) => {
                let rustls_config = RustlsConfig::from_pem_file(&ssl.cert_path, &ssl.key_path)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to load TLS material from {:?} and {:?}",
                            ssl.cert_path, ssl.key_path
                        )
                    })?;
                let handle = axum_server::Handle::new();
                self.tls_handle = Some(handle.clone());
                let server = axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                    .handle(handle);
                info!("Serving HTTPS on {}", local_addr);
                tokio::spawn(async move { server.serve(app.into_make_service()).await })
            }
            None => {
                let signal = self.graceful.clone().cancelled_owned();
                info!("Serving HTTP on {}", local_addr);
                tokio::spawn(async move {
                    axum::serve(listener, app)
                        .with_graceful_shutdown(signal)
                        .await
                })
            }
        };
        self.listeners.push(("primary", task));
        Ok(())
    }

    /// The redirect listener is a convenience, failing to bind it is not fatal.
    async fn start_redirect(&mut self, address: String) {
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!(
                    "Failed to bind HTTP redirect listener on {}: {}",
                    address, e
                );
                return;
            }
        };

        let signal = self.graceful.clone().cancelled_owned();
        info!("Redirecting HTTP to HTTPS on {}", address);
        let task = tokio::spawn(async move {
            axum::serve(listener, make_redirect_app())
                .with_graceful_shutdown(signal)
                .await
        });
        self.listeners.push(("redirect", task));
    }

    fn abort_listeners(&self, aborts: &[tokio::task::AbortHandle]) {
        if let Some(handle) = &self.tls_handle {
            handle.shutdown();
        }
        for abort in aborts {
            abort.abort();
        }
    }
}

#[async_trait]
impl RequestServer for HttpServer {
    async fn start(&mut self) -> Result<()> {
        if !self.listeners.is_empty() {
            bail!("Listeners already started");
        }

        self.start_primary().await?;
        if let Some(address) = self.config.redirect_address() {
            self.start_redirect(address).await;
        }
        Ok(())
    }

    async fn shutdown(
        &mut self,
        deadline: Duration,
        interrupt: &CancellationToken,
    ) -> Result<(), ShutdownError> {
        info!(
            "Stopping {} listeners, waiting up to {:?} for in-flight requests...",
            self.listeners.len(),
            deadline
        );

        self.graceful.cancel();
        if let Some(handle) = &self.tls_handle {
            handle.graceful_shutdown(Some(deadline));
        }

        let listeners = std::mem::take(&mut self.listeners);
        let aborts: Vec<_> = listeners.iter().map(|(_, h)| h.abort_handle()).collect();
        let waits = listeners.into_iter().map(|(name, handle)| async move {
            match handle.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{} listener: {}", name, e)),
                Err(e) => Some(format!("{} listener task: {}", name, e)),
            }
        });

        tokio::select! {
            biased;
            results = join_all(waits) => {
                let failures: Vec<String> = results.into_iter().flatten().collect();
                if failures.is_empty() {
                    Ok(())
                } else {
                    Err(ShutdownError::Transport(failures.join("; ")))
                }
            }
            _ = tokio::time::sleep(deadline) => {
                self.abort_listeners(&aborts);
                Err(ShutdownError::DeadlineExceeded(deadline))
            }
            _ = interrupt.cancelled() => {
                self.abort_listeners(&aborts);
                Err(ShutdownError::Interrupted)
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// Router answering every request with a permanent redirect to HTTPS.
pub fn make_redirect_app() -> Router {
    Router::new().fallback(redirect_to_https)
}

async fn redirect_to_https(headers: HeaderMap, uri: Uri) -> Response {
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => Redirect::permanent(&https_location(host, &uri)).into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// HTTPS URL for `uri` on `host`, dropping any port from the host.
pub fn https_location(host: &str, uri: &Uri) -> String {
    let host = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.split_once(':').map_or(host, |(name, _)| name)
    };
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("https://{}{}", host, path)
}
