//! HTTP server lifecycle: bind, spawn the axum server in a background task,
//! return a handle with a shutdown channel.

use std::net::SocketAddr;

use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ApiServer {
    /// Bind `addr` and serve `app` until [`ApiServer::shutdown`] is called.
    ///
    /// Port 0 binds an ephemeral port; the actual address is in `addr`.
    pub async fn start(app: Router, addr: SocketAddr) -> Result<Self, String> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| format!("Failed to bind API server on {addr}: {e}"))?;

        let addr = listener
            .local_addr()
            .map_err(|e| format!("Failed to get server address: {e}"))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown_signal = async move {
                let _ = shutdown_rx.await;
                tracing::info!("API server received shutdown signal");
            };

            tracing::info!(%addr, "🌐 API server listening");

            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal)
                .await
            {
                tracing::error!("API server error: {e}");
            }

            tracing::info!("API server stopped");
        });

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    /// Ask the server to stop accepting connections and drain.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the server task to finish.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::warn!("API server task ended abnormally: {e}");
        }
    }
}
