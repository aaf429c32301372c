//! Proxy callback receiver.
//!
//! When a validation request carries a `pgtUrl`, the authority calls that URL
//! with `pgtIou` and `pgtId` query parameters before (or while) answering the
//! validation itself. This module is the receiving end: it records the pair in
//! the [`CorrelationStore`] for the validator to resolve.
//!
//! [`ProxyCallbackReceiver::router`] yields an axum `Router` to mount in the
//! host application. [`CallbackServer`] runs that router on its own listener
//! for applications without an HTTP server of their own.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tokio::{sync::oneshot, task::JoinHandle};
use url::Url;

use crate::store::CorrelationStore;
use crate::{Error, Result, ticket_hint};

/// Query parameters sent by the authority.
#[derive(Debug, Deserialize)]
struct CallbackParams {
    #[serde(rename = "pgtIou")]
    pgt_iou: Option<String>,
    #[serde(rename = "pgtId")]
    pgt_id: Option<String>,
}

/// Inbound half of the PGT correlation bridge.
#[derive(Debug, Clone)]
pub struct ProxyCallbackReceiver {
    store: Arc<CorrelationStore>,
}

impl ProxyCallbackReceiver {
    pub fn new(store: Arc<CorrelationStore>) -> Self {
        Self { store }
    }

    /// Record one callback delivery.
    ///
    /// Both values are required. Repeated deliveries for the same IOU
    /// overwrite the earlier one.
    pub fn handle(&self, pgt_iou: &str, pgt_id: &str) -> Result<()> {
        if pgt_iou.is_empty() {
            return Err(Error::PreconditionFailed("pgtIou"));
        }
        if pgt_id.is_empty() {
            return Err(Error::PreconditionFailed("pgtId"));
        }
        self.store.put(pgt_iou, pgt_id);
        tracing::info!(iou = %ticket_hint(pgt_iou), "Received proxy-granting ticket callback");
        Ok(())
    }

    /// Router serving the callback at `path`.
    ///
    /// `path` may also be a full URL, in which case only its path is routed.
    /// GET and POST are both accepted; parameters are read from the query.
    pub fn router(&self, path: &str) -> Router {
        Router::new()
            .route(
                &route_path(path),
                get(handle_callback).post(handle_callback),
            )
            .with_state(self.clone())
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }
}

/// The path component of a configured callback location.
fn route_path(configured: &str) -> String {
    match Url::parse(configured) {
        Ok(url) => url.path().to_string(),
        Err(_) if configured.starts_with('/') => configured.to_string(),
        Err(_) => format!("/{configured}"),
    }
}

/// Handler for the proxy callback route.
async fn handle_callback(
    State(receiver): State<ProxyCallbackReceiver>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, &'static str) {
    let pgt_iou = params.pgt_iou.unwrap_or_default();
    let pgt_id = params.pgt_id.unwrap_or_default();
    match receiver.handle(&pgt_iou, &pgt_id) {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!("Rejected proxy callback: {e}");
            (StatusCode::BAD_REQUEST, "missing pgtIou or pgtId")
        }
    }
}

/// A standalone listener for a callback router.
#[derive(Debug, Default)]
pub struct CallbackServer {
    shutdown: Option<oneshot::Sender<()>>,
    address: Option<SocketAddr>,
    task: Option<JoinHandle<()>>,
}

impl CallbackServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `addr` (port 0 picks a free port) and serve `router` on it.
    ///
    /// Returns the address actually bound.
    pub async fn start(&mut self, addr: &str, router: Router) -> Result<SocketAddr> {
        if let Some(address) = self.address {
            return Err(Error::ServerAlreadyRunning {
                address: address.to_string(),
            });
        }

        let socket_addr: SocketAddr = addr.parse().map_err(|e| Error::ServerBind {
            address: addr.to_string(),
            reason: format!("Invalid address: {e}"),
        })?;
        let listener = tokio::net::TcpListener::bind(socket_addr)
            .await
            .map_err(|e| Error::ServerBind {
                address: addr.to_string(),
                reason: e.to_string(),
            })?;
        let actual_addr = listener.local_addr().map_err(|e| Error::ServerBind {
            address: addr.to_string(),
            reason: format!("Failed to get local address: {e}"),
        })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!("Callback server failed: {e}");
            }
        });

        tracing::info!(address = %actual_addr, "Proxy callback server listening");
        self.shutdown = Some(shutdown_tx);
        self.address = Some(actual_addr);
        self.task = Some(task);
        Ok(actual_addr)
    }

    /// Stop serving and wait for the server task to finish.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(address) = self.address.take() else {
            return Err(Error::ServerNotRunning);
        };
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        tracing::info!(address = %address, "Proxy callback server stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.address.is_some()
    }

    /// The bound address, if running.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.address.ok_or(Error::ServerNotRunning)
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
