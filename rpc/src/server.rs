//! Axum server wiring.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use ember_node::Node;

use crate::{handlers, RpcError};

/// The HTTP query surface for one node.
pub struct RpcServer {
    node: Arc<Node>,
    bind_addr: String,
}

impl RpcServer {
    pub fn new(node: Arc<Node>, bind_addr: impl Into<String>) -> Self {
        Self {
            node,
            bind_addr: bind_addr.into(),
        }
    }

    fn router(node: Arc<Node>) -> Router {
        Router::new()
            .route("/chain", get(handlers::get_chain))
            .route("/chain/height", get(handlers::get_height))
            .route("/state_root", get(handlers::get_state_root))
            .route("/balance/:address", get(handlers::get_balance))
            .route("/mempool", get(handlers::get_mempool))
            .route("/transaction", post(handlers::submit_transaction))
            .route("/mine", post(handlers::mine))
            .route("/faucet", post(handlers::faucet))
            .with_state(node)
    }

    /// Bind and serve until shutdown fires. Returns the bound address and
    /// the serve-task handle; bind failure is fatal to startup.
    pub async fn start(
        self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(std::net::SocketAddr, JoinHandle<()>), RpcError> {
        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .map_err(RpcError::Bind)?;
        let local_addr = listener.local_addr().map_err(RpcError::Bind)?;
        tracing::info!(addr = %local_addr, "rpc listening");

        let router = Self::router(self.node);
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.recv().await;
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::warn!(error = %e, "rpc server stopped with error");
            }
        });

        Ok((local_addr, handle))
    }
}
