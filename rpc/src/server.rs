//! Axum-based RPC server.

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tokio::sync::broadcast;

use keel_chain::SigTx;
use keel_network::RelayHandle;
use keel_store::BlockStore;

use crate::error::RpcError;
use crate::handlers;
use crate::{BalanceChecker, TxApplier};

/// Capabilities and paths shared with every request handler.
#[derive(Clone)]
pub struct RpcState {
    pub key_store_dir: PathBuf,
    pub block_store: BlockStore,
    pub balance_checker: Arc<dyn BalanceChecker>,
    pub tx_applier: Arc<dyn TxApplier>,
    pub tx_relay: RelayHandle<SigTx>,
}

/// The node's HTTP JSON API server.
pub struct RpcServer {
    addr: String,
    state: RpcState,
}

impl RpcServer {
    pub fn new(addr: impl Into<String>, state: RpcState) -> Self {
        Self {
            addr: addr.into(),
            state,
        }
    }

    /// Build the route table over the given state.
    pub fn router(state: RpcState) -> Router {
        Router::new()
            .route("/account/create", post(handlers::account_create))
            .route("/account/balance", post(handlers::account_balance))
            .route("/tx/sign", post(handlers::tx_sign))
            .route("/tx/send", post(handlers::tx_send))
            .route("/tx/search", post(handlers::tx_search))
            .route("/tx/prove", post(handlers::tx_prove))
            .route("/tx/verify", post(handlers::tx_verify))
            .route("/block/search", post(handlers::block_search))
            .with_state(state)
    }

    /// Bind and serve until the shutdown signal fires.
    pub async fn serve(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), RpcError> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| RpcError::Internal(format!("failed to bind {}: {e}", self.addr)))?;
        tracing::info!(addr = %self.addr, "RPC server listening");

        axum::serve(listener, Self::router(self.state))
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("RPC server shutting down");
            })
            .await
            .map_err(|e| RpcError::Internal(e.to_string()))
    }
}
