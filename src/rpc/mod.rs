pub mod handlers;
pub mod types;

use axum::{routing::post, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::account::AccountLedger;
use crate::events::MemoryAuditSink;

#[derive(Clone)]
pub struct RpcState {
    pub ledger: Arc<AccountLedger>,
    /// In-process copy of the audit trail served by `getAuditLog`
    pub audit_log: Arc<MemoryAuditSink>,
}

pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/", post(handlers::handle_rpc_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub struct RpcServer {
    state: RpcState,
    bind_addr: String,
}

impl RpcServer {
    pub fn new(ledger: Arc<AccountLedger>, audit_log: Arc<MemoryAuditSink>, port: u16) -> Self {
        Self {
            state: RpcState { ledger, audit_log },
            bind_addr: format!("0.0.0.0:{}", port),
        }
    }

    pub async fn start(self) -> std::io::Result<()> {
        let app = router(self.state);
        let listener = tokio::net::TcpListener::bind(&self.bind_addr).await?;

        info!("RPC server listening on {}", self.bind_addr);
        axum::serve(listener, app).await
    }
}
