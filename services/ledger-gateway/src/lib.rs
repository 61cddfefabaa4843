//! Ledger Gateway
//!
//! HTTP front for the in-memory ledger. Accepts signed instructions and
//! answers registry and holding-account queries; errors carry the ledger
//! error code so HTTP clients see the same failures as in-process ones.

pub mod config;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod router;
pub mod state;

use std::net::SocketAddr;
use tokio::net::TcpListener;

pub use config::GatewayConfig;
pub use router::create_router;
pub use state::AppState;

/// Serve `state` on an already-bound listener until the process stops.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), anyhow::Error> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
