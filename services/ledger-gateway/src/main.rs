use ledger_gateway::{AppState, GatewayConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting Ledger Gateway service");

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        bind = %config.bind,
        tx_burst = config.tx_burst,
        tx_refill_per_sec = config.tx_refill_per_sec,
        "configuration loaded"
    );

    let state = AppState::new(&config);
    let listener = TcpListener::bind(config.bind).await?;
    ledger_gateway::serve(listener, state).await
}
