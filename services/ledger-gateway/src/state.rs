use crate::config::GatewayConfig;
use crate::rate_limit::RateLimiter;
use ledger_sim::InMemoryLedger;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<InMemoryLedger>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: &GatewayConfig) -> Self {
        Self::with_ledger(Arc::new(InMemoryLedger::new()), config)
    }

    pub fn with_ledger(ledger: Arc<InMemoryLedger>, config: &GatewayConfig) -> Self {
        Self {
            ledger,
            rate_limiter: Arc::new(RateLimiter::new(config.tx_burst, config.tx_refill_per_sec)),
        }
    }
}
