//! Wallet Core: signing session and registry orchestration
//!
//! Provides the client side of the token workbench:
//! - Signed instruction messages and replay protection
//! - The signing agent boundary and a local keypair agent
//! - Connect/disconnect lifecycle of a signing session
//! - Ledger client handle (in-process or HTTP)
//! - The asset registry session that chains dependent ledger operations
//!
//! # Version
//! v0.1.0

pub mod agent;
pub mod config;
pub mod context;
pub mod http;
pub mod instruction;
pub mod ledger;
pub mod registry;
pub mod session;
pub mod signing;

/// Crate version constant
pub const WALLET_CORE_VERSION: &str = "0.1.0";

pub use agent::{AgentError, LocalKeypairAgent, SigningAgent};
pub use config::{ConfigError, WalletConfig};
pub use context::WalletContext;
pub use ledger::{LedgerClient, LedgerConnection, LedgerEndpoint, LedgerRpc};
pub use registry::{AssetRegistrySession, RegistrySnapshot};
pub use session::{SessionState, SigningSession};
