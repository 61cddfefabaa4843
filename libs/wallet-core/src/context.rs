//! Wallet context
//!
//! Bundles the pieces a UI collaborator wires together: the ledger connection
//! slot, the signing session and the registry session on top of it. Each
//! registry operation takes the connection's current client at call time.

use std::sync::Arc;

use rust_decimal::Decimal;
use token_types::errors::WalletError;
use token_types::ids::{HoldingAccountId, Identity, Receipt, RegistryId};
use token_types::ledger::RegistryInfo;

use crate::agent::SigningAgent;
use crate::config::WalletConfig;
use crate::ledger::{LedgerClient, LedgerConnection, LedgerEndpoint};
use crate::registry::AssetRegistrySession;
use crate::session::SigningSession;

pub struct WalletContext {
    connection: LedgerConnection,
    signing: Arc<SigningSession>,
    registry: AssetRegistrySession,
}

impl WalletContext {
    /// Context using the HTTP ledger client for `config.endpoint`.
    pub fn from_config(
        config: &WalletConfig,
        agent: Option<Arc<dyn SigningAgent>>,
    ) -> Result<Self, WalletError> {
        let connection = LedgerConnection::http(config.endpoint.clone());
        Self::assemble(connection, agent, config.decimals)
    }

    /// Context bound to an explicit ledger client.
    pub fn with_client(
        client: LedgerClient,
        agent: Option<Arc<dyn SigningAgent>>,
        decimals: u8,
    ) -> Result<Self, WalletError> {
        Self::assemble(LedgerConnection::new(client), agent, decimals)
    }

    fn assemble(
        connection: LedgerConnection,
        agent: Option<Arc<dyn SigningAgent>>,
        decimals: u8,
    ) -> Result<Self, WalletError> {
        let signing = Arc::new(SigningSession::new(agent));
        let registry = AssetRegistrySession::new(signing.clone(), decimals)?;
        Ok(Self {
            connection,
            signing,
            registry,
        })
    }

    pub fn connection(&self) -> &LedgerConnection {
        &self.connection
    }

    pub fn signing(&self) -> &SigningSession {
        &self.signing
    }

    pub fn registry(&self) -> &AssetRegistrySession {
        &self.registry
    }

    pub async fn connect(&self) -> Result<Identity, WalletError> {
        self.signing.connect().await
    }

    pub async fn disconnect(&self) -> Result<(), WalletError> {
        self.signing.disconnect().await
    }

    /// Point subsequent operations at another HTTP endpoint.
    pub fn reconfigure(&self, endpoint: LedgerEndpoint) {
        self.connection.reconfigure(endpoint);
    }

    pub async fn create_registry(&self) -> Result<RegistryId, WalletError> {
        self.registry.create_registry(&self.connection.client()).await
    }

    pub async fn create_holding_account(&self) -> Result<HoldingAccountId, WalletError> {
        self.registry
            .create_holding_account(&self.connection.client())
            .await
    }

    pub async fn mint(&self, amount: f64) -> Result<Receipt, WalletError> {
        self.registry.mint(&self.connection.client(), amount).await
    }

    pub async fn transfer(&self, destination: &Identity, amount: f64) -> Result<Receipt, WalletError> {
        self.registry
            .transfer(&self.connection.client(), destination, amount)
            .await
    }

    pub async fn get_balance(&self) -> Result<Decimal, WalletError> {
        self.registry.get_balance(&self.connection.client()).await
    }

    pub async fn get_registry_info(&self) -> Result<RegistryInfo, WalletError> {
        self.registry
            .get_registry_info(&self.connection.client())
            .await
    }
}

impl std::fmt::Debug for WalletContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletContext")
            .field("endpoint", &self.connection.endpoint())
            .field("signing", &self.signing)
            .field("registry", &self.registry)
            .finish()
    }
}
