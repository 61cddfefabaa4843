//! Ledger Client Handle
//!
//! `LedgerRpc` is the narrow RPC surface the orchestrator needs from a remote
//! ledger. `LedgerClient` binds one implementation to one endpoint and is the
//! handle every ledger operation takes. `LedgerConnection` holds the current
//! handle; reconfiguring swaps in a new handle without touching the one an
//! in-flight operation already holds.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use token_types::errors::LedgerError;
use token_types::ids::{HoldingAccountId, Identity, Receipt, RegistryId};
use token_types::ledger::{HoldingAccount, RegistryState};
use tracing::{debug, info};

use crate::agent::SigningAgent;
use crate::http::HttpLedgerRpc;
use crate::instruction::Instruction;
use crate::signing::{now_nanos, NonceSource, SignedMessage};

// ---------------------------------------------------------------------------
// Endpoint configuration
// ---------------------------------------------------------------------------

/// Port the ledger gateway listens on unless configured otherwise.
pub const DEFAULT_GATEWAY_PORT: u16 = 8080;

/// Named ledger gateway deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    /// Gateway on this machine at its default port.
    Localnet,
}

impl Cluster {
    pub fn url(&self) -> &'static str {
        match self {
            Cluster::Localnet => "http://127.0.0.1:8080",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Cluster::Localnet => "localnet",
        }
    }
}

/// Where a ledger client sends its requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerEndpoint {
    Cluster(Cluster),
    Url(String),
}

impl LedgerEndpoint {
    pub fn url(&self) -> &str {
        match self {
            LedgerEndpoint::Cluster(cluster) => cluster.url(),
            LedgerEndpoint::Url(url) => url,
        }
    }
}

impl Default for LedgerEndpoint {
    fn default() -> Self {
        LedgerEndpoint::Cluster(Cluster::Localnet)
    }
}

impl fmt::Display for LedgerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEndpoint::Cluster(cluster) => write!(f, "{}", cluster.name()),
            LedgerEndpoint::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Error parsing an endpoint string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown ledger endpoint {0:?}: expected a cluster name or http(s) URL")]
pub struct EndpointParseError(pub String);

impl FromStr for LedgerEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cluster = match s {
            "localnet" | "localhost" | "local" => Some(Cluster::Localnet),
            _ => None,
        };
        if let Some(cluster) = cluster {
            return Ok(LedgerEndpoint::Cluster(cluster));
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(LedgerEndpoint::Url(s.trim_end_matches('/').to_owned()));
        }
        Err(EndpointParseError(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// RPC surface
// ---------------------------------------------------------------------------

/// Remote ledger operations.
///
/// Mutating calls receive the signing agent as fee payer and authorizer; the
/// implementation asks it to sign the instruction it submits.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn create_registry(
        &self,
        payer: &dyn SigningAgent,
        mint_authority: &Identity,
        freeze_authority: Option<&Identity>,
        decimals: u8,
    ) -> Result<RegistryId, LedgerError>;

    /// Return the owner's canonical holding account, creating it if missing.
    async fn get_or_create_holding_account(
        &self,
        payer: &dyn SigningAgent,
        registry: &RegistryId,
        owner: &Identity,
    ) -> Result<HoldingAccount, LedgerError>;

    async fn mint_to(
        &self,
        payer: &dyn SigningAgent,
        registry: &RegistryId,
        destination: &HoldingAccountId,
        authority: &Identity,
        amount: u64,
    ) -> Result<Receipt, LedgerError>;

    async fn transfer(
        &self,
        payer: &dyn SigningAgent,
        source: &HoldingAccountId,
        destination: &HoldingAccountId,
        authority: &Identity,
        amount: u64,
    ) -> Result<Receipt, LedgerError>;

    async fn get_account(&self, account: &HoldingAccountId) -> Result<HoldingAccount, LedgerError>;

    async fn get_registry(&self, registry: &RegistryId) -> Result<RegistryState, LedgerError>;
}

/// Ask `agent` to sign `instruction` with a fresh nonce.
pub async fn authorize(
    agent: &dyn SigningAgent,
    instruction: &Instruction,
    nonces: &NonceSource,
) -> Result<SignedMessage, LedgerError> {
    authorize_at(agent, instruction, nonces, now_nanos()).await
}

async fn authorize_at(
    agent: &dyn SigningAgent,
    instruction: &Instruction,
    nonces: &NonceSource,
    timestamp: i64,
) -> Result<SignedMessage, LedgerError> {
    let clock = u64::try_from(timestamp).map_err(|_| {
        LedgerError::MalformedInstruction(format!(
            "system clock reads {timestamp} ns, before the unix epoch"
        ))
    })?;
    let nonce = nonces.next(clock);
    let message = instruction.to_message(timestamp, nonce);
    debug!(agent = %agent.name(), action = instruction.action(), nonce, "requesting signature");

    agent
        .sign_message(&message)
        .await
        .map_err(|e| LedgerError::SigningRejected(e.to_string()))
}

// ---------------------------------------------------------------------------
// Client handle
// ---------------------------------------------------------------------------

/// Long-lived handle bound to one ledger endpoint.
///
/// Cheap to clone; clones share the underlying RPC implementation.
#[derive(Clone)]
pub struct LedgerClient {
    endpoint: LedgerEndpoint,
    rpc: Arc<dyn LedgerRpc>,
}

impl LedgerClient {
    pub fn new(endpoint: LedgerEndpoint, rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { endpoint, rpc }
    }

    /// Client speaking HTTP to the ledger gateway at `endpoint`.
    pub fn http(endpoint: LedgerEndpoint) -> Self {
        Self::http_with_nonces(endpoint, Arc::new(NonceSource::new()))
    }

    /// HTTP client drawing nonces from `nonces`.
    pub fn http_with_nonces(endpoint: LedgerEndpoint, nonces: Arc<NonceSource>) -> Self {
        let rpc = HttpLedgerRpc::with_nonces(reqwest::Client::new(), endpoint.url(), nonces);
        Self::new(endpoint, Arc::new(rpc))
    }

    pub fn endpoint(&self) -> &LedgerEndpoint {
        &self.endpoint
    }

    pub fn rpc(&self) -> &dyn LedgerRpc {
        self.rpc.as_ref()
    }
}

impl fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Holder of the current ledger client handle.
///
/// Reconfiguration is last-writer-wins for subsequent calls only. HTTP
/// clients built by the connection share one nonce source, so a signer's
/// nonces keep increasing across reconfigurations.
pub struct LedgerConnection {
    current: watch::Sender<LedgerClient>,
    nonces: Arc<NonceSource>,
}

impl LedgerConnection {
    /// Slot holding an explicit client. Only clients built by
    /// `reconfigure` draw from the connection's nonce source.
    pub fn new(client: LedgerClient) -> Self {
        let (current, _) = watch::channel(client);
        Self {
            current,
            nonces: Arc::new(NonceSource::new()),
        }
    }

    /// Slot holding an HTTP client for `endpoint`.
    pub fn http(endpoint: LedgerEndpoint) -> Self {
        let nonces = Arc::new(NonceSource::new());
        let client = LedgerClient::http_with_nonces(endpoint, nonces.clone());
        let (current, _) = watch::channel(client);
        Self { current, nonces }
    }

    pub fn nonces(&self) -> &Arc<NonceSource> {
        &self.nonces
    }

    /// Snapshot of the current handle.
    pub fn client(&self) -> LedgerClient {
        self.current.borrow().clone()
    }

    pub fn endpoint(&self) -> LedgerEndpoint {
        self.current.borrow().endpoint().clone()
    }

    /// Replace the handle used by subsequent calls.
    pub fn set_client(&self, client: LedgerClient) {
        info!(endpoint = %client.endpoint(), "ledger client reconfigured");
        self.current.send_replace(client);
    }

    /// Point subsequent calls at a new HTTP endpoint.
    pub fn reconfigure(&self, endpoint: LedgerEndpoint) -> LedgerClient {
        let client = LedgerClient::http_with_nonces(endpoint, self.nonces.clone());
        self.set_client(client.clone());
        client
    }

    pub fn subscribe(&self) -> watch::Receiver<LedgerClient> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::LocalKeypairAgent;
    use crate::signing::verify_signature;

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!(
            "localnet".parse::<LedgerEndpoint>().unwrap(),
            LedgerEndpoint::Cluster(Cluster::Localnet)
        );
        assert_eq!(
            "localhost".parse::<LedgerEndpoint>().unwrap(),
            LedgerEndpoint::Cluster(Cluster::Localnet)
        );
        assert!("devnet".parse::<LedgerEndpoint>().is_err());
        assert_eq!(
            "http://127.0.0.1:8080/".parse::<LedgerEndpoint>().unwrap(),
            LedgerEndpoint::Url("http://127.0.0.1:8080".to_owned())
        );
        assert!("ftp://nope".parse::<LedgerEndpoint>().is_err());
    }

    #[test]
    fn test_default_endpoint_is_local_gateway() {
        let endpoint = LedgerEndpoint::default();
        assert_eq!(endpoint.url(), "http://127.0.0.1:8080");
        assert!(endpoint.url().ends_with(&format!(":{DEFAULT_GATEWAY_PORT}")));
        assert_eq!(endpoint.to_string(), "localnet");
    }

    #[test]
    fn test_endpoint_serde_accepts_cluster_or_url() {
        let cluster: LedgerEndpoint = serde_json::from_str("\"localnet\"").unwrap();
        assert_eq!(cluster, LedgerEndpoint::Cluster(Cluster::Localnet));

        let url: LedgerEndpoint = serde_json::from_str("\"http://localhost:9000\"").unwrap();
        assert_eq!(url.url(), "http://localhost:9000");
    }

    #[tokio::test]
    async fn test_reconfigure_keeps_old_handle_intact() {
        let connection = LedgerConnection::new(LedgerClient::http(LedgerEndpoint::default()));
        let in_flight = connection.client();

        let next = "http://127.0.0.1:9999".parse().unwrap();
        connection.reconfigure(next);

        assert_eq!(in_flight.endpoint(), &LedgerEndpoint::default());
        assert_eq!(connection.endpoint().url(), "http://127.0.0.1:9999");
    }

    #[tokio::test]
    async fn test_authorize_produces_verifiable_message() {
        let agent = LocalKeypairAgent::generate("local");
        agent.connect().await.unwrap();
        let nonces = NonceSource::new();
        let instruction = Instruction::CreateHoldingAccount {
            registry: RegistryId::from_bytes([1; 32]),
            owner: agent.identity(),
        };

        let signed = authorize(&agent, &instruction, &nonces).await.unwrap();
        assert_eq!(verify_signature(&signed).unwrap(), agent.identity());
        assert_eq!(Instruction::from_message(&signed.message).unwrap(), instruction);

        let second = authorize(&agent, &instruction, &nonces).await.unwrap();
        assert!(second.message.nonce > signed.message.nonce);
    }

    #[tokio::test]
    async fn test_authorize_rejects_clock_before_epoch() {
        let agent = LocalKeypairAgent::generate("local");
        agent.connect().await.unwrap();
        let nonces = NonceSource::new();
        let instruction = Instruction::CreateRegistry {
            mint_authority: agent.identity(),
            freeze_authority: None,
            decimals: 9,
        };

        let err = authorize_at(&agent, &instruction, &nonces, -1).await.unwrap_err();
        assert!(matches!(err, LedgerError::MalformedInstruction(_)));
        // the failed attempt consumed no nonce
        assert_eq!(nonces.next(0), 1);
    }

    #[tokio::test]
    async fn test_authorize_maps_rejection() {
        let agent = LocalKeypairAgent::generate("local");
        let nonces = NonceSource::new();
        let instruction = Instruction::CreateRegistry {
            mint_authority: agent.identity(),
            freeze_authority: None,
            decimals: 9,
        };

        let err = authorize(&agent, &instruction, &nonces).await.unwrap_err();
        assert!(matches!(err, LedgerError::SigningRejected(_)));
    }
}
