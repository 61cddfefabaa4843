//! HTTP ledger client
//!
//! Speaks JSON to the ledger gateway. Mutating calls are signed by the payer
//! agent and posted as `SignedMessage`s; reads are plain GETs.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use token_types::errors::LedgerError;
use token_types::ids::{HoldingAccountId, Identity, Receipt, RegistryId};
use token_types::ledger::{HoldingAccount, RegistryState, TxOutcome};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::agent::SigningAgent;
use crate::instruction::Instruction;
use crate::ledger::{authorize, LedgerRpc};
use crate::signing::{NonceSource, SignedMessage};

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Error body returned by the gateway.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: LedgerError,
}

pub struct HttpLedgerRpc {
    http_client: Client,
    base_url: String,
    nonces: Arc<NonceSource>,
}

impl HttpLedgerRpc {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        Self::with_nonces(http_client, base_url, Arc::new(NonceSource::new()))
    }

    /// Client drawing nonces from a source shared with other clients.
    pub fn with_nonces(
        http_client: Client,
        base_url: impl Into<String>,
        nonces: Arc<NonceSource>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            nonces,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, LedgerError> {
        let request_id = Uuid::now_v7();
        let res = request
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .send()
            .await
            .map_err(|e| LedgerError::Transport(format!("ledger request failed: {e}")))?;

        if !res.status().is_success() {
            return Err(Self::error_from(res, request_id).await);
        }

        res.json::<T>()
            .await
            .map_err(|e| LedgerError::Transport(format!("invalid ledger response: {e}")))
    }

    async fn error_from(res: Response, request_id: Uuid) -> LedgerError {
        let status = res.status();
        match res.json::<ErrorBody>().await {
            Ok(body) => {
                debug!(%request_id, %status, error = %body.error, "ledger rejected request");
                body.error
            }
            Err(_) => {
                warn!(%request_id, %status, "ledger returned an unreadable error");
                LedgerError::Transport(format!("ledger responded with {status}"))
            }
        }
    }

    async fn submit(
        &self,
        payer: &dyn SigningAgent,
        instruction: Instruction,
    ) -> Result<TxOutcome, LedgerError> {
        let signed: SignedMessage = authorize(payer, &instruction, &self.nonces).await?;
        self.send(self.http_client.post(self.url("/transactions")).json(&signed))
            .await
    }

    async fn find_holding_account(
        &self,
        registry: &RegistryId,
        owner: &Identity,
    ) -> Result<HoldingAccount, LedgerError> {
        let path = format!("/registries/{registry}/holders/{owner}");
        self.send(self.http_client.get(self.url(&path))).await
    }
}

fn unexpected(outcome: &TxOutcome) -> LedgerError {
    LedgerError::Transport(format!("unexpected transaction outcome: {outcome:?}"))
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn create_registry(
        &self,
        payer: &dyn SigningAgent,
        mint_authority: &Identity,
        freeze_authority: Option<&Identity>,
        decimals: u8,
    ) -> Result<RegistryId, LedgerError> {
        let instruction = Instruction::CreateRegistry {
            mint_authority: *mint_authority,
            freeze_authority: freeze_authority.copied(),
            decimals,
        };
        match self.submit(payer, instruction).await? {
            TxOutcome::RegistryCreated { registry, .. } => Ok(registry),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_or_create_holding_account(
        &self,
        payer: &dyn SigningAgent,
        registry: &RegistryId,
        owner: &Identity,
    ) -> Result<HoldingAccount, LedgerError> {
        match self.find_holding_account(registry, owner).await {
            Ok(account) => return Ok(account),
            Err(LedgerError::AccountNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let instruction = Instruction::CreateHoldingAccount {
            registry: *registry,
            owner: *owner,
        };
        match self.submit(payer, instruction).await? {
            TxOutcome::HoldingAccountCreated { account, .. } => Ok(account),
            other => Err(unexpected(&other)),
        }
    }

    async fn mint_to(
        &self,
        payer: &dyn SigningAgent,
        registry: &RegistryId,
        destination: &HoldingAccountId,
        authority: &Identity,
        amount: u64,
    ) -> Result<Receipt, LedgerError> {
        let instruction = Instruction::MintTo {
            registry: *registry,
            destination: *destination,
            authority: *authority,
            amount,
        };
        match self.submit(payer, instruction).await? {
            TxOutcome::Minted { receipt, .. } => Ok(receipt),
            other => Err(unexpected(&other)),
        }
    }

    async fn transfer(
        &self,
        payer: &dyn SigningAgent,
        source: &HoldingAccountId,
        destination: &HoldingAccountId,
        authority: &Identity,
        amount: u64,
    ) -> Result<Receipt, LedgerError> {
        let instruction = Instruction::Transfer {
            source: *source,
            destination: *destination,
            authority: *authority,
            amount,
        };
        match self.submit(payer, instruction).await? {
            TxOutcome::Transferred { receipt, .. } => Ok(receipt),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_account(&self, account: &HoldingAccountId) -> Result<HoldingAccount, LedgerError> {
        let path = format!("/accounts/{account}");
        self.send(self.http_client.get(self.url(&path))).await
    }

    async fn get_registry(&self, registry: &RegistryId) -> Result<RegistryState, LedgerError> {
        let path = format!("/registries/{registry}");
        self.send(self.http_client.get(self.url(&path))).await
    }
}
