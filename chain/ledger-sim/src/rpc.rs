//! In-process ledger endpoint
//!
//! Wraps a `Ledger` behind an async mutex and implements `LedgerRpc` so a
//! registry session can run against it without a network. Tests can inject
//! a failure for the next call of a method and read per-method call counts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use token_types::errors::LedgerError;
use token_types::ids::{HoldingAccountId, Identity, Receipt, RegistryId};
use token_types::ledger::{HoldingAccount, RegistryState, TxOutcome};
use tracing::{debug, warn};
use wallet_core::agent::SigningAgent;
use wallet_core::instruction::Instruction;
use wallet_core::ledger::{authorize, LedgerClient, LedgerEndpoint, LedgerRpc};
use wallet_core::signing::{now_nanos, NonceSource, SignedMessage};

use crate::events::EventRecord;
use crate::ledger::Ledger;

/// Endpoint name reported by in-process clients.
pub const IN_MEMORY_ENDPOINT: &str = "http://in-memory.ledger";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcMethod {
    CreateRegistry,
    GetOrCreateHoldingAccount,
    MintTo,
    Transfer,
    GetAccount,
    GetRegistry,
}

#[derive(Debug, Default)]
struct Faults {
    pending: HashMap<RpcMethod, LedgerError>,
    calls: HashMap<RpcMethod, u64>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<Ledger>,
    nonces: NonceSource,
    faults: StdMutex<Faults>,
    latency: StdMutex<Option<Duration>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared ledger plus a client bound to it.
    pub fn client(self: &Arc<Self>) -> LedgerClient {
        LedgerClient::new(
            LedgerEndpoint::Url(IN_MEMORY_ENDPOINT.to_owned()),
            self.clone(),
        )
    }

    // ───────────────────────── Test hooks ─────────────────────────

    /// Fail the next call of `method` with `err`.
    pub fn fail_next(&self, method: RpcMethod, err: LedgerError) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.pending.insert(method, err);
        }
    }

    /// Number of `method` calls received so far, including failed ones.
    pub fn call_count(&self, method: RpcMethod) -> u64 {
        self.faults
            .lock()
            .map(|f| f.calls.get(&method).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u64 {
        self.faults
            .lock()
            .map(|f| f.calls.values().sum())
            .unwrap_or(0)
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut slot) = self.latency.lock() {
            *slot = latency;
        }
    }

    async fn enter(&self, method: RpcMethod) -> Result<(), LedgerError> {
        let injected = match self.faults.lock() {
            Ok(mut faults) => {
                *faults.calls.entry(method).or_insert(0) += 1;
                faults.pending.remove(&method)
            }
            Err(_) => None,
        };

        let latency = self.latency.lock().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match injected {
            Some(err) => {
                warn!(?method, error = %err, "injected ledger failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    // ───────────────────────── Direct access ─────────────────────────

    /// Execute an already-signed instruction.
    pub async fn submit(&self, signed: &SignedMessage) -> Result<TxOutcome, LedgerError> {
        self.state.lock().await.apply(signed, now_nanos())
    }

    pub async fn registry(&self, id: &RegistryId) -> Result<RegistryState, LedgerError> {
        self.state.lock().await.registry(id)
    }

    pub async fn account(&self, id: &HoldingAccountId) -> Result<HoldingAccount, LedgerError> {
        self.state.lock().await.account(id)
    }

    pub async fn holding_account_of(
        &self,
        registry: &RegistryId,
        owner: &Identity,
    ) -> Result<HoldingAccount, LedgerError> {
        self.state.lock().await.holding_account_of(registry, owner)
    }

    pub async fn events(&self) -> Vec<EventRecord> {
        self.state.lock().await.events().to_vec()
    }

    async fn sign_and_submit(
        &self,
        payer: &dyn SigningAgent,
        instruction: Instruction,
    ) -> Result<TxOutcome, LedgerError> {
        let signed = authorize(payer, &instruction, &self.nonces).await?;
        let outcome = self.submit(&signed).await?;
        debug!(action = instruction.action(), receipt = %outcome.receipt(), "transaction accepted");
        Ok(outcome)
    }
}

fn unexpected(outcome: &TxOutcome) -> LedgerError {
    LedgerError::MalformedInstruction(format!("unexpected transaction outcome: {outcome:?}"))
}

#[async_trait]
impl LedgerRpc for InMemoryLedger {
    async fn create_registry(
        &self,
        payer: &dyn SigningAgent,
        mint_authority: &Identity,
        freeze_authority: Option<&Identity>,
        decimals: u8,
    ) -> Result<RegistryId, LedgerError> {
        self.enter(RpcMethod::CreateRegistry).await?;
        let instruction = Instruction::CreateRegistry {
            mint_authority: *mint_authority,
            freeze_authority: freeze_authority.copied(),
            decimals,
        };
        match self.sign_and_submit(payer, instruction).await? {
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
        self.enter(RpcMethod::GetOrCreateHoldingAccount).await?;
        match self.holding_account_of(registry, owner).await {
            Ok(existing) => return Ok(existing),
            Err(LedgerError::AccountNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let instruction = Instruction::CreateHoldingAccount {
            registry: *registry,
            owner: *owner,
        };
        match self.sign_and_submit(payer, instruction).await? {
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
        self.enter(RpcMethod::MintTo).await?;
        let instruction = Instruction::MintTo {
            registry: *registry,
            destination: *destination,
            authority: *authority,
            amount,
        };
        match self.sign_and_submit(payer, instruction).await? {
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
        self.enter(RpcMethod::Transfer).await?;
        let instruction = Instruction::Transfer {
            source: *source,
            destination: *destination,
            authority: *authority,
            amount,
        };
        match self.sign_and_submit(payer, instruction).await? {
            TxOutcome::Transferred { receipt, .. } => Ok(receipt),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_account(&self, account: &HoldingAccountId) -> Result<HoldingAccount, LedgerError> {
        self.enter(RpcMethod::GetAccount).await?;
        self.account(account).await
    }

    async fn get_registry(&self, registry: &RegistryId) -> Result<RegistryState, LedgerError> {
        self.enter(RpcMethod::GetRegistry).await?;
        self.registry(registry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_core::agent::LocalKeypairAgent;

    async fn connected_agent() -> LocalKeypairAgent {
        let agent = LocalKeypairAgent::generate("local");
        agent.connect().await.unwrap();
        agent
    }

    #[tokio::test]
    async fn test_rpc_round_trip() {
        let ledger = InMemoryLedger::new();
        let agent = connected_agent().await;
        let me = agent.identity();

        let registry = ledger.create_registry(&agent, &me, Some(&me), 6).await.unwrap();
        let account = ledger
            .get_or_create_holding_account(&agent, &registry, &me)
            .await
            .unwrap();
        let receipt = ledger
            .mint_to(&agent, &registry, &account.id, &me, 2_500_000)
            .await
            .unwrap();
        assert_eq!(receipt.as_str().len(), 128);

        assert_eq!(ledger.get_account(&account.id).await.unwrap().amount, 2_500_000);
        assert_eq!(ledger.get_registry(&registry).await.unwrap().supply, 2_500_000);
        assert_eq!(ledger.events().await.len(), 3);
    }

    #[tokio::test]
    async fn test_existing_holding_account_needs_no_signature() {
        let ledger = InMemoryLedger::new();
        let agent = connected_agent().await;
        let me = agent.identity();
        let registry = ledger.create_registry(&agent, &me, None, 9).await.unwrap();

        let first = ledger
            .get_or_create_holding_account(&agent, &registry, &me)
            .await
            .unwrap();
        let signed_so_far = agent.signatures_issued();
        let second = ledger
            .get_or_create_holding_account(&agent, &registry, &me)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(agent.signatures_issued(), signed_so_far);
    }

    #[tokio::test]
    async fn test_fault_injection_applies_once() {
        let ledger = InMemoryLedger::new();
        let agent = connected_agent().await;
        let me = agent.identity();

        ledger.fail_next(RpcMethod::CreateRegistry, LedgerError::Transport("down".into()));
        assert_eq!(
            ledger.create_registry(&agent, &me, None, 9).await,
            Err(LedgerError::Transport("down".into()))
        );
        assert!(ledger.create_registry(&agent, &me, None, 9).await.is_ok());
        assert_eq!(ledger.call_count(RpcMethod::CreateRegistry), 2);
        assert_eq!(ledger.total_calls(), 2);
        // the failed call never reached the signer
        assert_eq!(agent.signatures_issued(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_agent_is_signing_rejected() {
        let ledger = InMemoryLedger::new();
        let agent = LocalKeypairAgent::generate("local");
        let me = agent.identity();
        assert!(matches!(
            ledger.create_registry(&agent, &me, None, 9).await,
            Err(LedgerError::SigningRejected(_))
        ));
    }
}
