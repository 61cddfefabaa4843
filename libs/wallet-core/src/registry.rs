//! Asset Registry Session: dependent-operation orchestrator
//!
//! Chains create-registry → create-holding-account → mint/transfer against one
//! registry. Every operation checks its preconditions before any network I/O
//! and writes session fields only after the remote call succeeded. Amounts are
//! validated first, so a bad amount is reported whatever the session state.
//!
//! Mutating operations and `reset` are single-flight per session: a second
//! call waits for the first to finish and then re-checks its own
//! preconditions. Reads are not serialized and never write the snapshot.
//!
//! Fields established under one identity are dropped by the next mutating
//! call made under a different identity, and read as absent until then; a
//! plain disconnect keeps them.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{watch, Mutex};
use token_types::errors::{Precondition, WalletError};
use token_types::ids::{HoldingAccountId, Identity, Receipt, RegistryId};
use token_types::ledger::RegistryInfo;
use token_types::numeric::{from_base_units, to_positive_base_units, validate_decimals};
use tracing::{debug, info, warn};

use crate::agent::SigningAgent;
use crate::ledger::LedgerClient;
use crate::session::SigningSession;

/// Observable state of a registry session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub registry_id: Option<RegistryId>,
    pub holding_account_id: Option<HoldingAccountId>,
    pub decimals: u8,
    /// Identity that established the fields above
    pub established_by: Option<Identity>,
}

impl RegistrySnapshot {
    fn empty(decimals: u8) -> Self {
        Self {
            registry_id: None,
            holding_account_id: None,
            decimals,
            established_by: None,
        }
    }
}

pub struct AssetRegistrySession {
    signing: Arc<SigningSession>,
    decimals: u8,
    state: watch::Sender<RegistrySnapshot>,
    in_flight: Mutex<()>,
}

impl AssetRegistrySession {
    /// Create an empty session. Fails if `decimals` cannot be represented.
    pub fn new(signing: Arc<SigningSession>, decimals: u8) -> Result<Self, WalletError> {
        let decimals = validate_decimals(decimals)?;
        let (state, _) = watch::channel(RegistrySnapshot::empty(decimals));
        Ok(Self {
            signing,
            decimals,
            state,
            in_flight: Mutex::new(()),
        })
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.state.borrow().clone()
    }

    pub fn registry_id(&self) -> Option<RegistryId> {
        self.state.borrow().registry_id
    }

    pub fn holding_account_id(&self) -> Option<HoldingAccountId> {
        self.state.borrow().holding_account_id
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.state.subscribe()
    }

    pub fn signing(&self) -> &Arc<SigningSession> {
        &self.signing
    }

    /// Forget the registry and holding account once any in-flight mutating
    /// call has finished.
    pub async fn reset(&self) {
        let _single_flight = self.in_flight.lock().await;
        self.state.send_replace(RegistrySnapshot::empty(self.decimals));
        info!("registry session reset");
    }

    // ───────────────────────── Mutating operations ─────────────────────────

    /// Create a registry with the caller as mint and freeze authority.
    pub async fn create_registry(&self, ledger: &LedgerClient) -> Result<RegistryId, WalletError> {
        let _single_flight = self.in_flight.lock().await;
        let (identity, agent) = self.active_signer()?;
        if self.registry_id().is_some() {
            return Err(Precondition::RegistryAlreadyCreated.into());
        }

        debug!(endpoint = %ledger.endpoint(), decimals = self.decimals, "creating registry");
        let registry = ledger
            .rpc()
            .create_registry(agent.as_ref(), &identity, Some(&identity), self.decimals)
            .await
            .map_err(|e| remote_failure("create_registry", e))?;

        self.state.send_modify(|s| {
            s.registry_id = Some(registry);
            s.holding_account_id = None;
            s.established_by = Some(identity);
        });
        info!(%registry, "registry created");
        Ok(registry)
    }

    /// Create (or locate) the caller's holding account for the session registry.
    pub async fn create_holding_account(
        &self,
        ledger: &LedgerClient,
    ) -> Result<HoldingAccountId, WalletError> {
        let _single_flight = self.in_flight.lock().await;
        let (identity, agent) = self.active_signer()?;
        let registry = self.registry_id().ok_or(Precondition::RegistryMissing)?;

        debug!(%registry, owner = %identity, "resolving holding account");
        let account = ledger
            .rpc()
            .get_or_create_holding_account(agent.as_ref(), &registry, &identity)
            .await
            .map_err(|e| remote_failure("create_holding_account", e))?;

        let stored = self.state.send_if_modified(|s| {
            if s.registry_id != Some(registry) {
                return false;
            }
            s.holding_account_id = Some(account.id);
            true
        });
        if !stored {
            warn!(account = %account.id, "registry changed while resolving holding account, not stored");
            return Err(Precondition::RegistryMissing.into());
        }
        info!(account = %account.id, "holding account ready");
        Ok(account.id)
    }

    /// Issue `amount` (human units) into the caller's holding account.
    pub async fn mint(&self, ledger: &LedgerClient, amount: f64) -> Result<Receipt, WalletError> {
        let raw = to_positive_base_units(amount, self.decimals)?;
        let _single_flight = self.in_flight.lock().await;
        let (identity, agent) = self.active_signer()?;
        let (registry, account) = self.require_holding_account()?;

        debug!(%registry, %account, raw, "minting");
        let receipt = ledger
            .rpc()
            .mint_to(agent.as_ref(), &registry, &account, &identity, raw)
            .await
            .map_err(|e| remote_failure("mint", e))?;

        info!(%receipt, raw, "mint confirmed");
        Ok(receipt)
    }

    /// Move `amount` (human units) to `destination`'s holding account,
    /// creating that account first if needed.
    pub async fn transfer(
        &self,
        ledger: &LedgerClient,
        destination: &Identity,
        amount: f64,
    ) -> Result<Receipt, WalletError> {
        let raw = to_positive_base_units(amount, self.decimals)?;
        let _single_flight = self.in_flight.lock().await;
        let (identity, agent) = self.active_signer()?;
        let (registry, source) = self.require_holding_account()?;

        debug!(%registry, %destination, "resolving destination holding account");
        let target = ledger
            .rpc()
            .get_or_create_holding_account(agent.as_ref(), &registry, destination)
            .await
            .map_err(|e| {
                warn!(%destination, error = %e, "destination resolution failed");
                WalletError::from_destination(e)
            })?;

        debug!(%source, destination = %target.id, raw, "transferring");
        let receipt = ledger
            .rpc()
            .transfer(agent.as_ref(), &source, &target.id, &identity, raw)
            .await
            .map_err(|e| remote_failure("transfer", e))?;

        info!(%receipt, raw, "transfer confirmed");
        Ok(receipt)
    }

    // ───────────────────────── Reads ─────────────────────────

    /// Balance of the caller's holding account in human units.
    pub async fn get_balance(&self, ledger: &LedgerClient) -> Result<Decimal, WalletError> {
        let account = self
            .visible_fields()
            .holding_account_id
            .ok_or(Precondition::HoldingAccountMissing)?;

        let record = ledger
            .rpc()
            .get_account(&account)
            .await
            .map_err(|e| remote_failure("get_balance", e))?;
        Ok(from_base_units(record.amount, self.decimals))
    }

    /// Registry metadata with supply in human units.
    pub async fn get_registry_info(&self, ledger: &LedgerClient) -> Result<RegistryInfo, WalletError> {
        let registry = self
            .visible_fields()
            .registry_id
            .ok_or(Precondition::RegistryMissing)?;

        let state = ledger
            .rpc()
            .get_registry(&registry)
            .await
            .map_err(|e| remote_failure("get_registry_info", e))?;
        Ok(RegistryInfo::from_state(&state, self.decimals))
    }

    // ───────────────────────── Internal guards ─────────────────────────

    fn active_signer(&self) -> Result<(Identity, Arc<dyn SigningAgent>), WalletError> {
        let (identity, agent) = self.signing.require_connected()?;
        self.drop_fields_if_foreign(&identity);
        Ok((identity, agent))
    }

    /// Snapshot as the connected identity sees it.
    fn visible_fields(&self) -> RegistrySnapshot {
        let snapshot = self.snapshot();
        match (self.signing.identity(), snapshot.established_by) {
            (Some(current), Some(owner)) if current != owner => {
                RegistrySnapshot::empty(self.decimals)
            }
            _ => snapshot,
        }
    }

    /// Caller must hold `in_flight`.
    fn drop_fields_if_foreign(&self, current: &Identity) {
        let decimals = self.decimals;
        let dropped = self.state.send_if_modified(|s| match s.established_by {
            Some(owner) if owner != *current => {
                *s = RegistrySnapshot::empty(decimals);
                true
            }
            _ => false,
        });
        if dropped {
            info!(identity = %current, "identity changed, registry session reset");
        }
    }

    fn require_holding_account(&self) -> Result<(RegistryId, HoldingAccountId), WalletError> {
        let snapshot = self.state.borrow();
        let registry = snapshot.registry_id.ok_or(Precondition::RegistryMissing)?;
        let account = snapshot
            .holding_account_id
            .ok_or(Precondition::HoldingAccountMissing)?;
        Ok((registry, account))
    }
}

fn remote_failure(operation: &str, err: token_types::errors::LedgerError) -> WalletError {
    warn!(operation, error = %err, "ledger call failed");
    WalletError::from_remote(err)
}

impl std::fmt::Debug for AssetRegistrySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetRegistrySession")
            .field("state", &*self.state.borrow())
            .finish()
    }
}
