//! Ledger record types
//!
//! Raw records are what the ledger stores and returns (integer base units).
//! `RegistryInfo` is the human-facing view reported to the UI collaborator.

use crate::ids::{HoldingAccountId, Identity, Receipt, RegistryId};
use crate::numeric::from_base_units;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger-side record describing a fungible asset type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    pub id: RegistryId,
    /// Precision the registry was created with
    pub decimals: u8,
    /// Total issued supply in base units
    pub supply: u64,
    pub mint_authority: Option<Identity>,
    pub freeze_authority: Option<Identity>,
}

/// One identity's balance of one registry's asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingAccount {
    pub id: HoldingAccountId,
    pub registry: RegistryId,
    pub owner: Identity,
    /// Balance in base units
    pub amount: u64,
}

/// Registry metadata converted into human units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub supply: Decimal,
    pub decimals: u8,
    pub mint_authority: Option<Identity>,
    pub freeze_authority: Option<Identity>,
}

impl RegistryInfo {
    /// Scale a raw registry record using the caller's session precision.
    pub fn from_state(state: &RegistryState, session_decimals: u8) -> Self {
        Self {
            supply: from_base_units(state.supply, session_decimals),
            decimals: state.decimals,
            mint_authority: state.mint_authority,
            freeze_authority: state.freeze_authority,
        }
    }
}

/// Result of a ledger-mutating transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxOutcome {
    RegistryCreated {
        registry: RegistryId,
        receipt: Receipt,
    },
    HoldingAccountCreated {
        account: HoldingAccount,
        receipt: Receipt,
    },
    Minted {
        account: HoldingAccountId,
        amount: u64,
        receipt: Receipt,
    },
    Transferred {
        source: HoldingAccountId,
        destination: HoldingAccountId,
        amount: u64,
        receipt: Receipt,
    },
}

impl TxOutcome {
    pub fn receipt(&self) -> &Receipt {
        match self {
            TxOutcome::RegistryCreated { receipt, .. }
            | TxOutcome::HoldingAccountCreated { receipt, .. }
            | TxOutcome::Minted { receipt, .. }
            | TxOutcome::Transferred { receipt, .. } => receipt,
        }
    }
}
