//! Ledger events
//!
//! Immutable records appended by every accepted transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use token_types::ids::{HoldingAccountId, Identity, Receipt, RegistryId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCreated {
    pub registry: RegistryId,
    pub decimals: u8,
    pub mint_authority: Identity,
    pub freeze_authority: Option<Identity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingAccountCreated {
    pub account: HoldingAccountId,
    pub registry: RegistryId,
    pub owner: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minted {
    pub registry: RegistryId,
    pub account: HoldingAccountId,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transferred {
    pub source: HoldingAccountId,
    pub destination: HoldingAccountId,
    pub amount: u64,
}

/// Enum wrapper for all ledger events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    RegistryCreated(RegistryCreated),
    HoldingAccountCreated(HoldingAccountCreated),
    Minted(Minted),
    Transferred(Transferred),
}

/// An event as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1
    pub sequence: u64,
    pub signer: Identity,
    pub receipt: Receipt,
    pub recorded_at: DateTime<Utc>,
    pub event: LedgerEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_record_serialization() {
        let record = EventRecord {
            sequence: 1,
            signer: Identity::from_bytes([1; 32]),
            receipt: Receipt::new("ab".repeat(64)),
            recorded_at: Utc::now(),
            event: LedgerEvent::Minted(Minted {
                registry: RegistryId::from_bytes([2; 32]),
                account: HoldingAccountId::from_bytes([3; 32]),
                amount: 100_000_000_000,
            }),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
