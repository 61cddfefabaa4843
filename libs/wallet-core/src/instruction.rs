//! Ledger instructions and their signable encoding
//!
//! Every ledger-mutating call is one `Instruction`, encoded into a
//! `SignableMessage` payload for the agent to sign and decoded again by the
//! ledger after verification.

use std::collections::BTreeMap;
use std::str::FromStr;

use token_types::errors::LedgerError;
use token_types::ids::{HoldingAccountId, Identity, RegistryId};

use crate::signing::SignableMessage;

const CREATE_REGISTRY: &str = "CreateRegistry";
const CREATE_HOLDING_ACCOUNT: &str = "CreateHoldingAccount";
const MINT_TO: &str = "MintTo";
const TRANSFER: &str = "Transfer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    CreateRegistry {
        mint_authority: Identity,
        freeze_authority: Option<Identity>,
        decimals: u8,
    },
    CreateHoldingAccount {
        registry: RegistryId,
        owner: Identity,
    },
    MintTo {
        registry: RegistryId,
        destination: HoldingAccountId,
        authority: Identity,
        amount: u64,
    },
    Transfer {
        source: HoldingAccountId,
        destination: HoldingAccountId,
        authority: Identity,
        amount: u64,
    },
}

impl Instruction {
    pub fn action(&self) -> &'static str {
        match self {
            Instruction::CreateRegistry { .. } => CREATE_REGISTRY,
            Instruction::CreateHoldingAccount { .. } => CREATE_HOLDING_ACCOUNT,
            Instruction::MintTo { .. } => MINT_TO,
            Instruction::Transfer { .. } => TRANSFER,
        }
    }

    /// Build the message an agent is asked to sign.
    pub fn to_message(&self, timestamp: i64, nonce: u64) -> SignableMessage {
        let mut payload = BTreeMap::new();
        match self {
            Instruction::CreateRegistry {
                mint_authority,
                freeze_authority,
                decimals,
            } => {
                payload.insert("mint_authority".to_owned(), mint_authority.to_hex());
                if let Some(freeze) = freeze_authority {
                    payload.insert("freeze_authority".to_owned(), freeze.to_hex());
                }
                payload.insert("decimals".to_owned(), decimals.to_string());
            }
            Instruction::CreateHoldingAccount { registry, owner } => {
                payload.insert("registry".to_owned(), registry.to_hex());
                payload.insert("owner".to_owned(), owner.to_hex());
            }
            Instruction::MintTo {
                registry,
                destination,
                authority,
                amount,
            } => {
                payload.insert("registry".to_owned(), registry.to_hex());
                payload.insert("destination".to_owned(), destination.to_hex());
                payload.insert("authority".to_owned(), authority.to_hex());
                payload.insert("amount".to_owned(), amount.to_string());
            }
            Instruction::Transfer {
                source,
                destination,
                authority,
                amount,
            } => {
                payload.insert("source".to_owned(), source.to_hex());
                payload.insert("destination".to_owned(), destination.to_hex());
                payload.insert("authority".to_owned(), authority.to_hex());
                payload.insert("amount".to_owned(), amount.to_string());
            }
        }
        SignableMessage::new(self.action(), payload, timestamp, nonce)
    }

    /// Decode the instruction carried by a (verified) message.
    pub fn from_message(message: &SignableMessage) -> Result<Self, LedgerError> {
        let payload = &message.payload;
        match message.action.as_str() {
            CREATE_REGISTRY => Ok(Instruction::CreateRegistry {
                mint_authority: field(payload, "mint_authority")?,
                freeze_authority: optional_field(payload, "freeze_authority")?,
                decimals: field(payload, "decimals")?,
            }),
            CREATE_HOLDING_ACCOUNT => Ok(Instruction::CreateHoldingAccount {
                registry: field(payload, "registry")?,
                owner: field(payload, "owner")?,
            }),
            MINT_TO => Ok(Instruction::MintTo {
                registry: field(payload, "registry")?,
                destination: field(payload, "destination")?,
                authority: field(payload, "authority")?,
                amount: field(payload, "amount")?,
            }),
            TRANSFER => Ok(Instruction::Transfer {
                source: field(payload, "source")?,
                destination: field(payload, "destination")?,
                authority: field(payload, "authority")?,
                amount: field(payload, "amount")?,
            }),
            other => Err(LedgerError::MalformedInstruction(format!(
                "unknown action {other}"
            ))),
        }
    }
}

fn optional_field<T: FromStr>(
    payload: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, LedgerError> {
    payload
        .get(key)
        .map(|raw| {
            raw.parse().map_err(|_| {
                LedgerError::MalformedInstruction(format!("invalid {key}: {raw:?}"))
            })
        })
        .transpose()
}

fn field<T: FromStr>(payload: &BTreeMap<String, String>, key: &str) -> Result<T, LedgerError> {
    optional_field(payload, key)?
        .ok_or_else(|| LedgerError::MalformedInstruction(format!("missing {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_to_encodes_amount_as_base_units() {
        let instruction = Instruction::MintTo {
            registry: RegistryId::from_bytes([1; 32]),
            destination: HoldingAccountId::from_bytes([2; 32]),
            authority: Identity::from_bytes([3; 32]),
            amount: 100_000_000_000,
        };
        let message = instruction.to_message(10, 1);
        assert_eq!(message.action, "MintTo");
        assert_eq!(message.payload["amount"], "100000000000");
        assert_eq!(Instruction::from_message(&message).unwrap(), instruction);
    }

    #[test]
    fn test_registry_without_freeze_authority() {
        let instruction = Instruction::CreateRegistry {
            mint_authority: Identity::from_bytes([3; 32]),
            freeze_authority: None,
            decimals: 6,
        };
        let message = instruction.to_message(10, 1);
        assert!(!message.payload.contains_key("freeze_authority"));
        assert_eq!(Instruction::from_message(&message).unwrap(), instruction);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let message = SignableMessage::new("Burn", BTreeMap::new(), 0, 1);
        assert!(matches!(
            Instruction::from_message(&message),
            Err(LedgerError::MalformedInstruction(_))
        ));
    }

    #[test]
    fn test_missing_and_invalid_fields_rejected() {
        let mut payload = BTreeMap::new();
        payload.insert("registry".to_owned(), "xyz".to_owned());
        let message = SignableMessage::new("CreateHoldingAccount", payload, 0, 1);
        let err = Instruction::from_message(&message).unwrap_err();
        assert_eq!(
            err,
            LedgerError::MalformedInstruction("invalid registry: \"xyz\"".to_owned())
        );

        let message = SignableMessage::new("Transfer", BTreeMap::new(), 0, 1);
        let err = Instruction::from_message(&message).unwrap_err();
        assert_eq!(err, LedgerError::MalformedInstruction("missing source".to_owned()));
    }
}
