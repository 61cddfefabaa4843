//! Ledger: registries, holding accounts, mint and transfer
//!
//! A deterministic state machine. `apply` takes a signed instruction and runs
//! these checks in order before touching any state:
//! 1. Signature verification (the signer is the message's public key)
//! 2. Timestamp within the replay window
//! 3. Nonce strictly above the signer's last accepted nonce
//! 4. Instruction decoding
//! 5. Instruction-specific authority, existence and arithmetic checks
//!
//! A rejected instruction leaves balances and supply unchanged.

use std::collections::BTreeMap;

use chrono::Utc;
use token_types::errors::LedgerError;
use token_types::ids::{HoldingAccountId, Identity, Receipt, RegistryId};
use token_types::ledger::{HoldingAccount, RegistryState, TxOutcome};
use token_types::numeric::validate_decimals;
use tracing::debug;
use wallet_core::instruction::Instruction;
use wallet_core::signing::{verify_signature, NonceTracker, SignedMessage, SigningError};

use crate::events::{
    EventRecord, HoldingAccountCreated, LedgerEvent, Minted, RegistryCreated, Transferred,
};

#[derive(Debug, Default)]
pub struct Ledger {
    registries: BTreeMap<RegistryId, RegistryState>,
    accounts: BTreeMap<HoldingAccountId, HoldingAccount>,
    nonces: NonceTracker,
    /// Append-only event log
    events: Vec<EventRecord>,
    sequence: u64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // ───────────────────────── Transactions ─────────────────────────

    /// Verify and execute one signed instruction.
    pub fn apply(&mut self, signed: &SignedMessage, now_ns: i64) -> Result<TxOutcome, LedgerError> {
        let signer = verify_signature(signed).map_err(signing_failure)?;
        self.nonces
            .validate_timestamp(signed.message.timestamp, now_ns)
            .map_err(signing_failure)?;
        let instruction = Instruction::from_message(&signed.message)?;
        self.nonces
            .validate_and_advance(&signer, signed.message.nonce)
            .map_err(signing_failure)?;

        let receipt = Receipt::new(signed.signature.clone());
        debug!(%signer, action = instruction.action(), nonce = signed.message.nonce, "applying instruction");

        let (outcome, event) = match instruction {
            Instruction::CreateRegistry {
                mint_authority,
                freeze_authority,
                decimals,
            } => self.create_registry(
                &signer,
                signed.message.nonce,
                mint_authority,
                freeze_authority,
                decimals,
                receipt.clone(),
            )?,
            Instruction::CreateHoldingAccount { registry, owner } => {
                self.create_holding_account(registry, owner, receipt.clone())?
            }
            Instruction::MintTo {
                registry,
                destination,
                authority,
                amount,
            } => self.mint_to(&signer, registry, destination, authority, amount, receipt.clone())?,
            Instruction::Transfer {
                source,
                destination,
                authority,
                amount,
            } => self.transfer(&signer, source, destination, authority, amount, receipt.clone())?,
        };

        if let Some(event) = event {
            self.sequence += 1;
            self.events.push(EventRecord {
                sequence: self.sequence,
                signer,
                receipt,
                recorded_at: Utc::now(),
                event,
            });
        }
        Ok(outcome)
    }

    fn create_registry(
        &mut self,
        signer: &Identity,
        nonce: u64,
        mint_authority: Identity,
        freeze_authority: Option<Identity>,
        decimals: u8,
        receipt: Receipt,
    ) -> Result<(TxOutcome, Option<LedgerEvent>), LedgerError> {
        validate_decimals(decimals).map_err(|_| LedgerError::UnsupportedDecimals(decimals))?;

        let id = RegistryId::derive(signer, nonce);
        self.registries.insert(
            id,
            RegistryState {
                id,
                decimals,
                supply: 0,
                mint_authority: Some(mint_authority),
                freeze_authority,
            },
        );

        let event = LedgerEvent::RegistryCreated(RegistryCreated {
            registry: id,
            decimals,
            mint_authority,
            freeze_authority,
        });
        Ok((
            TxOutcome::RegistryCreated {
                registry: id,
                receipt,
            },
            Some(event),
        ))
    }

    /// Create-or-get: an existing account is returned unchanged and logs nothing.
    fn create_holding_account(
        &mut self,
        registry: RegistryId,
        owner: Identity,
        receipt: Receipt,
    ) -> Result<(TxOutcome, Option<LedgerEvent>), LedgerError> {
        self.registry(&registry)?;

        let id = HoldingAccountId::derive(&registry, &owner);
        if let Some(existing) = self.accounts.get(&id) {
            return Ok((
                TxOutcome::HoldingAccountCreated {
                    account: existing.clone(),
                    receipt,
                },
                None,
            ));
        }

        let account = HoldingAccount {
            id,
            registry,
            owner,
            amount: 0,
        };
        self.accounts.insert(id, account.clone());

        let event = LedgerEvent::HoldingAccountCreated(HoldingAccountCreated {
            account: id,
            registry,
            owner,
        });
        Ok((TxOutcome::HoldingAccountCreated { account, receipt }, Some(event)))
    }

    fn mint_to(
        &mut self,
        signer: &Identity,
        registry: RegistryId,
        destination: HoldingAccountId,
        authority: Identity,
        amount: u64,
        receipt: Receipt,
    ) -> Result<(TxOutcome, Option<LedgerEvent>), LedgerError> {
        check_amount(amount)?;
        check_signer_is(signer, &authority)?;

        let state = self.registry(&registry)?;
        if state.mint_authority != Some(authority) {
            return Err(LedgerError::Unauthorized(format!(
                "{authority} is not the mint authority of {registry}"
            )));
        }
        let account = self.account(&destination)?;
        if account.registry != registry {
            return Err(LedgerError::RegistryMismatch);
        }

        let new_supply = state.supply.checked_add(amount).ok_or(LedgerError::Overflow)?;
        let new_balance = account.amount.checked_add(amount).ok_or(LedgerError::Overflow)?;

        if let Some(state) = self.registries.get_mut(&registry) {
            state.supply = new_supply;
        }
        if let Some(account) = self.accounts.get_mut(&destination) {
            account.amount = new_balance;
        }

        let event = LedgerEvent::Minted(Minted {
            registry,
            account: destination,
            amount,
        });
        Ok((
            TxOutcome::Minted {
                account: destination,
                amount,
                receipt,
            },
            Some(event),
        ))
    }

    fn transfer(
        &mut self,
        signer: &Identity,
        source: HoldingAccountId,
        destination: HoldingAccountId,
        authority: Identity,
        amount: u64,
        receipt: Receipt,
    ) -> Result<(TxOutcome, Option<LedgerEvent>), LedgerError> {
        check_amount(amount)?;
        check_signer_is(signer, &authority)?;

        let from = self.account(&source)?;
        let to = self.account(&destination)?;
        if from.owner != authority {
            return Err(LedgerError::Unauthorized(format!(
                "{authority} does not own {source}"
            )));
        }
        if from.registry != to.registry {
            return Err(LedgerError::RegistryMismatch);
        }
        if from.amount < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: from.amount,
            });
        }

        if source != destination {
            let credited = to.amount.checked_add(amount).ok_or(LedgerError::Overflow)?;
            let debited = from.amount - amount;
            if let Some(account) = self.accounts.get_mut(&source) {
                account.amount = debited;
            }
            if let Some(account) = self.accounts.get_mut(&destination) {
                account.amount = credited;
            }
        }

        let event = LedgerEvent::Transferred(Transferred {
            source,
            destination,
            amount,
        });
        Ok((
            TxOutcome::Transferred {
                source,
                destination,
                amount,
                receipt,
            },
            Some(event),
        ))
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn registry(&self, id: &RegistryId) -> Result<RegistryState, LedgerError> {
        self.registries
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::RegistryNotFound {
                registry: id.to_hex(),
            })
    }

    pub fn account(&self, id: &HoldingAccountId) -> Result<HoldingAccount, LedgerError> {
        self.accounts
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound {
                account: id.to_hex(),
            })
    }

    /// The canonical holding account of `owner` for `registry`.
    pub fn holding_account_of(
        &self,
        registry: &RegistryId,
        owner: &Identity,
    ) -> Result<HoldingAccount, LedgerError> {
        self.registry(registry)?;
        self.account(&HoldingAccountId::derive(registry, owner))
    }

    /// Sum of all holding balances of `registry`.
    pub fn circulating(&self, registry: &RegistryId) -> u128 {
        self.accounts
            .values()
            .filter(|a| a.registry == *registry)
            .map(|a| u128::from(a.amount))
            .sum()
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }
}

fn signing_failure(err: SigningError) -> LedgerError {
    match err {
        SigningError::NonceReplay {
            provided,
            last_seen,
        } => LedgerError::NonceReplay {
            provided,
            last_seen,
        },
        SigningError::FutureTimestamp | SigningError::ExpiredMessage => LedgerError::StaleMessage,
        SigningError::Encoding(reason) => LedgerError::MalformedInstruction(reason),
        SigningError::InvalidPublicKey
        | SigningError::InvalidSignature
        | SigningError::VerificationFailed => LedgerError::InvalidSignature,
    }
}

fn check_amount(amount: u64) -> Result<(), LedgerError> {
    if amount == 0 {
        return Err(LedgerError::MalformedInstruction(
            "amount must be positive".to_owned(),
        ));
    }
    Ok(())
}

fn check_signer_is(signer: &Identity, authority: &Identity) -> Result<(), LedgerError> {
    if signer != authority {
        return Err(LedgerError::Unauthorized(format!(
            "instruction authority {authority} did not sign"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use wallet_core::signing::sign_message;

    const NOW: i64 = 1_708_123_456_789_000_000;

    struct Signer {
        key: SigningKey,
        nonce: u64,
    }

    impl Signer {
        fn new(seed: u8) -> Self {
            Self {
                key: SigningKey::from_bytes(&[seed; 32]),
                nonce: 0,
            }
        }

        fn identity(&self) -> Identity {
            Identity::from_bytes(self.key.verifying_key().to_bytes())
        }

        fn sign(&mut self, instruction: &Instruction) -> SignedMessage {
            self.nonce += 1;
            sign_message(&instruction.to_message(NOW, self.nonce), &self.key).unwrap()
        }
    }

    fn registry_of(outcome: TxOutcome) -> RegistryId {
        match outcome {
            TxOutcome::RegistryCreated { registry, .. } => registry,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    fn account_of(outcome: TxOutcome) -> HoldingAccount {
        match outcome {
            TxOutcome::HoldingAccountCreated { account, .. } => account,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    /// Registry owned by `owner` plus `owner`'s holding account.
    fn setup(ledger: &mut Ledger, owner: &mut Signer) -> (RegistryId, HoldingAccountId) {
        let identity = owner.identity();
        let create = owner.sign(&Instruction::CreateRegistry {
            mint_authority: identity,
            freeze_authority: Some(identity),
            decimals: 9,
        });
        let registry = registry_of(ledger.apply(&create, NOW).unwrap());
        let open = owner.sign(&Instruction::CreateHoldingAccount {
            registry,
            owner: identity,
        });
        let account = account_of(ledger.apply(&open, NOW).unwrap());
        (registry, account.id)
    }

    fn mint(owner: &mut Signer, registry: RegistryId, destination: HoldingAccountId, amount: u64) -> SignedMessage {
        let authority = owner.identity();
        owner.sign(&Instruction::MintTo {
            registry,
            destination,
            authority,
            amount,
        })
    }

    // ─── Registry and accounts ───

    #[test]
    fn test_create_registry_records_authorities() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, _) = setup(&mut ledger, &mut owner);

        let state = ledger.registry(&registry).unwrap();
        assert_eq!(state.decimals, 9);
        assert_eq!(state.supply, 0);
        assert_eq!(state.mint_authority, Some(owner.identity()));
        assert_eq!(registry, RegistryId::derive(&owner.identity(), 1));
    }

    #[test]
    fn test_create_registry_rejects_unsupported_decimals() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let identity = owner.identity();
        let signed = owner.sign(&Instruction::CreateRegistry {
            mint_authority: identity,
            freeze_authority: None,
            decimals: 19,
        });
        assert_eq!(
            ledger.apply(&signed, NOW),
            Err(LedgerError::UnsupportedDecimals(19))
        );
    }

    #[test]
    fn test_holding_account_is_create_or_get() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, account) = setup(&mut ledger, &mut owner);
        let events_before = ledger.events().len();

        let again = owner.sign(&Instruction::CreateHoldingAccount {
            registry,
            owner: owner.identity(),
        });
        assert_eq!(account_of(ledger.apply(&again, NOW).unwrap()).id, account);
        assert_eq!(ledger.events().len(), events_before);
        assert_eq!(
            ledger.holding_account_of(&registry, &owner.identity()).unwrap().id,
            account
        );
    }

    #[test]
    fn test_holding_account_for_unknown_registry() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let signed = owner.sign(&Instruction::CreateHoldingAccount {
            registry: RegistryId::from_bytes([9; 32]),
            owner: owner.identity(),
        });
        assert!(matches!(
            ledger.apply(&signed, NOW),
            Err(LedgerError::RegistryNotFound { .. })
        ));
    }

    // ─── Mint ───

    #[test]
    fn test_mint_credits_balance_and_supply() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, account) = setup(&mut ledger, &mut owner);

        let signed = mint(&mut owner, registry, account, 100_000_000_000);
        let outcome = ledger.apply(&signed, NOW).unwrap();
        assert_eq!(outcome.receipt().as_str(), signed.signature);
        assert_eq!(ledger.account(&account).unwrap().amount, 100_000_000_000);
        assert_eq!(ledger.registry(&registry).unwrap().supply, 100_000_000_000);
    }

    #[test]
    fn test_mint_by_non_authority_rejected() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let mut intruder = Signer::new(2);
        let (registry, account) = setup(&mut ledger, &mut owner);

        let signed = mint(&mut intruder, registry, account, 5);
        assert!(matches!(
            ledger.apply(&signed, NOW),
            Err(LedgerError::Unauthorized(_))
        ));
        assert_eq!(ledger.registry(&registry).unwrap().supply, 0);
    }

    #[test]
    fn test_mint_overflow_leaves_state_unchanged() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, account) = setup(&mut ledger, &mut owner);

        ledger
            .apply(&mint(&mut owner, registry, account, u64::MAX), NOW)
            .unwrap();
        assert_eq!(
            ledger.apply(&mint(&mut owner, registry, account, 1), NOW),
            Err(LedgerError::Overflow)
        );
        assert_eq!(ledger.account(&account).unwrap().amount, u64::MAX);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, account) = setup(&mut ledger, &mut owner);
        assert!(matches!(
            ledger.apply(&mint(&mut owner, registry, account, 0), NOW),
            Err(LedgerError::MalformedInstruction(_))
        ));
    }

    // ─── Transfer ───

    #[test]
    fn test_transfer_moves_funds() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let peer = Signer::new(2);
        let (registry, source) = setup(&mut ledger, &mut owner);
        ledger.apply(&mint(&mut owner, registry, source, 10), NOW).unwrap();

        let open = owner.sign(&Instruction::CreateHoldingAccount {
            registry,
            owner: peer.identity(),
        });
        let destination = account_of(ledger.apply(&open, NOW).unwrap()).id;

        let authority = owner.identity();
        let signed = owner.sign(&Instruction::Transfer {
            source,
            destination,
            authority,
            amount: 4,
        });
        ledger.apply(&signed, NOW).unwrap();

        assert_eq!(ledger.account(&source).unwrap().amount, 6);
        assert_eq!(ledger.account(&destination).unwrap().amount, 4);
        assert_eq!(ledger.circulating(&registry), 10);
    }

    #[test]
    fn test_transfer_insufficient_funds() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, source) = setup(&mut ledger, &mut owner);
        ledger.apply(&mint(&mut owner, registry, source, 3), NOW).unwrap();

        let authority = owner.identity();
        let signed = owner.sign(&Instruction::Transfer {
            source,
            destination: source,
            authority,
            amount: 10,
        });
        assert_eq!(
            ledger.apply(&signed, NOW),
            Err(LedgerError::InsufficientFunds {
                required: 10,
                available: 3
            })
        );
    }

    #[test]
    fn test_self_transfer_is_noop() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, source) = setup(&mut ledger, &mut owner);
        ledger.apply(&mint(&mut owner, registry, source, 3), NOW).unwrap();

        let authority = owner.identity();
        let signed = owner.sign(&Instruction::Transfer {
            source,
            destination: source,
            authority,
            amount: 2,
        });
        ledger.apply(&signed, NOW).unwrap();
        assert_eq!(ledger.account(&source).unwrap().amount, 3);
    }

    #[test]
    fn test_transfer_from_foreign_account_rejected() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let mut thief = Signer::new(2);
        let (registry, source) = setup(&mut ledger, &mut owner);
        ledger.apply(&mint(&mut owner, registry, source, 3), NOW).unwrap();

        let authority = thief.identity();
        let signed = thief.sign(&Instruction::Transfer {
            source,
            destination: source,
            authority,
            amount: 1,
        });
        assert!(matches!(
            ledger.apply(&signed, NOW),
            Err(LedgerError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_transfer_across_registries_rejected() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (first, source) = setup(&mut ledger, &mut owner);
        let (_, other) = setup(&mut ledger, &mut owner);
        ledger.apply(&mint(&mut owner, first, source, 3), NOW).unwrap();

        let authority = owner.identity();
        let signed = owner.sign(&Instruction::Transfer {
            source,
            destination: other,
            authority,
            amount: 1,
        });
        assert_eq!(ledger.apply(&signed, NOW), Err(LedgerError::RegistryMismatch));
    }

    // ─── Replay protection ───

    #[test]
    fn test_replayed_message_rejected() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, account) = setup(&mut ledger, &mut owner);

        let signed = mint(&mut owner, registry, account, 1);
        ledger.apply(&signed, NOW).unwrap();
        assert!(matches!(
            ledger.apply(&signed, NOW),
            Err(LedgerError::NonceReplay { .. })
        ));
        assert_eq!(ledger.account(&account).unwrap().amount, 1);
    }

    #[test]
    fn test_tampered_message_rejected() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, account) = setup(&mut ledger, &mut owner);

        let mut signed = mint(&mut owner, registry, account, 1);
        signed
            .message
            .payload
            .insert("amount".to_owned(), "1000000".to_owned());
        assert_eq!(ledger.apply(&signed, NOW), Err(LedgerError::InvalidSignature));
    }

    #[test]
    fn test_stale_message_rejected() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, account) = setup(&mut ledger, &mut owner);

        let signed = mint(&mut owner, registry, account, 1);
        let ten_minutes = 10 * 60 * 1_000_000_000;
        assert_eq!(
            ledger.apply(&signed, NOW + ten_minutes),
            Err(LedgerError::StaleMessage)
        );
        assert_eq!(
            ledger.apply(&signed, NOW - ten_minutes),
            Err(LedgerError::StaleMessage)
        );
    }

    // ─── Events ───

    #[test]
    fn test_events_are_sequenced() {
        let mut ledger = Ledger::new();
        let mut owner = Signer::new(1);
        let (registry, account) = setup(&mut ledger, &mut owner);
        ledger.apply(&mint(&mut owner, registry, account, 7), NOW).unwrap();

        let events = ledger.drain_events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0].event, LedgerEvent::RegistryCreated(_)));
        assert!(matches!(events[2].event, LedgerEvent::Minted(Minted { amount: 7, .. })));
        assert_eq!(
            events.iter().map(|e| e.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(ledger.events().is_empty());
    }
}
