//! Error taxonomy
//!
//! `LedgerError` is what the remote ledger (or the transport to it) reports.
//! `WalletError` is what the session layer reports to the UI collaborator;
//! every failure kind is a distinct variant so callers can react per kind.

use crate::numeric::AmountError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the ledger or the transport in front of it.
///
/// Serializable so the gateway can carry it across the wire unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("signing request rejected: {0}")]
    SigningRejected(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("nonce replay: provided {provided}, last seen {last_seen}")]
    NonceReplay { provided: u64, last_seen: u64 },

    #[error("message timestamp outside the accepted window")]
    StaleMessage,

    #[error("malformed instruction: {0}")]
    MalformedInstruction(String),

    #[error("registry not found: {registry}")]
    RegistryNotFound { registry: String },

    #[error("holding account not found: {account}")]
    AccountNotFound { account: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("registry mismatch between holding accounts")]
    RegistryMismatch,

    #[error("unsupported precision {0}")]
    UnsupportedDecimals(u8),

    #[error("arithmetic overflow")]
    Overflow,

    #[error("rate limited: {0}")]
    RateLimited(String),
}

/// Which prior-step requirement an operation found missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precondition {
    NotConnected,
    RegistryMissing,
    HoldingAccountMissing,
    /// The session already holds a registry; `reset` it before creating another.
    RegistryAlreadyCreated,
}

impl std::fmt::Display for Precondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Precondition::NotConnected => "signing session is not connected",
            Precondition::RegistryMissing => "registry has not been created",
            Precondition::HoldingAccountMissing => "holding account has not been created",
            Precondition::RegistryAlreadyCreated => "registry was already created in this session",
        };
        f.write_str(text)
    }
}

/// Errors surfaced by the signing session and the registry orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("no compatible signing agent is available")]
    ProviderUnavailable,

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("precondition not met: {0}")]
    PreconditionNotMet(Precondition),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    #[error("could not resolve destination holding account: {0}")]
    DestinationResolutionFailed(LedgerError),

    #[error("remote operation failed: {0}")]
    RemoteOperationFailed(LedgerError),

    /// The agent failed to release its authorization. Local state was cleared anyway.
    #[error("signing agent failed to disconnect: {0}")]
    DisconnectFailed(String),
}

impl WalletError {
    /// Map a ledger failure from a regular remote call.
    ///
    /// A rejected signing request is an authorization failure, not a remote one.
    pub fn from_remote(err: LedgerError) -> Self {
        match err {
            LedgerError::SigningRejected(reason) => WalletError::AuthorizationDenied(reason),
            other => WalletError::RemoteOperationFailed(other),
        }
    }

    /// Map a ledger failure raised while resolving a transfer destination.
    pub fn from_destination(err: LedgerError) -> Self {
        match err {
            LedgerError::SigningRejected(reason) => WalletError::AuthorizationDenied(reason),
            other => WalletError::DestinationResolutionFailed(other),
        }
    }
}

impl From<Precondition> for WalletError {
    fn from(missing: Precondition) -> Self {
        WalletError::PreconditionNotMet(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_display() {
        let err = WalletError::PreconditionNotMet(Precondition::RegistryMissing);
        assert_eq!(
            err.to_string(),
            "precondition not met: registry has not been created"
        );
    }

    #[test]
    fn test_signing_rejection_maps_to_authorization_denied() {
        let err = WalletError::from_remote(LedgerError::SigningRejected("user said no".into()));
        assert_eq!(err, WalletError::AuthorizationDenied("user said no".into()));

        let err = WalletError::from_destination(LedgerError::SigningRejected("no".into()));
        assert!(matches!(err, WalletError::AuthorizationDenied(_)));
    }

    #[test]
    fn test_remote_and_destination_failures_stay_distinct() {
        let remote = WalletError::from_remote(LedgerError::Overflow);
        let destination = WalletError::from_destination(LedgerError::Overflow);
        assert!(matches!(remote, WalletError::RemoteOperationFailed(_)));
        assert!(matches!(destination, WalletError::DestinationResolutionFailed(_)));
    }

    #[test]
    fn test_amount_error_converts() {
        let err: WalletError = AmountError::NotFinite.into();
        assert!(matches!(err, WalletError::InvalidAmount(AmountError::NotFinite)));
    }

    #[test]
    fn test_ledger_error_wire_format() {
        let err = LedgerError::InsufficientFunds {
            required: 10,
            available: 3,
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INSUFFICIENT_FUNDS");
        assert_eq!(json["detail"]["required"], 10);

        let back: LedgerError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);

        let unit = serde_json::to_value(LedgerError::InvalidSignature).unwrap();
        assert_eq!(unit["code"], "INVALID_SIGNATURE");
    }
}
