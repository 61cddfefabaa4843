//! Ledger identifiers
//!
//! Every ledger-side address is a 32-byte value rendered as lowercase hex.
//! Identities are the ed25519 public keys exposed by a signing agent;
//! registry and holding-account ids are addresses assigned by the ledger.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Length in bytes of every ledger address.
pub const ADDRESS_LEN: usize = 32;

/// Error returned when a hex string is not a valid 32-byte address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address {input:?}: {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: &'static str,
}

fn parse_address(s: &str) -> Result<[u8; ADDRESS_LEN], AddressParseError> {
    let bytes = hex::decode(s).map_err(|_| AddressParseError {
        input: s.to_owned(),
        reason: "not hex",
    })?;
    bytes.try_into().map_err(|_| AddressParseError {
        input: s.to_owned(),
        reason: "expected 32 bytes",
    })
}

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; ADDRESS_LEN]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = AddressParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_address(s).map(Self)
            }
        }

        impl TryFrom<String> for $name {
            type Error = AddressParseError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_hex()
            }
        }
    };
}

address_type!(
    /// Public identity of a signing agent account (ed25519 verifying key bytes).
    Identity
);

address_type!(
    /// Address of a fungible-asset registry on the ledger.
    RegistryId
);

address_type!(
    /// Address of one identity's holding account for one registry.
    HoldingAccountId
);

impl RegistryId {
    /// Derive the registry address created by `creator` with the given nonce.
    pub fn derive(creator: &Identity, nonce: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"registry");
        hasher.update(creator.as_bytes());
        hasher.update(nonce.to_be_bytes());
        Self(hasher.finalize().into())
    }
}

impl HoldingAccountId {
    /// Canonical holding account for `owner` in `registry`.
    ///
    /// Each (registry, owner) pair has exactly one canonical account, which is
    /// what makes create-or-get idempotent.
    pub fn derive(registry: &RegistryId, owner: &Identity) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"holding");
        hasher.update(registry.as_bytes());
        hasher.update(owner.as_bytes());
        Self(hasher.finalize().into())
    }
}

/// Opaque confirmation of an accepted ledger-mutating call.
///
/// Holds the hex signature of the accepted message, which is also the key
/// used to look the operation up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Receipt(String);

impl Receipt {
    pub fn new(signature: impl Into<String>) -> Self {
        Self(signature.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
