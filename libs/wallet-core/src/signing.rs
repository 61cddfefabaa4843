//! Signing Module: Message signing and verification
//!
//! Provides deterministic message serialization, SHA-256 hashing,
//! Ed25519 signing/verification, nonce tracking, and replay protection.
//! Signing agents sign `SignableMessage`s; the ledger verifies them.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use token_types::ids::Identity;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Signing schema version.
pub const SIGNING_SCHEMA_VERSION: &str = "1.0.0";

/// Maximum age of a signable message (replay protection window, 5 minutes).
const MAX_MESSAGE_AGE_NS: i64 = 5 * 60 * 1_000_000_000;

/// Tolerated clock skew between signer and ledger (30 seconds).
const MAX_CLOCK_SKEW_NS: i64 = 30 * 1_000_000_000;

// ---------------------------------------------------------------------------
// Signable message
// ---------------------------------------------------------------------------

/// A message payload prepared for signing.
///
/// The canonical byte representation is the UTF-8 encoded JSON string
/// produced by `serde_json` over this struct; `BTreeMap` keeps payload keys
/// sorted so every signer and verifier hashes the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignableMessage {
    /// Schema version (always `SIGNING_SCHEMA_VERSION`)
    pub version: String,
    /// Instruction name, e.g. "CreateRegistry", "MintTo", "Transfer"
    pub action: String,
    /// Deterministic payload (sorted keys)
    pub payload: BTreeMap<String, String>,
    /// Signer-side timestamp (unix nanos)
    pub timestamp: i64,
    /// Monotonic nonce for the signing identity
    pub nonce: u64,
}

impl SignableMessage {
    pub fn new(
        action: impl Into<String>,
        payload: BTreeMap<String, String>,
        timestamp: i64,
        nonce: u64,
    ) -> Self {
        Self {
            version: SIGNING_SCHEMA_VERSION.to_owned(),
            action: action.into(),
            payload,
            timestamp,
            nonce,
        }
    }

    /// Serialize to canonical JSON bytes.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, SigningError> {
        serde_json::to_vec(self).map_err(|e| SigningError::Encoding(e.to_string()))
    }

    /// SHA-256 hash of the canonical bytes.
    pub fn hash(&self) -> Result<[u8; 32], SigningError> {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes()?);
        Ok(hasher.finalize().into())
    }

    /// SHA-256 hash as hex string.
    pub fn hash_hex(&self) -> Result<String, SigningError> {
        self.hash().map(hex::encode)
    }
}

// ---------------------------------------------------------------------------
// Signing / Verification
// ---------------------------------------------------------------------------

/// Signed message: message + signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub message: SignableMessage,
    /// Ed25519 signature as hex string
    pub signature: String,
    /// Public key of the signer as hex string
    pub public_key: String,
}

/// Sign a message with an Ed25519 private key.
pub fn sign_message(
    message: &SignableMessage,
    signing_key: &SigningKey,
) -> Result<SignedMessage, SigningError> {
    let hash = message.hash()?;
    let signature = signing_key.sign(&hash);
    let verifying_key = signing_key.verifying_key();

    Ok(SignedMessage {
        message: message.clone(),
        signature: hex::encode(signature.to_bytes()),
        public_key: hex::encode(verifying_key.to_bytes()),
    })
}

/// Verify a signed message.
///
/// Returns the signer's identity if the signature is valid.
pub fn verify_signature(signed: &SignedMessage) -> Result<Identity, SigningError> {
    let pub_bytes = hex::decode(&signed.public_key)
        .map_err(|_| SigningError::InvalidPublicKey)?;
    let sig_bytes = hex::decode(&signed.signature)
        .map_err(|_| SigningError::InvalidSignature)?;

    let pub_key_bytes: [u8; 32] = pub_bytes
        .try_into()
        .map_err(|_| SigningError::InvalidPublicKey)?;
    let sig_key_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| SigningError::InvalidSignature)?;

    let verifying_key = VerifyingKey::from_bytes(&pub_key_bytes)
        .map_err(|_| SigningError::InvalidPublicKey)?;
    let signature = Signature::from_bytes(&sig_key_bytes);

    let hash = signed.message.hash()?;
    verifying_key
        .verify(&hash, &signature)
        .map_err(|_| SigningError::VerificationFailed)?;

    Ok(Identity::from_bytes(pub_key_bytes))
}

// ---------------------------------------------------------------------------
// Nonce tracking (replay protection)
// ---------------------------------------------------------------------------

/// Nonce validator for replay protection.
///
/// Tracks the last-seen nonce per signer and rejects replayed messages.
#[derive(Debug, Clone, Default)]
pub struct NonceTracker {
    /// Last seen nonce per signer
    last_nonce: BTreeMap<Identity, u64>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and advance the nonce for a signer.
    ///
    /// Returns `Ok(())` if the nonce is strictly greater than the last seen.
    pub fn validate_and_advance(
        &mut self,
        signer: &Identity,
        nonce: u64,
    ) -> Result<(), SigningError> {
        let last = self.last_nonce.get(signer).copied().unwrap_or(0);
        if nonce <= last {
            return Err(SigningError::NonceReplay {
                provided: nonce,
                last_seen: last,
            });
        }
        self.last_nonce.insert(*signer, nonce);
        Ok(())
    }

    /// Check if a message timestamp is within the replay protection window.
    pub fn validate_timestamp(
        &self,
        message_timestamp: i64,
        current_timestamp: i64,
    ) -> Result<(), SigningError> {
        let age = current_timestamp - message_timestamp;
        if age < -MAX_CLOCK_SKEW_NS {
            return Err(SigningError::FutureTimestamp);
        }
        if age > MAX_MESSAGE_AGE_NS {
            return Err(SigningError::ExpiredMessage);
        }
        Ok(())
    }
}

/// Client-side nonce generator.
///
/// Nonces follow wall-clock nanos but never repeat or go backwards:
/// each call returns `max(now, previous + 1)`.
#[derive(Debug, Default)]
pub struct NonceSource {
    last: AtomicU64,
}

impl NonceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, now_ns: u64) -> u64 {
        let mut current = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now_ns.max(current + 1);
            match self.last.compare_exchange(
                current,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Current wall-clock time in unix nanos.
pub fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Signing module errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigningError {
    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Nonce replay: provided {provided}, last seen {last_seen}")]
    NonceReplay { provided: u64, last_seen: u64 },

    #[error("Message timestamp is in the future")]
    FutureTimestamp,

    #[error("Message has expired (outside replay window)")]
    ExpiredMessage,

    #[error("Message encoding failed: {0}")]
    Encoding(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
