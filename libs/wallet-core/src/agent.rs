//! Signing agent boundary
//!
//! A signing agent holds the user's key material and authorizes requests.
//! The session layer only sees the narrow `SigningAgent` trait; real
//! environments inject their own implementation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use token_types::ids::Identity;
use tracing::debug;

use crate::signing::{sign_message, SignableMessage, SignedMessage};

/// Failures reported by a signing agent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("request rejected by the user")]
    Rejected,

    #[error("agent has not authorized this page")]
    NotConnected,

    #[error("agent failure: {0}")]
    Internal(String),
}

/// Externally injected component that authorizes operations on request.
#[async_trait]
pub trait SigningAgent: Send + Sync {
    /// Human-readable agent name for logs.
    fn name(&self) -> &str;

    /// Whether the agent declares itself compatible with this client.
    fn is_compatible(&self) -> bool;

    /// Ask the user to authorize this page; returns the exposed identity.
    async fn connect(&self) -> Result<Identity, AgentError>;

    /// Ask the agent to release its authorization.
    async fn disconnect(&self) -> Result<(), AgentError>;

    /// Sign a prepared message with the authorized identity.
    async fn sign_message(&self, message: &SignableMessage) -> Result<SignedMessage, AgentError>;
}

/// In-process agent backed by an Ed25519 keypair.
///
/// Stands in for a browser-extension wallet: approval of connect and signing
/// requests can be toggled to simulate the user accepting or rejecting them.
#[derive(Debug)]
pub struct LocalKeypairAgent {
    name: String,
    key: SigningKey,
    compatible: bool,
    authorized: AtomicBool,
    approve_connect: AtomicBool,
    approve_signing: AtomicBool,
    fail_disconnect: AtomicBool,
    signatures: AtomicU64,
}

impl LocalKeypairAgent {
    pub fn new(name: impl Into<String>, key: SigningKey) -> Self {
        Self {
            name: name.into(),
            key,
            compatible: true,
            authorized: AtomicBool::new(false),
            approve_connect: AtomicBool::new(true),
            approve_signing: AtomicBool::new(true),
            fail_disconnect: AtomicBool::new(false),
            signatures: AtomicU64::new(0),
        }
    }

    /// Agent with a fresh random keypair.
    pub fn generate(name: impl Into<String>) -> Self {
        Self::new(name, SigningKey::generate(&mut OsRng))
    }

    /// Agent with a deterministic keypair.
    pub fn from_seed(name: impl Into<String>, seed: [u8; 32]) -> Self {
        Self::new(name, SigningKey::from_bytes(&seed))
    }

    /// Mark the agent as present but not compatible with this client.
    pub fn incompatible(mut self) -> Self {
        self.compatible = false;
        self
    }

    pub fn identity(&self) -> Identity {
        Identity::from_bytes(self.key.verifying_key().to_bytes())
    }

    pub fn set_approve_connect(&self, approve: bool) {
        self.approve_connect.store(approve, Ordering::SeqCst);
    }

    pub fn set_approve_signing(&self, approve: bool) {
        self.approve_signing.store(approve, Ordering::SeqCst);
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    /// Number of messages signed so far.
    pub fn signatures_issued(&self) -> u64 {
        self.signatures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SigningAgent for LocalKeypairAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_compatible(&self) -> bool {
        self.compatible
    }

    async fn connect(&self) -> Result<Identity, AgentError> {
        if !self.approve_connect.load(Ordering::SeqCst) {
            return Err(AgentError::Rejected);
        }
        self.authorized.store(true, Ordering::SeqCst);
        Ok(self.identity())
    }

    async fn disconnect(&self) -> Result<(), AgentError> {
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(AgentError::Internal("disconnect request failed".to_owned()));
        }
        self.authorized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_message(&self, message: &SignableMessage) -> Result<SignedMessage, AgentError> {
        if !self.is_authorized() {
            return Err(AgentError::NotConnected);
        }
        if !self.approve_signing.load(Ordering::SeqCst) {
            return Err(AgentError::Rejected);
        }
        let signed =
            sign_message(message, &self.key).map_err(|e| AgentError::Internal(e.to_string()))?;
        self.signatures.fetch_add(1, Ordering::SeqCst);
        debug!(agent = %self.name, action = %message.action, "message signed");
        Ok(signed)
    }
}
