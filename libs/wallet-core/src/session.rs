//! Signing Session: connect/disconnect lifecycle
//!
//! Two states: `Disconnected` (initial) and `Connected`. The identity is held
//! in a `watch` channel so that every lifecycle call replaces it atomically
//! and observers (the UI collaborator) can subscribe to changes.

use std::sync::Arc;

use tokio::sync::watch;
use token_types::errors::{Precondition, WalletError};
use token_types::ids::Identity;
use tracing::{info, warn};

use crate::agent::{AgentError, SigningAgent};

/// Lifecycle state of a signing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected(Identity),
}

/// Tracks whether a signing agent has authorized this client.
pub struct SigningSession {
    agent: Option<Arc<dyn SigningAgent>>,
    identity: watch::Sender<Option<Identity>>,
}

impl SigningSession {
    /// Create a session for the agent found in the environment, if any.
    pub fn new(agent: Option<Arc<dyn SigningAgent>>) -> Self {
        let (identity, _) = watch::channel(None);
        Self { agent, identity }
    }

    /// Session with an injected agent.
    pub fn with_agent(agent: Arc<dyn SigningAgent>) -> Self {
        Self::new(Some(agent))
    }

    /// Session in an environment with no signing agent.
    pub fn without_agent() -> Self {
        Self::new(None)
    }

    pub fn identity(&self) -> Option<Identity> {
        *self.identity.borrow()
    }

    pub fn connected(&self) -> bool {
        self.identity.borrow().is_some()
    }

    pub fn state(&self) -> SessionState {
        match self.identity() {
            Some(identity) => SessionState::Connected(identity),
            None => SessionState::Disconnected,
        }
    }

    /// Subscribe to identity changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    /// The injected agent, if one is present.
    pub fn agent(&self) -> Option<Arc<dyn SigningAgent>> {
        self.agent.clone()
    }

    /// Request authorization from the signing agent.
    ///
    /// On failure the previous state is left untouched.
    pub async fn connect(&self) -> Result<Identity, WalletError> {
        let agent = match &self.agent {
            Some(agent) if agent.is_compatible() => agent,
            Some(agent) => {
                warn!(agent = %agent.name(), "signing agent is not compatible");
                return Err(WalletError::ProviderUnavailable);
            }
            None => {
                warn!("no signing agent present");
                return Err(WalletError::ProviderUnavailable);
            }
        };

        let identity = agent.connect().await.map_err(|e| {
            warn!(agent = %agent.name(), error = %e, "authorization request failed");
            WalletError::AuthorizationDenied(e.to_string())
        })?;

        self.identity.send_replace(Some(identity));
        info!(agent = %agent.name(), %identity, "signing session connected");
        Ok(identity)
    }

    /// Release the authorization. Always ends Disconnected.
    ///
    /// An agent-side failure is returned after local state has been cleared.
    pub async fn disconnect(&self) -> Result<(), WalletError> {
        let agent_result: Result<(), AgentError> = match &self.agent {
            Some(agent) => agent.disconnect().await,
            None => Ok(()),
        };

        let previous = self.identity.send_replace(None);
        if previous.is_some() {
            info!("signing session disconnected");
        }

        agent_result.map_err(|e| {
            warn!(error = %e, "signing agent failed to disconnect");
            WalletError::DisconnectFailed(e.to_string())
        })
    }

    /// Identity of the active session, or `PreconditionNotMet`.
    pub(crate) fn require_connected(
        &self,
    ) -> Result<(Identity, Arc<dyn SigningAgent>), WalletError> {
        let identity = self.identity().ok_or(Precondition::NotConnected)?;
        let agent = self.agent.clone().ok_or(Precondition::NotConnected)?;
        Ok((identity, agent))
    }
}

impl std::fmt::Debug for SigningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSession")
            .field("agent", &self.agent.as_ref().map(|a| a.name().to_owned()))
            .field("identity", &self.identity())
            .finish()
    }
}
