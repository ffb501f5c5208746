//! Agent backends
//!
//! An [`AgentBackend`] runs prompts against a conversational agent and keeps
//! the conversation addressable through a [`SessionId`]. Two implementations
//! exist: [`SubprocessBackend`] drives the local Claude Code CLI and
//! [`RemoteBackend`] talks to a remote session API. [`Backend`] selects one at
//! runtime from configuration.

pub mod remote;
pub mod subprocess;

use std::future::Future;

use crate::error::Result;
use crate::types::{BackendStatus, PromptReply, SessionId};

pub use remote::RemoteBackend;
pub use subprocess::SubprocessBackend;

/// Capability interface every agent backend implements
///
/// Dropping the future returned by [`AgentBackend::send`] must stop the
/// underlying work; the gateway relies on this for aborts and timeouts.
pub trait AgentBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Start a new conversation
    ///
    /// Returns `None` when the backend only assigns a handle with the first reply.
    ///
    /// # Errors
    /// Returns error if the backend cannot create a conversation
    fn create(&self) -> impl Future<Output = Result<Option<SessionId>>> + Send;

    /// Send a prompt, resuming `session` when given
    ///
    /// # Errors
    /// Returns [`BridgeError::SessionExpired`](crate::BridgeError::SessionExpired)
    /// (or an error recognised by
    /// [`is_session_expired`](crate::BridgeError::is_session_expired)) when the
    /// conversation no longer exists, and other errors for any other failure
    fn send(
        &self,
        session: Option<&SessionId>,
        prompt: &str,
    ) -> impl Future<Output = Result<PromptReply>> + Send;

    /// Ask the backend to stop work on `session`
    ///
    /// # Errors
    /// Returns error if the cancellation request fails
    fn abort(&self, session: &SessionId) -> impl Future<Output = Result<()>> + Send;

    /// Report live status for `session`, if the backend supports it
    ///
    /// # Errors
    /// Returns error if the status request fails
    fn inspect(
        &self,
        session: &SessionId,
    ) -> impl Future<Output = Result<Option<BackendStatus>>> + Send;

    /// Release backend-side resources held for `session`
    ///
    /// # Errors
    /// Returns error if cleanup fails
    fn destroy(&self, session: &SessionId) -> impl Future<Output = Result<()>> + Send;
}

/// Backend chosen by configuration
pub enum Backend {
    /// Local Claude Code CLI
    Subprocess(SubprocessBackend),
    /// Remote session API
    Remote(RemoteBackend),
}

impl AgentBackend for Backend {
    fn name(&self) -> &'static str {
        match self {
            Self::Subprocess(backend) => backend.name(),
            Self::Remote(backend) => backend.name(),
        }
    }

    async fn create(&self) -> Result<Option<SessionId>> {
        match self {
            Self::Subprocess(backend) => backend.create().await,
            Self::Remote(backend) => backend.create().await,
        }
    }

    async fn send(&self, session: Option<&SessionId>, prompt: &str) -> Result<PromptReply> {
        match self {
            Self::Subprocess(backend) => backend.send(session, prompt).await,
            Self::Remote(backend) => backend.send(session, prompt).await,
        }
    }

    async fn abort(&self, session: &SessionId) -> Result<()> {
        match self {
            Self::Subprocess(backend) => backend.abort(session).await,
            Self::Remote(backend) => backend.abort(session).await,
        }
    }

    async fn inspect(&self, session: &SessionId) -> Result<Option<BackendStatus>> {
        match self {
            Self::Subprocess(backend) => backend.inspect(session).await,
            Self::Remote(backend) => backend.inspect(session).await,
        }
    }

    async fn destroy(&self, session: &SessionId) -> Result<()> {
        match self {
            Self::Subprocess(backend) => backend.destroy(session).await,
            Self::Remote(backend) => backend.destroy(session).await,
        }
    }
}
