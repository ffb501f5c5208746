//! Agent gateway
//!
//! [`AgentGateway`] owns the session store and the in-flight operations, and
//! runs every backend call under the configured timeout. It recovers once from
//! an expired conversation by starting a new one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::AgentBackend;
use crate::error::{BridgeError, Result};
use crate::types::identifiers::SessionId;
use crate::types::session::{PromptReply, SessionInfo};

use super::store::SessionStore;

/// Default bound on a single backend call (5 minutes)
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(300);

/// Handle to a user's running prompt
struct ActiveOperation {
    id: u64,
    token: CancellationToken,
    session_id: Option<SessionId>,
}

type ActiveMap = Mutex<HashMap<String, ActiveOperation>>;

/// Removes the user's active operation when the prompt ends or is dropped
struct ActiveGuard<'a> {
    active: &'a ActiveMap,
    user_id: &'a str,
    id: u64,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let mut active = self.active.lock();
        if active.get(self.user_id).is_some_and(|op| op.id == self.id) {
            active.remove(self.user_id);
        }
    }
}

/// Session-aware front of an [`AgentBackend`]
pub struct AgentGateway<B> {
    backend: Arc<B>,
    store: SessionStore,
    active: ActiveMap,
    next_operation: AtomicU64,
    timeout: Duration,
}

impl<B: AgentBackend + 'static> AgentGateway<B> {
    /// Create a gateway over `backend` with the default timeout
    pub fn new(backend: B) -> Self {
        Self::with_timeout(backend, DEFAULT_BACKEND_TIMEOUT)
    }

    /// Create a gateway whose backend calls are bounded by `timeout`
    pub fn with_timeout(backend: B, timeout: Duration) -> Self {
        Self {
            backend: Arc::new(backend),
            store: SessionStore::new(),
            active: Mutex::new(HashMap::new()),
            next_operation: AtomicU64::new(0),
            timeout,
        }
    }

    /// The wrapped backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The session store
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Return the user's conversation handle, creating a conversation if needed
    ///
    /// # Errors
    /// Returns error if the backend fails to create a conversation
    pub async fn get_or_create_session(&self, user_id: &str) -> Result<Option<SessionId>> {
        Ok(self.open_session(user_id).await?.0)
    }

    /// Send a prompt on the user's conversation
    ///
    /// When the backend reports the conversation gone, the local session is
    /// dropped and the prompt is retried once on a new conversation. A second
    /// expiry is returned as an error.
    ///
    /// # Errors
    /// Returns the backend error, [`BridgeError::Timeout`] or
    /// [`BridgeError::Aborted`] when the user cancelled the prompt
    pub async fn send_prompt(&self, user_id: &str, text: &str) -> Result<PromptReply> {
        match self.attempt(user_id, text).await {
            Err(e) if e.is_session_expired() => {
                log::warn!("Session for {user_id} expired ({e}); retrying on a new conversation");
                self.store.remove(user_id);
                self.attempt(user_id, text).await
            }
            outcome => outcome,
        }
    }

    /// Cancel the user's running prompt
    ///
    /// Returns `false` when nothing was running. Queued prompts are not touched.
    pub async fn abort(&self, user_id: &str) -> bool {
        let Some(operation) = self.active.lock().remove(user_id) else {
            return false;
        };

        operation.token.cancel();
        log::info!("Aborted running prompt for {user_id}");

        if let Some(ref session) = operation.session_id
            && let Err(e) = self.bounded(self.backend.abort(session)).await
        {
            log::debug!("Backend abort for {session} failed: {e}");
        }
        true
    }

    /// Forget the user's session and clean it up on the backend in the background
    ///
    /// Returns whether a session existed. Backend cleanup failures are logged only.
    pub fn reset(&self, user_id: &str) -> bool {
        let Some(session) = self.store.remove(user_id) else {
            return false;
        };
        log::info!("Reset session for {user_id}");

        if let Some(session_id) = session.session_id {
            let backend = Arc::clone(&self.backend);
            let timeout = self.timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, backend.destroy(&session_id)).await {
                    Ok(Ok(())) => log::debug!("Destroyed backend session {session_id}"),
                    Ok(Err(e)) => log::debug!("Backend cleanup of {session_id} failed: {e}"),
                    Err(_) => log::debug!("Backend cleanup of {session_id} timed out"),
                }
            });
        }
        true
    }

    /// Describe the user's session, including live backend status when available
    pub async fn describe(&self, user_id: &str) -> Option<SessionInfo> {
        let session = self.store.get(user_id)?;
        let busy = self.is_busy(user_id);

        let backend_status = match session.session_id {
            Some(ref id) => match self.bounded(self.backend.inspect(id)).await {
                Ok(status) => status,
                Err(e) => {
                    log::debug!("Inspecting {id} failed: {e}");
                    None
                }
            },
            None => None,
        };

        Some(SessionInfo {
            session_id: session.session_id,
            total_cost: session.total_cost,
            prompt_count: session.prompt_count,
            created_at: session.created_at,
            last_active: session.last_active,
            busy,
            backend_status,
        })
    }

    /// Accumulated spend for the user, if a session exists
    #[must_use]
    pub fn total_cost(&self, user_id: &str) -> Option<f64> {
        self.store.get(user_id).map(|session| session.total_cost)
    }

    /// Whether a prompt is running for the user
    #[must_use]
    pub fn is_busy(&self, user_id: &str) -> bool {
        self.active.lock().contains_key(user_id)
    }

    async fn open_session(&self, user_id: &str) -> Result<(Option<SessionId>, u64)> {
        if let Some(session) = self.store.get(user_id) {
            return Ok((session.session_id, session.epoch));
        }

        let created = self.bounded(self.backend.create()).await?;
        let session = self.store.insert_if_absent(user_id, created.clone());

        if let Some(created) = created
            && session.session_id.as_ref() != Some(&created)
        {
            // Lost a race with another caller; release the spare conversation.
            let backend = Arc::clone(&self.backend);
            tokio::spawn(async move {
                let _ = backend.destroy(&created).await;
            });
        }

        Ok((session.session_id, session.epoch))
    }

    async fn attempt(&self, user_id: &str, text: &str) -> Result<PromptReply> {
        let (session_id, epoch) = self.open_session(user_id).await?;

        let id = self.next_operation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.active.lock().insert(
            user_id.to_string(),
            ActiveOperation {
                id,
                token: token.clone(),
                session_id: session_id.clone(),
            },
        );
        let _guard = ActiveGuard {
            active: &self.active,
            user_id,
            id,
        };

        let reply = tokio::select! {
            biased;
            () = token.cancelled() => Err(BridgeError::Aborted),
            result = self.bounded(self.backend.send(session_id.as_ref(), text)) => result,
        }?;

        self.store
            .record(user_id, epoch, reply.session_id.clone(), reply.cost_usd);
        Ok(reply)
    }

    /// Run a backend call under the gateway timeout
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(BridgeError::timeout(format!(
                    "agent backend did not answer within {}s",
                    self.timeout.as_secs()
                )))
            })
    }
}
