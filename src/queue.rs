//! Per-user operation queue
//!
//! [`UserQueue`] runs the operations enqueued for one user strictly one after
//! another, in the order [`UserQueue::enqueue`] was called. Different users
//! never wait on each other.
//!
//! Each user maps to the settled point of the last operation scheduled for them.
//! A new operation first waits for that point and then installs its own. The
//! settled point fires when the operation finishes, fails, panics or is dropped,
//! so one bad operation never wedges the user's queue.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Future that resolves once an operation has settled
type Settled = Shared<BoxFuture<'static, ()>>;

/// Strict FIFO execution of async operations per user
#[derive(Clone, Default)]
pub struct UserQueue {
    chains: Arc<Mutex<HashMap<String, Settled>>>,
}

impl UserQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `operation` after everything already enqueued for `user_id`
    ///
    /// The position in the user's queue is taken when this method is called, not
    /// when the returned future is first polled. The returned future resolves to
    /// the operation's output once it has run.
    pub fn enqueue<F, Fut, T>(
        &self,
        user_id: &str,
        operation: F,
    ) -> impl Future<Output = T> + Send + use<F, Fut, T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (settled_tx, settled_rx) = oneshot::channel::<()>();
        let settled: Settled = async move {
            // Err means the operation was dropped; the chain moves on either way.
            let _ = settled_rx.await;
        }
        .boxed()
        .shared();

        let previous = self
            .chains
            .lock()
            .insert(user_id.to_string(), settled.clone());

        let chains = Arc::clone(&self.chains);
        let user_id = user_id.to_string();

        async move {
            let _guard = SettleGuard {
                chains,
                user_id,
                settled,
                settled_tx: Some(settled_tx),
            };

            if let Some(previous) = previous {
                previous.await;
            }

            operation().await
        }
    }

    /// Number of users with queued or running operations
    #[must_use]
    pub fn pending_users(&self) -> usize {
        self.chains.lock().len()
    }
}

/// Marks an operation as settled when it completes or is dropped
struct SettleGuard {
    chains: Arc<Mutex<HashMap<String, Settled>>>,
    user_id: String,
    settled: Settled,
    settled_tx: Option<oneshot::Sender<()>>,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        {
            let mut chains = self.chains.lock();
            // Only the tail may be pruned; a newer operation owns the entry otherwise.
            if chains
                .get(&self.user_id)
                .is_some_and(|tail| tail.ptr_eq(&self.settled))
            {
                chains.remove(&self.user_id);
            }
        }
        if let Some(tx) = self.settled_tx.take() {
            let _ = tx.send(());
        }
    }
}
