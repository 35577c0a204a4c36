//! Per-connection routing state.
//!
//! A [`Session`] is created once the handshake succeeds and lives until the
//! connection is torn down. It owns the control transport, the routing tables
//! and the pointer input socket slot. Tables are never reused across
//! connections.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{Command, Reply};
use crate::transport::Transport;

use super::request::Consumer;

// ============================================================================
// Types
// ============================================================================

/// Pending requests keyed by correlation id.
type PendingMap = FxHashMap<CommandId, oneshot::Sender<Result<Reply>>>;

/// Subscription consumers keyed by correlation id.
type ConsumerMap = FxHashMap<CommandId, Consumer>;

// ============================================================================
// Session
// ============================================================================

/// Routing state of one live connection.
pub(crate) struct Session {
    /// Control socket.
    transport: Arc<dyn Transport>,
    /// Requests awaiting their reply (or their first subscription frame).
    pending: Mutex<PendingMap>,
    /// Active subscriptions.
    subscriptions: Mutex<ConsumerMap>,
    /// Pointer input socket, opened on first use.
    input: AsyncMutex<Option<Arc<dyn Transport>>>,
}

impl Session {
    /// Creates a session with empty tables.
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            pending: Mutex::new(PendingMap::default()),
            subscriptions: Mutex::new(ConsumerMap::default()),
            input: AsyncMutex::new(None),
        }
    }

    /// Returns the control transport.
    #[inline]
    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Returns the pointer input socket slot.
    #[inline]
    pub(crate) fn input(&self) -> &AsyncMutex<Option<Arc<dyn Transport>>> {
        &self.input
    }

    /// Serializes and sends a command frame.
    pub(crate) async fn send_command(&self, command: &Command) -> Result<()> {
        let text = serde_json::to_string(command)?;
        trace!(id = %command.id, uri = %command.uri, "Sending command");
        self.transport.send(text).await
    }

    // ========================================================================
    // Pending Requests
    // ========================================================================

    /// Registers a pending request.
    ///
    /// The entry is removed when the returned guard drops, whatever the exit
    /// path of the issuer.
    pub(crate) fn register_pending(
        &self,
        id: CommandId,
    ) -> (PendingGuard<'_>, oneshot::Receiver<Result<Reply>>) {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        (PendingGuard { session: self, id }, rx)
    }

    /// Removes and returns the waiter for `id`.
    #[inline]
    pub(crate) fn take_pending(&self, id: CommandId) -> Option<oneshot::Sender<Result<Reply>>> {
        self.pending.lock().remove(&id)
    }

    /// Number of requests awaiting a reply.
    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Rejects every pending request with [`Error::ConnectionClosed`].
    pub(crate) fn fail_pending(&self) {
        let waiters: Vec<_> = self.pending.lock().drain().collect();
        if waiters.is_empty() {
            return;
        }

        debug!(count = waiters.len(), "Failing pending requests");
        for (_, waiter) in waiters {
            let _ = waiter.send(Err(Error::ConnectionClosed));
        }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Registers the consumer for a subscription id.
    #[inline]
    pub(crate) fn register_consumer(&self, id: CommandId, consumer: Consumer) {
        self.subscriptions.lock().insert(id, consumer);
    }

    /// Returns the consumer registered for `id`.
    #[inline]
    pub(crate) fn consumer(&self, id: CommandId) -> Option<Consumer> {
        self.subscriptions.lock().get(&id).cloned()
    }

    /// Unregisters a subscription.
    #[inline]
    pub(crate) fn remove_subscription(&self, id: CommandId) {
        self.subscriptions.lock().remove(&id);
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Empties both routing tables.
    pub(crate) fn clear(&self) {
        self.pending.lock().clear();
        self.subscriptions.lock().clear();
    }

    /// Closes the input socket and the control socket, each within `limit`.
    ///
    /// A stuck input socket never keeps the control socket open.
    pub(crate) async fn close(&self, limit: Duration) {
        let input = async {
            match self.input.lock().await.take() {
                Some(input) => input.close().await,
                None => Ok(()),
            }
        };
        log_close("Input", timeout(limit, input).await);
        log_close("Control", timeout(limit, self.transport.close()).await);
    }
}

/// Logs the outcome of a time-boxed socket close.
pub(crate) fn log_close(socket: &str, outcome: std::result::Result<Result<()>, Elapsed>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(socket, error = %e, "Socket close failed"),
        Err(_) => debug!(socket, "Socket close timed out"),
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Removes a pending request entry on drop.
pub(crate) struct PendingGuard<'a> {
    session: &'a Session,
    id: CommandId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.session.pending.lock().remove(&self.id);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::mock;

    fn session() -> Session {
        let (transport, _end) = mock::pair();
        Session::new(transport)
    }

    #[test]
    fn test_guard_removes_entry() {
        let session = session();
        let id = CommandId::new(1);

        let (guard, _rx) = session.register_pending(id);
        assert_eq!(session.pending_count(), 1);

        drop(guard);
        assert_eq!(session.pending_count(), 0);
        assert!(session.take_pending(id).is_none());
    }

    #[tokio::test]
    async fn test_fail_pending_rejects_with_connection_closed() {
        let session = session();
        let (_guard, rx) = session.register_pending(CommandId::new(4));

        session.fail_pending();

        let result = rx.await.expect("resolved");
        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_closes_transport() {
        let (transport, _end) = mock::pair();
        let session = Session::new(Arc::clone(&transport) as Arc<dyn Transport>);

        session.close(Duration::from_millis(50)).await;

        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_close_with_busy_input_slot_still_closes_control_socket() {
        let (transport, _end) = mock::pair();
        let session = Arc::new(Session::new(Arc::clone(&transport) as Arc<dyn Transport>));

        // an input open in flight holds the slot
        let slot = session.input().lock().await;
        session.close(Duration::from_millis(20)).await;

        assert!(transport.is_closed());
        drop(slot);
    }
}
