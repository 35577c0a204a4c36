//! Inbound frame routing.
//!
//! The dispatcher is the only reader of the control socket. It never runs
//! consumer code itself: subscription frames are queued to a per-subscription
//! worker, reply frames resolve their pending request.
//!
//! ```text
//! transport ──► dispatcher ──┬──► queue(id 3) ──► worker ──► consumer
//!                            ├──► queue(id 7) ──► worker ──► consumer
//!                            └──► pending(id 12) ──► request()
//! ```
//!
//! Workers run independently of each other; each delivers its frames
//! strictly in arrival order, one at a time.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::Reply;

use super::core::Client;
use super::request::Consumer;
use super::session::Session;

// ============================================================================
// Types
// ============================================================================

/// Queues feeding the delivery workers, keyed by subscription id.
type QueueMap = FxHashMap<CommandId, mpsc::UnboundedSender<Reply>>;

// ============================================================================
// Dispatcher
// ============================================================================

/// Reads the control socket until it closes or `cancel` fires.
///
/// # Errors
///
/// - transport read errors
/// - [`Error::Protocol`] for a frame that is not a JSON object
pub(crate) async fn run(
    client: Client,
    session: Arc<Session>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut queues = QueueMap::default();
    let mut workers = JoinSet::new();

    debug!("Dispatcher started");

    let result = loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break Ok(()),
            frame = session.transport().recv() => frame,
        };

        let text = match frame {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                error!(error = %e, "Control socket read failed");
                break Err(e);
            }
            None => {
                debug!("Control socket closed");
                break Ok(());
            }
        };

        let reply = match Reply::parse(&text) {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Malformed frame");
                break Err(Error::protocol(format!("Malformed frame: {e}")));
            }
        };

        route(&client, &session, &mut queues, &mut workers, reply);

        // Reap workers that stopped on their own
        while let Some(outcome) = workers.try_join_next() {
            if let Err(e) = outcome
                && e.is_panic()
            {
                warn!(error = %e, "Delivery worker panicked");
            }
        }
    };

    drop(queues);
    workers.shutdown().await;

    debug!("Dispatcher stopped");
    result
}

/// Routes one frame to its subscription queue or pending request.
fn route(
    client: &Client,
    session: &Arc<Session>,
    queues: &mut QueueMap,
    workers: &mut JoinSet<()>,
    reply: Reply,
) {
    let Some(id) = reply.command_id() else {
        trace!(?reply.id, "Frame without numeric id dropped");
        return;
    };

    if let Some(consumer) = session.consumer(id) {
        let queue = queues.entry(id).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            workers.spawn(deliver_in_order(
                client.clone(),
                Arc::clone(session),
                id,
                consumer,
                rx,
            ));
            trace!(%id, "Delivery worker started");
            tx
        });

        // A stopped worker drops the rest of its subscription
        if queue.send(reply).is_err() {
            trace!(%id, "Update for stopped subscription dropped");
        }
        return;
    }

    if let Some(waiter) = session.take_pending(id) {
        let _ = waiter.send(Ok(reply));
        return;
    }

    trace!(%id, "Unmatched frame dropped");
}

// ============================================================================
// Delivery Worker
// ============================================================================

/// Delivers one subscription's frames to its consumer, in order.
///
/// The subscription's pending request is resolved after the first frame has
/// been consumed. An error first frame resolves it without reaching the
/// consumer; a consumer error rejects it. Either way the worker stops.
async fn deliver_in_order(
    client: Client,
    session: Arc<Session>,
    id: CommandId,
    consumer: Consumer,
    mut queue: mpsc::UnboundedReceiver<Reply>,
) {
    let mut first = true;

    while let Some(reply) = queue.recv().await {
        if first && reply.is_error() {
            debug!(%id, error = ?reply.error, "Subscription refused");
            resolve(&session, id, Ok(reply));
            return;
        }
        first = false;

        let payload = reply.payload.clone().unwrap_or(Value::Null);
        if let Err(e) = consumer.deliver(&client, payload).await {
            warn!(%id, error = %e, "Subscription consumer failed");
            resolve(&session, id, Err(e));
            return;
        }

        resolve(&session, id, Ok(reply));
    }
}

/// Resolves the subscription's pending request, if still waiting.
fn resolve(session: &Session, id: CommandId, outcome: Result<Reply>) {
    if let Some(waiter) = session.take_pending(id) {
        let _ = waiter.send(outcome);
    }
}

// ============================================================================
// Tests
// ============================================================================
