//! In-memory transport for tests.
//!
//! [`pair`] returns a transport plus the far end of its channels. The far end
//! is either driven by hand or handed to [`spawn_appliance`], which answers
//! every command with a scripted responder.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::message::SERVICE_NOT_FOUND;

use super::{Connector, Transport};

// ============================================================================
// MockTransport
// ============================================================================

/// Channel-backed [`Transport`].
pub(crate) struct MockTransport {
    inbound: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    outbound: mpsc::UnboundedSender<String>,
    closed: CancellationToken,
    pings: AtomicUsize,
    answer_pings: AtomicBool,
}

/// Far end of a [`MockTransport`].
pub(crate) struct MockEnd {
    /// Frames pushed here are received by the transport.
    pub inbound: mpsc::UnboundedSender<String>,
    /// Frames sent by the transport.
    pub outbound: mpsc::UnboundedReceiver<String>,
    /// Cancelled when the transport is closed; cancel it to drop the link.
    pub closed: CancellationToken,
}

/// Creates a connected transport and its far end.
pub(crate) fn pair() -> (Arc<MockTransport>, MockEnd) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();

    let transport = Arc::new(MockTransport {
        inbound: AsyncMutex::new(inbound_rx),
        outbound: outbound_tx,
        closed: closed.clone(),
        pings: AtomicUsize::new(0),
        answer_pings: AtomicBool::new(true),
    });

    let end = MockEnd {
        inbound: inbound_tx,
        outbound: outbound_rx,
        closed,
    };

    (transport, end)
}

impl MockTransport {
    /// Number of pings sent so far.
    pub(crate) fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Makes pings go unanswered until the transport closes.
    pub(crate) fn ignore_pings(&self) {
        self.answer_pings.store(false, Ordering::SeqCst);
    }

    /// Returns `true` once the transport was closed.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, text: String) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::ConnectionClosed);
        }
        self.outbound.send(text).map_err(|_| Error::ConnectionClosed)
    }

    async fn recv(&self) -> Option<Result<String>> {
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            () = self.closed.cancelled() => None,
            frame = inbound.recv() => frame.map(Ok),
        }
    }

    async fn ping(&self) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.answer_pings.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.closed.cancelled().await;
        Err(Error::ConnectionClosed)
    }

    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        Ok(())
    }
}

// ============================================================================
// MockConnector
// ============================================================================

/// [`Connector`] handing out pre-built transports in order.
#[derive(Default)]
pub(crate) struct MockConnector {
    transports: Mutex<VecDeque<Arc<dyn Transport>>>,
    urls: Mutex<Vec<String>>,
}

impl MockConnector {
    /// Queues a transport for the next `connect`.
    pub(crate) fn push(&self, transport: Arc<dyn Transport>) {
        self.transports.lock().push_back(transport);
    }

    /// URLs connected to so far.
    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Transport>> {
        self.urls.lock().push(url.to_string());
        self.transports
            .lock()
            .pop_front()
            .ok_or_else(|| Error::connection(format!("{url}: no transport queued")))
    }
}

// ============================================================================
// Scripted Appliance
// ============================================================================

/// Handle on a running scripted appliance.
pub(crate) struct Appliance {
    sent: Arc<Mutex<Vec<(Instant, Value)>>>,
    /// Pushes unsolicited frames to the client.
    pub inbound: mpsc::UnboundedSender<String>,
    /// Closes the link from the appliance side.
    pub closed: CancellationToken,
}

impl Appliance {
    /// Every frame received from the client.
    pub(crate) fn frames(&self) -> Vec<Value> {
        self.sent.lock().iter().map(|(_, frame)| frame.clone()).collect()
    }

    /// Frames received for one `ssap://` service path, with arrival time.
    pub(crate) fn frames_for(&self, service: &str) -> Vec<(Instant, Value)> {
        let uri = format!("ssap://{service}");
        self.sent
            .lock()
            .iter()
            .filter(|(_, frame)| frame["uri"] == uri.as_str())
            .cloned()
            .collect()
    }

    /// Id of the first frame received for `service`.
    pub(crate) fn id_for(&self, service: &str) -> Option<u64> {
        self.frames_for(service)
            .first()
            .and_then(|(_, frame)| frame["id"].as_u64())
    }

    /// Pushes a frame to the client.
    pub(crate) fn push(&self, frame: Value) {
        let _ = self.inbound.send(frame.to_string());
    }
}

/// Runs an appliance on `end` that answers every frame with `responder`.
///
/// Replies without an `id` get the id of the frame they answer.
pub(crate) fn spawn_appliance<F>(end: MockEnd, mut responder: F) -> Appliance
where
    F: FnMut(&Value) -> Vec<Value> + Send + 'static,
{
    let MockEnd {
        inbound,
        mut outbound,
        closed,
    } = end;

    let sent = Arc::new(Mutex::new(Vec::new()));
    let appliance = Appliance {
        sent: Arc::clone(&sent),
        inbound: inbound.clone(),
        closed: closed.clone(),
    };

    tokio::spawn(async move {
        loop {
            let text = tokio::select! {
                () = closed.cancelled() => break,
                text = outbound.recv() => match text {
                    Some(text) => text,
                    None => break,
                },
            };

            let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            sent.lock().push((Instant::now(), frame.clone()));

            for mut reply in responder(&frame) {
                if reply.get("id").is_none() {
                    reply["id"] = frame["id"].clone();
                }
                if inbound.send(reply.to_string()).is_err() {
                    return;
                }
            }
        }
    });

    appliance
}

/// Replies of a plain appliance: pairing succeeds, every subscription is
/// unsupported and every request succeeds with an empty payload.
pub(crate) fn default_reply(frame: &Value) -> Vec<Value> {
    match frame["type"].as_str() {
        Some("register") => vec![json!({
            "type": "registered",
            "payload": {"client-key": "stored-key"}
        })],
        Some("subscribe") => vec![json!({
            "type": "error",
            "error": SERVICE_NOT_FOUND,
            "payload": {}
        })],
        _ => vec![json!({"type": "response", "payload": {"returnValue": true}})],
    }
}
