//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! The stream is split once: the read half serves [`Transport::recv`], the
//! write half serves sends, pings and close. Pongs are matched to pending
//! pings by the reader.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::{Connector, Transport};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WsConnector
// ============================================================================

/// Opens [`WsTransport`]s with `tokio_tungstenite::connect_async`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Arc<dyn Transport>> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("{url}: {e}")))?;

        debug!(url, status = %response.status(), "WebSocket connection established");

        Ok(Arc::new(WsTransport::new(ws_stream)))
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// A connected WebSocket.
pub struct WsTransport {
    /// Write half.
    sink: AsyncMutex<SplitSink<WsStream, Message>>,
    /// Read half.
    stream: AsyncMutex<SplitStream<WsStream>>,
    /// Pings waiting for a pong.
    pongs: Mutex<Vec<oneshot::Sender<()>>>,
}

impl WsTransport {
    /// Wraps an established WebSocket stream.
    #[must_use]
    pub fn new(ws_stream: WsStream) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            sink: AsyncMutex::new(sink),
            stream: AsyncMutex::new(stream),
            pongs: Mutex::new(Vec::new()),
        }
    }

    /// Wakes every ping waiting for a pong.
    fn resolve_pongs(&self) {
        for waiter in self.pongs.lock().drain(..) {
            let _ = waiter.send(());
        }
    }

    /// Fails every ping waiting for a pong.
    fn abandon_pongs(&self) {
        self.pongs.lock().clear();
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, text: String) -> Result<()> {
        self.sink.lock().await.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&self) -> Option<Result<String>> {
        let mut stream = self.stream.lock().await;

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),

                Some(Ok(Message::Binary(data))) => {
                    return Some(
                        String::from_utf8(data.to_vec())
                            .map_err(|e| Error::protocol(format!("Non UTF-8 binary frame: {e}"))),
                    );
                }

                Some(Ok(Message::Pong(_))) => {
                    trace!("Pong received");
                    self.resolve_pongs();
                }

                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by remote");
                    self.abandon_pongs();
                    return None;
                }

                // Pings are answered by tungstenite itself
                Some(Ok(_)) => {}

                Some(Err(e)) => {
                    self.abandon_pongs();
                    return Some(Err(e.into()));
                }

                None => {
                    debug!("WebSocket stream ended");
                    self.abandon_pongs();
                    return None;
                }
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.pongs.lock().push(tx);

        self.sink
            .lock()
            .await
            .send(Message::Ping(Default::default()))
            .await?;

        rx.await.map_err(|_| Error::ConnectionClosed)
    }

    async fn close(&self) -> Result<()> {
        self.sink.lock().await.close().await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::time::timeout;

    /// Echo server that answers text frames and lets tungstenite answer pings.
    async fn echo_server() -> SocketAddr {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message
                    && ws.send(Message::Text(text)).await.is_err()
                {
                    break;
                }
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let addr = echo_server().await;
        let transport = WsConnector
            .connect(&format!("ws://{addr}"))
            .await
            .expect("connect");

        transport.send("hello".to_string()).await.expect("send");
        let echoed = timeout(Duration::from_secs(5), transport.recv())
            .await
            .expect("no timeout")
            .expect("frame")
            .expect("text");

        assert_eq!(echoed, "hello");
        transport.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_ping_resolves_while_reading() {
        let addr = echo_server().await;
        let transport = WsConnector
            .connect(&format!("ws://{addr}"))
            .await
            .expect("connect");

        let reader = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move { transport.recv().await })
        };

        timeout(Duration::from_secs(5), transport.ping())
            .await
            .expect("pong in time")
            .expect("pong");

        transport.send("done".to_string()).await.expect("send");
        let frame = timeout(Duration::from_secs(5), reader)
            .await
            .expect("no timeout")
            .expect("join");
        assert_eq!(frame.expect("frame").expect("text"), "done");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let result = WsConnector.connect(&format!("ws://{addr}")).await;
        assert!(matches!(result, Err(Error::Connection { .. })));
    }
}
