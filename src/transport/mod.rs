//! Message transport layer.
//!
//! The client never touches sockets directly. It talks to the appliance
//! through a [`Transport`]: a message-oriented duplex channel with ping
//! support. A [`Connector`] opens transports by URL and is used for both the
//! control socket and the pointer input socket.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)   │                              │  Appliance      │
//! │                  │         WebSocket            │                 │
//! │  Connector       │◄────────────────────────────►│  SSAP server    │
//! │  → Transport     │      ws://address:3000       │  (port 3000)    │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | `tokio-tungstenite` implementation |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport backed by `tokio-tungstenite`.
pub mod websocket;

/// In-memory transport for tests.
#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use websocket::{WsConnector, WsTransport};

// ============================================================================
// Traits
// ============================================================================

/// An open, message-oriented duplex channel.
///
/// All methods take `&self` so one transport can be shared by the inbound
/// reader, the keepalive monitor and request senders at the same time.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one text frame.
    async fn send(&self, text: String) -> Result<()>;

    /// Receives the next text frame.
    ///
    /// Returns `None` once the channel is closed. Must be cancel-safe: the
    /// inbound reader races it against shutdown.
    async fn recv(&self) -> Option<Result<String>>;

    /// Sends a ping and resolves when the matching pong arrives.
    ///
    /// Pongs are only observed while someone is inside [`recv`](Self::recv).
    async fn ping(&self) -> Result<()>;

    /// Closes the channel.
    async fn close(&self) -> Result<()>;
}

/// Opens transports by URL.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `url`.
    ///
    /// The caller bounds the attempt with its own timeout.
    async fn connect(&self, url: &str) -> Result<Arc<dyn Transport>>;
}
