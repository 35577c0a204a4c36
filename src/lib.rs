//! webOS remote - Async remote-control client for webOS appliances.
//!
//! This library talks to a webOS appliance (typically a TV) over its JSON
//! WebSocket control protocol: it pairs, keeps the connection alive, mirrors
//! the appliance state and exposes the command catalogue.
//!
//! # Architecture
//!
//! - **Control socket**: one multiplexed WebSocket carrying requests,
//!   subscriptions and their replies, correlated by id
//! - **Input socket**: a second socket, opened on demand, for buttons and
//!   pointer events
//!
//! Key design principles:
//!
//! - One owned lifecycle task per connection; teardown always runs to completion
//! - Inbound frames are routed without running consumer code on the read loop
//! - Each subscription's updates reach its consumer strictly in order
//! - The mirrored state is reset on disconnect; the client never reconnects on its own
//!
//! # Quick Start
//!
//! ```no_run
//! use webos_remote::{Button, Client, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::new("192.168.1.20")?;
//!
//!     // First connect shows a pairing prompt on the appliance
//!     client.connect().await?;
//!     println!("on: {}, app: {:?}", client.is_on(), client.current_app_id());
//!
//!     client.set_volume(10).await?;
//!     client.button(Button::Home).await?;
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`], configuration, state mirror, command catalogue |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types and service paths |
//! | [`storage`] | Pairing key persistence |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Appliance client.
///
/// - [`Client`] - connection, requests, mirror and commands
/// - [`ClientBuilder`] - fluent configuration
/// - [`MirrorSnapshot`] - copy of the mirrored state
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire protocol message types.
///
/// Frame structures of the control and input sockets, and the service paths
/// of the command catalogue.
pub mod protocol;

/// Pairing key persistence.
pub mod storage;

/// WebSocket transport layer.
///
/// [`Transport`](transport::Transport) and [`Connector`](transport::Connector)
/// seams plus the `tokio-tungstenite` implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    Callback, Client, ClientBuilder, ClientConfig, ConnectionState, MirrorField, MirrorSnapshot,
    Observer, PowerState,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, ObserverId};

// Protocol types
pub use protocol::{Button, InputEvent, RequestType};

// Storage types
pub use storage::{FileKeyStore, KeyStore, MemoryKeyStore};
