//! Appliance client.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Connection, request primitives, mirror and command catalogue |
//! | [`ClientBuilder`] | Fluent configuration |
//! | [`MirrorSnapshot`] | Copy of the mirrored appliance state |
//! | [`ConnectionState`] | Lifecycle phase |
//!
//! # Architecture
//!
//! ```text
//!                 ┌────────────── lifecycle task ──────────────┐
//!  connect() ───► │ connect → handshake → baseline → running   │
//!                 └──────┬───────────────────────┬─────────────┘
//!                        │                       │
//!                 ┌──────▼──────┐          ┌─────▼─────┐
//!                 │ dispatcher  │          │ keepalive │
//!                 └──────┬──────┘          └───────────┘
//!            pending ◄───┴───► per-subscription workers → consumers
//! ```
//!
//! # Example
//!
//! ```no_run
//! use webos_remote::Client;
//!
//! # async fn example() -> webos_remote::Result<()> {
//! let client = Client::new("192.168.1.20")?;
//! client
//!     .register_observer(|snapshot| async move {
//!         println!("app: {:?}", snapshot.current_app_id);
//!     })
//!     .await;
//!
//! client.connect().await?;
//! client.launch_app("youtube.leanback.v4").await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Typed command catalogue.
pub mod commands;

/// Configuration and builder.
pub mod config;

/// Client handle and accessors.
pub mod core;

/// Inbound frame routing.
mod dispatcher;

/// Pairing handshake.
mod handshake;

/// Pointer input socket.
pub mod input;

/// Control socket keepalive.
mod keepalive;

/// Connection lifecycle.
pub mod lifecycle;

/// Request and subscribe primitives.
pub mod request;

/// Per-connection routing tables.
mod session;

/// Mirrored appliance state.
pub mod state;


// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Client;
pub use config::{ClientBuilder, ClientConfig};
pub use lifecycle::ConnectionState;
pub use request::Callback;
pub use state::{MirrorField, MirrorSnapshot, Observer, PowerState};
