//! SSAP protocol message types.
//!
//! This module defines the JSON frames exchanged with the appliance over the
//! control socket, plus the line-oriented frames of the pointer input socket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Command`] | Local → Appliance | `request` / `subscribe` frame |
//! | [`Reply`] | Appliance → Local | `response` / `registered` / `error` frame |
//! | registration | Local → Appliance | Pairing handshake (`register`) |
//! | [`InputEvent`] | Local → Appliance | Pointer socket event |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoints` | Service paths of the command catalogue |
//! | `handshake` | Registration frame and pairing replies |
//! | `input` | Pointer input socket events and buttons |
//! | `message` | Command and Reply types |

// ============================================================================
// Submodules
// ============================================================================

/// Service paths of the command catalogue.
pub mod endpoints;

/// Registration frame and pairing reply interpretation.
pub mod handshake;

/// Pointer input socket events.
pub mod input;

/// Command and Reply message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use handshake::RegistrationStep;
pub use input::{Button, InputEvent};
pub use message::{Command, Reply, ReplyType, RequestType, URI_SCHEME};
