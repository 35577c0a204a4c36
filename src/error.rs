//! Error types for the webOS remote client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use webos_remote::{Client, Error, Result};
//!
//! async fn example(client: &Client) -> Result<()> {
//!     match client.request("tv/getCurrentChannel", None).await {
//!         Ok(channel) => println!("{channel}"),
//!         Err(Error::ServiceNotFound { .. }) => println!("no tuner"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Pairing | [`Error::PairingFailure`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Protocol | [`Error::Protocol`], [`Error::ServiceNotFound`], [`Error::Command`], [`Error::CommandFailure`] |
//! | Execution | [`Error::Timeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! The error is [`Clone`]: one failed connection attempt is reported to every
//! caller waiting on it, so external sources are shared behind [`Arc`].

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::Reply;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to an operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Pairing Errors
    // ========================================================================
    /// The registration handshake did not yield a client key.
    ///
    /// Either the pairing prompt on the appliance was not accepted or the
    /// appliance rejected the stored key.
    #[error("Pairing failed: {message}")]
    PairingFailure {
        /// Description of the pairing failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed while an operation was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Command issued while no connection is open.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed or payload-less reply.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The appliance does not provide the invoked service or method.
    ///
    /// Callers may treat this as "feature unsupported" and carry on.
    #[error("Service not found: {message}")]
    ServiceNotFound {
        /// Error text reported by the appliance.
        message: String,
    },

    /// The appliance reported an error for the command.
    #[error("Command error: {}", .reply.error.as_deref().unwrap_or("unknown error"))]
    Command {
        /// Full reply, for diagnostics.
        reply: Box<Reply>,
    },

    /// The appliance accepted the command but reported it did not succeed.
    #[error("Command failed: {message}")]
    CommandFailure {
        /// Why the reply counts as a failure.
        message: String,
        /// Full reply, for diagnostics.
        reply: Box<Reply>,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[source] Arc<IoError>),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[source] Arc<serde_json::Error>),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Arc<WsError>),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

impl From<WsError> for Error {
    fn from(err: WsError) -> Self {
        Self::WebSocket(Arc::new(err))
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a pairing failure.
    #[inline]
    pub fn pairing(message: impl Into<String>) -> Self {
        Self::PairingFailure {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a service-not-found error.
    #[inline]
    pub fn service_not_found(message: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            message: message.into(),
        }
    }

    /// Creates a command error from the appliance reply.
    #[inline]
    pub fn command(reply: Reply) -> Self {
        Self::Command {
            reply: Box::new(reply),
        }
    }

    /// Creates a command failure from the appliance reply.
    #[inline]
    pub fn command_failure(message: impl Into<String>, reply: Reply) -> Self {
        Self::CommandFailure {
            message: message.into(),
            reply: Box::new(reply),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectionTimeout { .. } | Self::Timeout { .. })
    }

    /// Returns `true` if the appliance lacks the invoked service.
    #[inline]
    #[must_use]
    pub fn is_service_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }

    /// Returns `true` if the appliance answered but the command did not succeed.
    #[inline]
    #[must_use]
    pub fn is_command_error(&self) -> bool {
        matches!(
            self,
            Self::ServiceNotFound { .. } | Self::Command { .. } | Self::CommandFailure { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if a fresh `connect` may cure this error.
    ///
    /// Pairing failures and local configuration mistakes are not recoverable.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_connection_error() || self.is_timeout()
    }
}

// ============================================================================
// Tests
// ============================================================================
