//! Client configuration and builder.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use webos_remote::Client;
//!
//! # fn example() -> webos_remote::Result<()> {
//! let client = Client::builder()
//!     .address("192.168.1.20")
//!     .connect_timeout(Duration::from_secs(5))
//!     .volume_step_delay(Duration::from_millis(200))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::storage::{FileKeyStore, KeyStore};
use crate::transport::{Connector, WsConnector};

use super::core::Client;

// ============================================================================
// Constants
// ============================================================================

/// Port of the appliance's control socket.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bound on opening a socket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default keepalive ping interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on waiting for a pong.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// ClientConfig
// ============================================================================

/// Resolved client settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Appliance host name or IP address.
    pub address: String,
    /// Control socket port.
    pub port: u16,
    /// Bound on opening the control and input sockets.
    pub connect_timeout: Duration,
    /// Keepalive ping interval; `None` disables the keepalive.
    pub ping_interval: Option<Duration>,
    /// Bound on waiting for a pong; `None` waits forever.
    pub ping_timeout: Option<Duration>,
    /// Pause after a volume step on outputs that drop rapid steps.
    pub volume_step_delay: Option<Duration>,
    /// Client key to present instead of the stored one.
    pub client_key: Option<String>,
    /// Key file used when no key store is supplied.
    pub key_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Returns the control socket URL.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}:{}", self.host(), self.port)
    }

    /// Host part of the URL, bracketing bare IPv6 addresses.
    fn host(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]", self.address)
        } else {
            self.address.clone()
        }
    }
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`].
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct ClientBuilder {
    address: Option<String>,
    port: Option<u16>,
    connect_timeout: Option<Duration>,
    ping_interval: Option<Option<Duration>>,
    ping_timeout: Option<Option<Duration>>,
    volume_step_delay: Option<Duration>,
    client_key: Option<String>,
    key_file: Option<PathBuf>,
    key_store: Option<Arc<dyn KeyStore>>,
    connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .field("ping_interval", &self.ping_interval)
            .field("ping_timeout", &self.ping_timeout)
            .field("volume_step_delay", &self.volume_step_delay)
            .field("key_file", &self.key_file)
            .field("custom_key_store", &self.key_store.is_some())
            .field("custom_connector", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the appliance host name or IP address.
    #[inline]
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the control socket port (default 3000).
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the bound on opening a socket (default 2 s).
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the keepalive ping interval (default 1 s).
    #[inline]
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(Some(interval));
        self
    }

    /// Disables the keepalive.
    #[inline]
    #[must_use]
    pub fn no_keepalive(mut self) -> Self {
        self.ping_interval = Some(None);
        self
    }

    /// Sets the bound on waiting for a pong (default 20 s).
    #[inline]
    #[must_use]
    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = Some(Some(timeout));
        self
    }

    /// Waits for pongs without a bound.
    #[inline]
    #[must_use]
    pub fn no_ping_timeout(mut self) -> Self {
        self.ping_timeout = Some(None);
        self
    }

    /// Pauses after each volume step on outputs that drop rapid steps.
    #[inline]
    #[must_use]
    pub fn volume_step_delay(mut self, delay: Duration) -> Self {
        self.volume_step_delay = Some(delay);
        self
    }

    /// Presents `key` instead of loading one from the key store.
    #[inline]
    #[must_use]
    pub fn client_key(mut self, key: impl Into<String>) -> Self {
        self.client_key = Some(key.into());
        self
    }

    /// Keeps pairing keys in `path` instead of the default key file.
    #[inline]
    #[must_use]
    pub fn key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    /// Uses a custom key store. Overrides [`key_file`](Self::key_file).
    #[inline]
    #[must_use]
    pub fn key_store(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.key_store = Some(store);
        self
    }

    /// Uses a custom connector for both sockets.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the address is missing or does not form a valid URL
    /// - [`Error::Config`] if a timeout or interval is zero
    pub fn build(self) -> Result<Client> {
        let config = self.validate()?;

        let key_store = self.key_store.unwrap_or_else(|| {
            let path = config
                .key_file
                .clone()
                .unwrap_or_else(FileKeyStore::default_path);
            Arc::new(FileKeyStore::new(path))
        });
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector));

        Ok(Client::from_parts(config, connector, key_store))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    fn validate(&self) -> Result<ClientConfig> {
        let address = self
            .address
            .clone()
            .filter(|address| !address.trim().is_empty())
            .ok_or_else(|| {
                Error::config(
                    "Appliance address is required. Use .address() to set it.\n\
                     Example: Client::builder().address(\"192.168.1.20\")",
                )
            })?;

        let config = ClientConfig {
            address,
            port: self.port.unwrap_or(DEFAULT_PORT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            ping_interval: self.ping_interval.unwrap_or(Some(DEFAULT_PING_INTERVAL)),
            ping_timeout: self.ping_timeout.unwrap_or(Some(DEFAULT_PING_TIMEOUT)),
            volume_step_delay: self.volume_step_delay,
            client_key: self.client_key.clone(),
            key_file: self.key_file.clone(),
        };

        let url = config.ws_url();
        let parsed = Url::parse(&url)
            .map_err(|e| Error::config(format!("Invalid appliance address {url}: {e}")))?;
        if parsed.host_str().is_none() {
            return Err(Error::config(format!("No host in appliance address {url}")));
        }

        if config.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        if config.ping_interval.is_some_and(|d| d.is_zero()) {
            return Err(Error::config("ping_interval must be greater than zero"));
        }
        if config.ping_timeout.is_some_and(|d| d.is_zero()) {
            return Err(Error::config("ping_timeout must be greater than zero"));
        }

        Ok(config)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Whole milliseconds of `duration`, for error reporting.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ClientBuilder::new();
        assert!(builder.address.is_none());
        assert!(builder.key_store.is_none());
    }

    #[test]
    fn test_defaults() {
        let config = ClientBuilder::new()
            .address("192.168.1.20")
            .validate()
            .expect("config");

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.ping_interval, Some(DEFAULT_PING_INTERVAL));
        assert_eq!(config.ping_timeout, Some(DEFAULT_PING_TIMEOUT));
        assert_eq!(config.volume_step_delay, None);
        assert_eq!(config.ws_url(), "ws://192.168.1.20:3000");
    }

    #[test]
    fn test_overrides() {
        let config = ClientBuilder::new()
            .address("tv.local")
            .port(3001)
            .no_keepalive()
            .no_ping_timeout()
            .volume_step_delay(Duration::from_millis(250))
            .client_key("abc123")
            .validate()
            .expect("config");

        assert_eq!(config.ws_url(), "ws://tv.local:3001");
        assert_eq!(config.ping_interval, None);
        assert_eq!(config.ping_timeout, None);
        assert_eq!(config.volume_step_delay, Some(Duration::from_millis(250)));
        assert_eq!(config.client_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_ipv6_address_is_bracketed() {
        let config = ClientBuilder::new()
            .address("fe80::1")
            .validate()
            .expect("config");
        assert_eq!(config.ws_url(), "ws://[fe80::1]:3000");
    }

    #[test]
    fn test_missing_address() {
        let result = ClientBuilder::new().validate();
        assert!(matches!(result, Err(Error::Config { .. })));

        let result = ClientBuilder::new().address("  ").validate();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_invalid_address() {
        let result = ClientBuilder::new().address("bad host/name").validate();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let result = ClientBuilder::new()
            .address("10.0.0.1")
            .connect_timeout(Duration::ZERO)
            .validate();
        assert!(matches!(result, Err(Error::Config { .. })));

        let result = ClientBuilder::new()
            .address("10.0.0.1")
            .ping_interval(Duration::ZERO)
            .validate();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_millis() {
        assert_eq!(millis(Duration::from_secs(2)), 2000);
    }
}
