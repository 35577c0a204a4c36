//! Appliance client handle.
//!
//! [`Client`] is a cheap, cloneable handle to one appliance. Clones share the
//! connection, the state mirror and the observers.
//!
//! # Example
//!
//! ```no_run
//! use webos_remote::Client;
//!
//! # async fn example() -> webos_remote::Result<()> {
//! let client = Client::new("192.168.1.20")?;
//! client.connect().await?;
//!
//! println!("volume: {:?}", client.volume());
//! client.volume_up().await?;
//!
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::error::Result;
use crate::identifiers::{CommandIdGenerator, ObserverId};
use crate::storage::KeyStore;
use crate::transport::Connector;

use super::config::{ClientBuilder, ClientConfig};
use super::lifecycle::{ConnectionState, Lifecycle, StatusSender};
use super::session::Session;
use super::state::{MirrorSnapshot, Observer, Observers, PowerState, StateMirror};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
pub(crate) struct ClientInner {
    /// Resolved settings.
    pub config: ClientConfig,

    /// Opens the control and input sockets.
    pub connector: Arc<dyn Connector>,

    /// Persists pairing keys.
    pub key_store: Arc<dyn KeyStore>,

    /// Key presented at registration.
    pub client_key: Mutex<Option<String>>,

    /// Mints command ids for the lifetime of the client.
    pub ids: CommandIdGenerator,

    /// Live connection, if any.
    pub session: RwLock<Option<Arc<Session>>>,

    /// Current lifecycle task.
    pub lifecycle: AsyncMutex<Lifecycle>,

    /// Status of an attempt that has not reached Ready yet.
    pub pending_connect: Mutex<Option<StatusSender>>,

    /// Mirrored appliance state.
    pub state: StateMirror,

    /// Registered observers.
    pub observers: Observers,

    /// Lifecycle phase.
    pub phase: RwLock<ConnectionState>,

    /// Serializes delayed volume steps.
    pub volume_step: AsyncMutex<()>,
}

// ============================================================================
// Client
// ============================================================================

/// Remote control client for one appliance.
///
/// Create one with [`Client::new`] or [`Client::builder`], then call
/// [`connect`](Self::connect). The client does not reconnect on its own; call
/// `connect` again after the connection ends.
///
/// A running connection keeps a clone of the client alive, so call
/// [`disconnect`](Self::disconnect) when done.
#[derive(Clone)]
pub struct Client {
    /// Shared inner state.
    pub(crate) inner: Arc<ClientInner>,
}

// ============================================================================
// Client - Display
// ============================================================================

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.inner.config.address)
            .field("state", &self.connection_state())
            .field("registered", &self.is_registered())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Creates a client for `address` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the address is invalid.
    pub fn new(address: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().address(address).build()
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        key_store: Arc<dyn KeyStore>,
    ) -> Self {
        let client_key = config.client_key.clone();

        Self {
            inner: Arc::new(ClientInner {
                config,
                connector,
                key_store,
                client_key: Mutex::new(client_key),
                ids: CommandIdGenerator::default(),
                session: RwLock::new(None),
                lifecycle: AsyncMutex::new(Lifecycle::default()),
                pending_connect: Mutex::new(None),
                state: StateMirror::default(),
                observers: Observers::default(),
                phase: RwLock::new(ConnectionState::Idle),
                volume_step: AsyncMutex::new(()),
            }),
        }
    }

    /// Returns the resolved settings.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

// ============================================================================
// Client - Connection Status
// ============================================================================

impl Client {
    /// Returns the lifecycle phase.
    #[inline]
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.phase.read()
    }

    /// Returns `true` while a connection is being established or open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state() != ConnectionState::Idle
    }

    /// Returns `true` once a pairing key is held.
    #[inline]
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.inner.client_key.lock().is_some()
    }

    /// Returns the pairing key, if one is held.
    #[inline]
    #[must_use]
    pub fn client_key(&self) -> Option<String> {
        self.inner.client_key.lock().clone()
    }

    pub(crate) fn set_phase(&self, phase: ConnectionState) {
        let previous = std::mem::replace(&mut *self.inner.phase.write(), phase);
        if previous != phase {
            debug!(from = ?previous, to = ?phase, "Connection state changed");
        }
    }

    pub(crate) fn install_session(&self, session: Arc<Session>) {
        *self.inner.session.write() = Some(session);
    }
}

// ============================================================================
// Client - Mirrored State
// ============================================================================

impl Client {
    /// Returns a copy of the whole mirror.
    #[must_use]
    pub fn snapshot(&self) -> MirrorSnapshot {
        self.inner.state.snapshot()
    }

    /// Returns the mirrored power state.
    #[must_use]
    pub fn power_state(&self) -> Option<PowerState> {
        self.inner.state.read(|s| s.power_state.clone())
    }

    /// Returns `true` if the appliance is on.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.inner.state.read(MirrorSnapshot::is_on)
    }

    /// Returns `true` if the appliance is on with the screen lit.
    #[must_use]
    pub fn is_screen_on(&self) -> bool {
        self.inner.state.read(MirrorSnapshot::is_screen_on)
    }

    /// Returns the foreground app id.
    #[must_use]
    pub fn current_app_id(&self) -> Option<String> {
        self.inner.state.read(|s| s.current_app_id.clone())
    }

    /// Returns the mute flag.
    #[must_use]
    pub fn muted(&self) -> Option<bool> {
        self.inner.state.read(|s| s.muted)
    }

    /// Returns the volume level.
    #[must_use]
    pub fn volume(&self) -> Option<i64> {
        self.inner.state.read(|s| s.volume)
    }

    /// Returns the current TV channel.
    #[must_use]
    pub fn current_channel(&self) -> Option<Value> {
        self.inner.state.read(|s| s.current_channel.clone())
    }

    /// Returns program info of the current channel.
    #[must_use]
    pub fn channel_info(&self) -> Option<Value> {
        self.inner.state.read(|s| s.channel_info.clone())
    }

    /// Returns the channel list.
    #[must_use]
    pub fn channels(&self) -> Option<Value> {
        self.inner.state.read(|s| s.channels.clone())
    }

    /// Returns the app catalogue keyed by app id.
    #[must_use]
    pub fn apps(&self) -> FxHashMap<String, Value> {
        self.inner.state.read(|s| s.apps.clone())
    }

    /// Returns the external inputs keyed by app id.
    #[must_use]
    pub fn inputs(&self) -> FxHashMap<String, Value> {
        self.inner.state.read(|s| s.inputs.clone())
    }

    /// Returns the system information fetched at connect.
    #[must_use]
    pub fn system_info(&self) -> Option<Value> {
        self.inner.state.read(|s| s.system_info.clone())
    }

    /// Returns the software information fetched at connect.
    #[must_use]
    pub fn software_info(&self) -> Option<Value> {
        self.inner.state.read(|s| s.software_info.clone())
    }

    /// Returns the active sound output route.
    #[must_use]
    pub fn sound_output(&self) -> Option<String> {
        self.inner.state.read(|s| s.sound_output.clone())
    }

    /// Returns the mirrored picture settings.
    #[must_use]
    pub fn picture_settings(&self) -> Option<Value> {
        self.inner.state.read(|s| s.picture_settings.clone())
    }
}

// ============================================================================
// Client - Observers
// ============================================================================

impl Client {
    /// Registers an observer of mirror changes.
    ///
    /// The observer runs after every mirrored change once the connection is
    /// ready, and once more after disconnect. When the connection is already
    /// ready it also runs right away.
    ///
    /// # Example
    ///
    /// ```ignore
    /// client
    ///     .register_observer(|snapshot| async move {
    ///         println!("on: {}", snapshot.is_on());
    ///     })
    ///     .await;
    /// ```
    pub async fn register_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(MirrorSnapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let observer: Observer = Arc::new(move |snapshot: MirrorSnapshot| -> BoxFuture<'static, ()> {
            Box::pin(observer(snapshot))
        });

        let id = self.inner.observers.add(Arc::clone(&observer));
        if self.inner.state.notify_enabled() {
            observer(self.inner.state.snapshot()).await;
        }
        id
    }

    /// Removes an observer. Returns `false` if it was not registered.
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.inner.observers.remove(id)
    }

    /// Removes every observer.
    pub fn clear_observers(&self) {
        self.inner.observers.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
