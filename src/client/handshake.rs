//! Pairing handshake exchange.
//!
//! Runs on a freshly opened control socket before the dispatcher starts, so
//! it reads frames directly from the transport.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::Reply;
use crate::protocol::handshake::{RegistrationStep, registration_message};
use crate::storage;
use crate::transport::Transport;

use super::core::Client;

// ============================================================================
// Client - Handshake
// ============================================================================

impl Client {
    /// Registers with the appliance, pairing if needed.
    ///
    /// A key handed out by the appliance is adopted and saved to the key
    /// store before returning.
    ///
    /// # Errors
    ///
    /// - [`Error::PairingFailure`] if the appliance rejects the registration or
    ///   no key is held afterwards
    /// - [`Error::ConnectionClosed`] if the socket closes mid-exchange
    /// - key store errors
    pub(crate) async fn register(&self, transport: &dyn Transport) -> Result<()> {
        let address = self.inner.config.address.clone();
        let key = self.load_client_key().await?;

        let message = registration_message(key.as_deref())?;
        transport.send(message.to_string()).await?;
        debug!(paired = key.is_some(), "Registration sent");

        let mut step = RegistrationStep::from_reply(&next_reply(transport).await?);
        if step == RegistrationStep::Prompt {
            info!(address = %address, "Waiting for pairing confirmation on the appliance");
            step = RegistrationStep::from_reply(&next_reply(transport).await?);
        }

        match step {
            RegistrationStep::Registered(new_key) if key.as_deref() != Some(new_key.as_str()) => {
                *self.inner.client_key.lock() = Some(new_key.clone());
                storage::save_key(Arc::clone(&self.inner.key_store), address.clone(), new_key)
                    .await?;
                info!(address = %address, "Paired with appliance");
            }
            RegistrationStep::Rejected(message) => return Err(Error::pairing(message)),
            _ => {}
        }

        if self.inner.client_key.lock().is_none() {
            return Err(Error::pairing("Unable to pair"));
        }

        debug!("Registered");
        Ok(())
    }

    /// Returns the held key, loading it from the key store on first use.
    async fn load_client_key(&self) -> Result<Option<String>> {
        if let Some(key) = self.inner.client_key.lock().clone() {
            return Ok(Some(key));
        }

        let key = storage::load_key(
            Arc::clone(&self.inner.key_store),
            self.inner.config.address.clone(),
        )
        .await?;

        if let Some(key) = &key {
            *self.inner.client_key.lock() = Some(key.clone());
        }
        Ok(key)
    }
}

/// Reads and parses the next frame.
async fn next_reply(transport: &dyn Transport) -> Result<Reply> {
    let text = transport.recv().await.ok_or(Error::ConnectionClosed)??;
    Reply::parse(&text)
}

// ============================================================================
// Tests
// ============================================================================
