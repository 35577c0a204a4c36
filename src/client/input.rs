//! Pointer input socket.
//!
//! Button presses and pointer movement go over a second socket whose URL the
//! appliance hands out on request. The socket is opened on first use, reused
//! for the rest of the connection and closed with it.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::endpoints as ep;
use crate::protocol::{Button, InputEvent, RequestType};
use crate::transport::Transport;

use super::config::millis;
use super::core::Client;
use super::lifecycle::{AttemptStatus, settle};
use super::request::request_on;
use super::session::Session;

// ============================================================================
// Client - Input Socket
// ============================================================================

impl Client {
    /// Sends one event on the pointer input socket, opening it if needed.
    ///
    /// A failure is returned to the caller and also fails a `connect` that
    /// is still waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no connection is open
    /// - [`Error::Protocol`] if the appliance returns no socket path
    /// - [`Error::ConnectionTimeout`] if the socket does not open in time
    /// - transport errors from the send
    pub async fn send_input(&self, event: InputEvent) -> Result<()> {
        let result = self.send_input_frame(event.to_frame()).await;

        if let Err(e) = &result {
            debug!(error = %e, "Input event failed");
            if let Some(status) = self.inner.pending_connect.lock().as_ref() {
                settle(status, AttemptStatus::Failed(e.clone()));
            }
        }

        result
    }

    /// Presses a remote control button.
    ///
    /// # Errors
    ///
    /// See [`send_input`](Self::send_input).
    pub async fn button(&self, button: Button) -> Result<()> {
        self.send_input(InputEvent::Button(button)).await
    }

    /// Presses a digit button.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `digit` is greater than 9
    /// - see [`send_input`](Self::send_input)
    pub async fn number_button(&self, digit: u8) -> Result<()> {
        self.button(Button::number(digit)?).await
    }

    /// Moves the pointer by a relative offset.
    ///
    /// # Errors
    ///
    /// See [`send_input`](Self::send_input).
    pub async fn move_cursor(&self, dx: i32, dy: i32, down: bool) -> Result<()> {
        self.send_input(InputEvent::Move { dx, dy, down }).await
    }

    /// Clicks at the pointer position.
    ///
    /// # Errors
    ///
    /// See [`send_input`](Self::send_input).
    pub async fn click(&self) -> Result<()> {
        self.send_input(InputEvent::Click).await
    }

    /// Scrolls by a relative offset.
    ///
    /// # Errors
    ///
    /// See [`send_input`](Self::send_input).
    pub async fn scroll(&self, dx: i32, dy: i32) -> Result<()> {
        self.send_input(InputEvent::Scroll { dx, dy }).await
    }

    async fn send_input_frame(&self, frame: String) -> Result<()> {
        let session = self.session()?;

        let transport = {
            let mut slot = session.input().lock().await;
            match slot.as_ref() {
                Some(transport) => Arc::clone(transport),
                None => {
                    let transport = self.open_input(&session).await?;
                    *slot = Some(Arc::clone(&transport));
                    transport
                }
            }
        };

        trace!(frame = %frame.trim_end(), "Sending input event");
        transport.send(frame).await
    }

    /// Asks the appliance for the input socket URL and connects to it.
    async fn open_input(&self, session: &Session) -> Result<Arc<dyn Transport>> {
        let id = self.inner.ids.next();
        let reply = request_on(session, id, RequestType::Request, ep::INPUT_SOCKET, None).await?;

        let url = reply
            .get("socketPath")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("Input socket reply without socketPath"))?;

        let limit = self.inner.config.connect_timeout;
        let transport = timeout(limit, self.inner.connector.connect(url))
            .await
            .map_err(|_| Error::connection_timeout(millis(limit)))??;

        debug!(url, "Input socket opened");
        Ok(transport)
    }
}
