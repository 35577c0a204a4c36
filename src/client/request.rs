//! Request and subscribe primitives.
//!
//! Three ways to talk to the appliance:
//!
//! | Method | Waits for | Result |
//! |--------|-----------|--------|
//! | [`Client::command`] | nothing | `()` once the frame is written |
//! | [`Client::request`] | the matching reply | reply payload |
//! | [`Client::subscribe`] | the first update, after the consumer ran | first payload |
//!
//! Every reply goes through [`Reply::into_payload`](crate::protocol::Reply::into_payload).

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{Command, RequestType};

use super::core::Client;
use super::session::Session;
use super::state::MirrorField;

// ============================================================================
// Types
// ============================================================================

/// Subscription callback, invoked once per update in delivery order.
pub type Callback = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;

// ============================================================================
// Consumer
// ============================================================================

/// Receiver of one subscription's updates.
#[derive(Clone)]
pub(crate) enum Consumer {
    /// Updates a mirrored field.
    Mirror(MirrorField),
    /// User callback.
    Callback(Callback),
}

impl Consumer {
    /// Hands one update payload to the consumer.
    pub(crate) async fn deliver(&self, client: &Client, payload: Value) -> Result<()> {
        match self {
            Self::Mirror(field) => client.apply_mirror(*field, payload).await,
            Self::Callback(callback) => callback(payload).await,
        }
    }
}

// ============================================================================
// Client - Primitives
// ============================================================================

impl Client {
    /// Returns the live session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if no connection is open.
    pub(crate) fn session(&self) -> Result<Arc<Session>> {
        self.inner.session.read().clone().ok_or(Error::NotConnected)
    }

    /// Sends a command without waiting for any reply.
    ///
    /// A fresh id is assigned when `id` is `None`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no connection is open
    /// - transport errors from the send
    pub async fn command(
        &self,
        request_type: RequestType,
        service: &str,
        payload: Option<Value>,
        id: Option<CommandId>,
    ) -> Result<()> {
        let session = self.session()?;
        let id = id.unwrap_or_else(|| self.inner.ids.next());

        session
            .send_command(&Command::new(id, request_type, service, payload))
            .await
    }

    /// Sends a request and waits for its reply.
    ///
    /// Dropping the returned future abandons the request: its routing entry
    /// is removed and a late reply is discarded.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if no connection is open
    /// - [`Error::ConnectionClosed`] if the connection ends first
    /// - [`Error::ServiceNotFound`], [`Error::Command`], [`Error::Protocol`],
    ///   [`Error::CommandFailure`] per the reply
    pub async fn request(&self, service: &str, payload: Option<Value>) -> Result<Value> {
        let session = self.session()?;
        let id = self.inner.ids.next();
        request_on(&session, id, RequestType::Request, service, payload).await
    }

    /// Subscribes to a service.
    ///
    /// `callback` receives every update payload, one at a time, in arrival
    /// order. Resolves with the first payload once `callback` has processed
    /// it. If `callback` fails, the subscription stops delivering.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request), plus the callback's own error if it
    /// fails on the first update.
    ///
    /// # Example
    ///
    /// ```ignore
    /// client
    ///     .subscribe("audio/getVolume", None, |payload| async move {
    ///         println!("volume update: {payload}");
    ///         Ok(())
    ///     })
    ///     .await?;
    /// ```
    pub async fn subscribe<F, Fut>(
        &self,
        service: &str,
        payload: Option<Value>,
        callback: F,
    ) -> Result<Value>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let callback: Callback =
            Arc::new(move |payload: Value| -> BoxFuture<'static, Result<()>> {
                Box::pin(callback(payload))
            });
        self.subscribe_consumer(Consumer::Callback(callback), service, payload)
            .await
    }

    /// Registers `consumer` and issues the subscription.
    ///
    /// The registration is rolled back if the subscription does not succeed.
    pub(crate) async fn subscribe_consumer(
        &self,
        consumer: Consumer,
        service: &str,
        payload: Option<Value>,
    ) -> Result<Value> {
        let session = self.session()?;
        let id = self.inner.ids.next();

        session.register_consumer(id, consumer);
        let registration = Registration {
            session: session.as_ref(),
            id,
            keep: false,
        };

        let first = request_on(&session, id, RequestType::Subscribe, service, payload).await?;
        registration.keep();

        debug!(%id, service, "Subscribed");
        Ok(first)
    }
}

/// Sends a request or subscription on `session` and interprets the reply.
pub(crate) async fn request_on(
    session: &Session,
    id: CommandId,
    request_type: RequestType,
    service: &str,
    payload: Option<Value>,
) -> Result<Value> {
    let (_guard, reply) = session.register_pending(id);

    session
        .send_command(&Command::new(id, request_type, service, payload))
        .await?;

    let reply = reply.await.map_err(|_| Error::ConnectionClosed)??;
    reply.into_payload()
}

// ============================================================================
// Registration
// ============================================================================

/// Unregisters a subscription consumer on drop unless kept.
struct Registration<'a> {
    session: &'a Session,
    id: CommandId,
    keep: bool,
}

impl Registration<'_> {
    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if !self.keep {
            self.session.remove_subscription(self.id);
        }
    }
}
