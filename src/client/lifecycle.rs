//! Connection lifecycle.
//!
//! Each connect attempt runs in one owned lifecycle task:
//!
//! ```text
//! Idle → Connecting → Handshaking → Subscribing → Ready → Running → TearingDown → Idle
//! ```
//!
//! The task is never aborted. `disconnect` cancels it cooperatively and waits
//! for teardown to finish, so cleanup always runs to completion. Concurrent
//! `connect` calls share one attempt through a `watch` channel carrying its
//! status.
//!
//! Observers notified on readiness and on teardown run inside the lifecycle
//! task. `connect` and `disconnect` called from there never wait on the task
//! itself: `connect` reports the current outcome and `disconnect` only
//! cancels.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::endpoints as ep;
use crate::transport::Transport;

use super::config::millis;
use super::core::Client;
use super::request::Consumer;
use super::session::{Session, log_close};
use super::state::{MirrorField, PowerState};
use super::{dispatcher, keepalive};

// ============================================================================
// ConnectionState
// ============================================================================

/// Phase of the connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Idle,
    /// Opening the control socket.
    Connecting,
    /// Registering with the appliance.
    Handshaking,
    /// Issuing the baseline subscriptions.
    Subscribing,
    /// Connected; notifying observers.
    Ready,
    /// Connected.
    Running,
    /// Releasing the connection.
    TearingDown,
}

impl ConnectionState {
    /// Returns `true` while an attempt is in progress or established.
    #[inline]
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle | Self::TearingDown)
    }
}

// ============================================================================
// Attempt Tracking
// ============================================================================

/// Outcome of a connect attempt, as seen by `connect` callers.
#[derive(Debug, Clone)]
pub(crate) enum AttemptStatus {
    Pending,
    Ready,
    Failed(Error),
}

/// Shared status sender of an attempt.
pub(crate) type StatusSender = Arc<watch::Sender<AttemptStatus>>;

/// The current lifecycle task.
#[derive(Default)]
pub(crate) struct Lifecycle {
    task: Option<JoinHandle<()>>,
    status: Option<watch::Receiver<AttemptStatus>>,
    cancel: CancellationToken,
}

impl Lifecycle {
    /// Status of an attempt that a new `connect` should join, if any.
    fn live_status(&self, phase: ConnectionState) -> Option<watch::Receiver<AttemptStatus>> {
        match (&self.task, &self.status) {
            (Some(task), Some(status)) if !task.is_finished() && phase.is_active() => {
                Some(status.clone())
            }
            _ => None,
        }
    }

    /// Waits for the current task, if any, to finish.
    async fn retire(&mut self) {
        if let Some(task) = self.task.as_mut()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Lifecycle task failed");
        }
        self.task = None;
        self.status = None;
    }
}

/// Resources of one attempt, released by teardown.
#[derive(Default)]
struct Attempt {
    transport: Option<Arc<dyn Transport>>,
    session: Option<Arc<Session>>,
    dispatcher: Option<JoinHandle<Result<()>>>,
    keepalive: Option<JoinHandle<Result<()>>>,
    /// Stops the dispatcher and keepalive.
    tasks: CancellationToken,
}

/// Identity of the lifecycle task currently running.
#[derive(Clone)]
struct TaskScope {
    client: usize,
    cancel: CancellationToken,
}

tokio::task_local! {
    static LIFECYCLE_TASK: TaskScope;
}

/// Marks a still-pending attempt with `status`.
pub(crate) fn settle(sender: &watch::Sender<AttemptStatus>, status: AttemptStatus) -> bool {
    sender.send_if_modified(|current| {
        if matches!(current, AttemptStatus::Pending) {
            *current = status;
            true
        } else {
            false
        }
    })
}

// ============================================================================
// Client - Connect / Disconnect
// ============================================================================

impl Client {
    /// Connects to the appliance, pairing if needed.
    ///
    /// Returns once the connection is ready: registered, baseline
    /// subscriptions issued and observers notified. Does nothing if already
    /// connected. Concurrent calls share one attempt. A call arriving while
    /// the previous connection is being torn down waits for it first.
    ///
    /// Called from an observer during readiness or teardown, it starts
    /// nothing and reports the current outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the socket does not open in time
    /// - [`Error::PairingFailure`] if the appliance did not hand out a key
    /// - [`Error::ConnectionClosed`] if the attempt was cancelled or the
    ///   socket closed before the connection was ready
    pub async fn connect(&self) -> Result<()> {
        if self.own_lifecycle_task().is_some() {
            return match self.connection_state() {
                ConnectionState::Ready | ConnectionState::Running => Ok(()),
                _ => Err(Error::ConnectionClosed),
            };
        }

        let mut status = {
            let mut lifecycle = self.inner.lifecycle.lock().await;
            match lifecycle.live_status(self.connection_state()) {
                Some(status) => status,
                None => {
                    lifecycle.retire().await;
                    self.spawn_lifecycle(&mut lifecycle)
                }
            }
        };

        let outcome = status
            .wait_for(|s| !matches!(s, AttemptStatus::Pending))
            .await
            .map(|s| (*s).clone());

        match outcome {
            Ok(AttemptStatus::Ready) => Ok(()),
            Ok(AttemptStatus::Failed(e)) => Err(e),
            Ok(AttemptStatus::Pending) | Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Closes the connection and waits until every resource is released.
    ///
    /// Pending requests fail with [`Error::ConnectionClosed`], the mirror is
    /// reset and observers are notified once more. Does nothing when not
    /// connected. Called from an observer, it only requests the teardown.
    pub async fn disconnect(&self) {
        if let Some(cancel) = self.own_lifecycle_task() {
            cancel.cancel();
            return;
        }

        let mut lifecycle = self.inner.lifecycle.lock().await;
        lifecycle.cancel.cancel();
        lifecycle.retire().await;
    }

    /// Starts a lifecycle task and returns its status.
    fn spawn_lifecycle(&self, lifecycle: &mut Lifecycle) -> watch::Receiver<AttemptStatus> {
        let (status_tx, status_rx) = watch::channel(AttemptStatus::Pending);
        let status_tx = Arc::new(status_tx);
        let cancel = CancellationToken::new();

        self.set_phase(ConnectionState::Connecting);
        *self.inner.pending_connect.lock() = Some(Arc::clone(&status_tx));

        let scope = TaskScope {
            client: self.identity(),
            cancel: cancel.clone(),
        };
        let client = self.clone();
        lifecycle.task = Some(tokio::spawn(LIFECYCLE_TASK.scope(
            scope,
            client.run_lifecycle(status_tx, cancel.clone()),
        )));
        lifecycle.cancel = cancel;
        lifecycle.status = Some(status_rx.clone());

        status_rx
    }

    /// Cancel token of this client's lifecycle task, when called from inside it.
    fn own_lifecycle_task(&self) -> Option<CancellationToken> {
        let client = self.identity();
        LIFECYCLE_TASK
            .try_with(|scope| (scope.client == client).then(|| scope.cancel.clone()))
            .ok()
            .flatten()
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

// ============================================================================
// Client - Lifecycle Task
// ============================================================================

impl Client {
    /// Body of the lifecycle task.
    async fn run_lifecycle(self, status: StatusSender, cancel: CancellationToken) {
        let mut attempt = Attempt::default();

        let outcome = tokio::select! {
            outcome = self.establish_and_run(&mut attempt, &status) => outcome,
            () = cancel.cancelled() => {
                info!("Disconnect requested");
                Err(Error::ConnectionClosed)
            }
        };

        match &outcome {
            Ok(()) => info!("Connection closed"),
            Err(e) if cancel.is_cancelled() => debug!(error = %e, "Connection cancelled"),
            Err(e) => warn!(error = %e, "Connection ended"),
        }

        self.teardown(attempt, &status, outcome).await;
    }

    /// Connecting → Handshaking → Subscribing → Ready → Running.
    ///
    /// Returns when the dispatcher or the keepalive ends. Every resource is
    /// stored in `attempt` as soon as it exists so teardown can release it.
    async fn establish_and_run(&self, attempt: &mut Attempt, status: &StatusSender) -> Result<()> {
        let config = &self.inner.config;

        // Connecting
        let url = config.ws_url();
        info!(url = %url, "Connecting");
        let transport = timeout(config.connect_timeout, self.inner.connector.connect(&url))
            .await
            .map_err(|_| Error::connection_timeout(millis(config.connect_timeout)))??;
        attempt.transport = Some(Arc::clone(&transport));

        // Handshaking
        self.set_phase(ConnectionState::Handshaking);
        self.register(transport.as_ref()).await?;

        // Subscribing
        self.set_phase(ConnectionState::Subscribing);
        let session = Arc::new(Session::new(Arc::clone(&transport)));
        attempt.session = Some(Arc::clone(&session));
        self.install_session(Arc::clone(&session));

        attempt.dispatcher = Some(tokio::spawn(dispatcher::run(
            self.clone(),
            Arc::clone(&session),
            attempt.tasks.clone(),
        )));

        if let Some(interval) = config.ping_interval {
            attempt.keepalive = Some(tokio::spawn(keepalive::run(
                self.clone(),
                Arc::clone(&transport),
                interval,
                config.ping_timeout,
                attempt.tasks.clone(),
            )));
        }

        self.subscribe_baseline().await;

        // Ready
        self.set_phase(ConnectionState::Ready);
        self.inner.state.set_notify(true);
        self.run_observers().await;
        self.inner.pending_connect.lock().take();
        settle(status, AttemptStatus::Ready);
        info!("Connected");

        // Running
        self.set_phase(ConnectionState::Running);
        wait_background(attempt).await
    }

    /// Fetches static info and issues the baseline subscriptions.
    ///
    /// Failures are logged and never block readiness.
    async fn subscribe_baseline(&self) {
        let (system_info, software_info) = tokio::join!(
            self.request(ep::GET_SYSTEM_INFO, None),
            self.request(ep::GET_SOFTWARE_INFO, None),
        );
        let system_info = tolerate("system info", system_info);
        let software_info = tolerate("software info", software_info);
        self.inner.state.update(|s| {
            s.system_info = system_info;
            s.software_info = software_info;
        });

        let results = join_all(MirrorField::BASELINE.iter().map(|&field| async move {
            let result = self
                .subscribe_consumer(Consumer::Mirror(field), field.service(), field.payload())
                .await;
            (field, result)
        }))
        .await;

        for (field, result) in results {
            match result {
                Ok(_) => debug!(?field, "Baseline subscription active"),
                Err(e) if e.is_service_not_found() => {
                    debug!(?field, "Baseline subscription not supported");
                }
                Err(e) => warn!(?field, error = %e, "Baseline subscription failed"),
            }
        }

        self.inner.state.update(|s| {
            if s.power_state.is_none() {
                s.power_state = Some(PowerState::new(PowerState::UNKNOWN));
            }
        });
    }

    /// Releases everything the attempt acquired, in order.
    ///
    /// Runs inside the lifecycle task, which is never aborted, so it always
    /// completes.
    async fn teardown(&self, mut attempt: Attempt, status: &StatusSender, outcome: Result<()>) {
        self.set_phase(ConnectionState::TearingDown);

        attempt.tasks.cancel();
        if let Some(session) = &attempt.session {
            session.fail_pending();
        }

        for (name, handle) in [
            ("dispatcher", attempt.dispatcher.take()),
            ("keepalive", attempt.keepalive.take()),
        ] {
            if let Some(handle) = handle
                && let Err(e) = handle.await
            {
                warn!(task = name, error = %e, "Background task failed");
            }
        }

        let close_timeout = self.inner.config.connect_timeout;
        if let Some(session) = attempt.session.take() {
            session.close(close_timeout).await;
            session.clear();
        } else if let Some(transport) = attempt.transport.take() {
            log_close("Control", timeout(close_timeout, transport.close()).await);
        }

        self.inner.session.write().take();
        self.inner.state.reset();
        self.inner.pending_connect.lock().take();

        self.run_observers().await;
        self.set_phase(ConnectionState::Idle);

        // Waiters of an attempt that never got ready see an idle client
        let failure = outcome.err().unwrap_or(Error::ConnectionClosed);
        settle(status, AttemptStatus::Failed(failure));
        info!("Disconnected");
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Waits for the dispatcher or the keepalive to end.
async fn wait_background(attempt: &mut Attempt) -> Result<()> {
    let Some(dispatcher) = attempt.dispatcher.as_mut() else {
        return Ok(());
    };

    match attempt.keepalive.as_mut() {
        Some(keepalive) => {
            tokio::select! {
                result = dispatcher => {
                    attempt.dispatcher = None;
                    task_outcome("dispatcher", result)
                }
                result = keepalive => {
                    attempt.keepalive = None;
                    task_outcome("keepalive", result)
                }
            }
        }
        None => {
            let result = dispatcher.await;
            attempt.dispatcher = None;
            task_outcome("dispatcher", result)
        }
    }
}

fn task_outcome(name: &str, result: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match result {
        Ok(outcome) => {
            debug!(task = name, "Background task ended");
            outcome
        }
        Err(e) => Err(Error::connection(format!("{name} task failed: {e}"))),
    }
}

/// Logs a failed optional fetch and keeps going.
fn tolerate<T>(what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) if e.is_service_not_found() => {
            debug!(what, "Not supported");
            None
        }
        Err(e) => {
            warn!(what, error = %e, "Fetch failed");
            None
        }
    }
}
