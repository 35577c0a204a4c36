//! Control socket keepalive.
//!
//! Pings the appliance every `ping_interval` and gives up on the connection
//! when a pong does not arrive within `ping_timeout`. A suspended appliance
//! keeps the socket open but stops answering pings, so no ping is sent while
//! the mirrored power state is `Suspend`.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::transport::Transport;

use super::config::millis;
use super::core::Client;

// ============================================================================
// Constants
// ============================================================================

/// Power state in which pings go unanswered.
const SUSPEND: &str = "Suspend";

// ============================================================================
// Keepalive
// ============================================================================

/// Pings until a pong is missed, the transport closes or `cancel` fires.
///
/// # Errors
///
/// - [`Error::Timeout`] if a pong does not arrive within `ping_timeout`
/// - transport errors from the ping
pub(crate) async fn run(
    client: Client,
    transport: Arc<dyn Transport>,
    interval: Duration,
    ping_timeout: Option<Duration>,
    cancel: CancellationToken,
) -> Result<()> {
    debug!(interval_ms = interval.as_millis(), "Keepalive started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            () = sleep(interval) => {}
        }

        let suspended = client
            .inner
            .state
            .read(|s| s.power_state.as_ref().is_some_and(|p| p.state == SUSPEND));
        if suspended {
            trace!("Appliance suspended, ping skipped");
            continue;
        }

        let outcome = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            outcome = ping(transport.as_ref(), ping_timeout) => outcome,
        };

        if let Err(e) = outcome {
            warn!(error = %e, "Keepalive failed");
            return Err(e);
        }
        trace!("Keepalive pong received");
    }
}

/// Sends one ping and waits for its pong, bounded by `limit`.
async fn ping(transport: &dyn Transport, limit: Option<Duration>) -> Result<()> {
    match limit {
        Some(limit) => timeout(limit, transport.ping())
            .await
            .map_err(|_| Error::timeout("keepalive ping", millis(limit)))?,
        None => transport.ping().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::client::state::PowerState;
    use crate::storage::MemoryKeyStore;
    use crate::transport::mock;

    fn client() -> Client {
        Client::builder()
            .address("10.0.0.9")
            .key_store(Arc::new(MemoryKeyStore::new()))
            .build()
            .expect("client")
    }

    #[tokio::test]
    async fn test_missed_pong_times_out() {
        let (transport, _end) = mock::pair();
        transport.ignore_pings();

        let result = run(
            client(),
            transport,
            Duration::from_millis(5),
            Some(Duration::from_millis(20)),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_suspend_skips_pings() {
        let client = client();
        client
            .inner
            .state
            .update(|s| s.power_state = Some(PowerState::new(SUSPEND)));

        let (transport, _end) = mock::pair();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            client,
            Arc::clone(&transport) as Arc<dyn Transport>,
            Duration::from_millis(5),
            Some(Duration::from_millis(20)),
            cancel.clone(),
        ));

        sleep(Duration::from_millis(60)).await;
        cancel.cancel();

        assert!(task.await.expect("join").is_ok());
        assert_eq!(transport.ping_count(), 0);
    }

    #[tokio::test]
    async fn test_pings_while_active() {
        let (transport, _end) = mock::pair();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            client(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Duration::from_millis(5),
            None,
            cancel.clone(),
        ));

        sleep(Duration::from_millis(60)).await;
        cancel.cancel();

        assert!(task.await.expect("join").is_ok());
        assert!(transport.ping_count() >= 2);
    }
}
