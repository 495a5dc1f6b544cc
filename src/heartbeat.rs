//! Idle-connection heartbeat
//!
//! Long-lived chat sessions drop silently when idle. [`ConnectionHeartbeat`]
//! checks the session on a fixed interval and reconnects it when it has gone
//! away, so transport timeouts outside a task never bring the process down.
//!
//! # Example
//!
//! ```no_run
//! use telly_dl::heartbeat::ConnectionHeartbeat;
//! use telly_dl::services::SessionConnection;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(session: Arc<dyn SessionConnection>) {
//! let shutdown = CancellationToken::new();
//! let handle = ConnectionHeartbeat::new(session, Duration::from_secs(6)).spawn(shutdown.clone());
//!
//! // later
//! shutdown.cancel();
//! handle.await.ok();
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::SessionConnection;

/// Periodically verifies a session and reconnects it when disconnected
pub struct ConnectionHeartbeat {
    session: Arc<dyn SessionConnection>,
    interval: Duration,
}

impl ConnectionHeartbeat {
    /// Creates a heartbeat that checks `session` every `interval`
    pub fn new(session: Arc<dyn SessionConnection>, interval: Duration) -> Self {
        Self { session, interval }
    }

    /// Run on a background task until `shutdown` is cancelled
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Check the session every interval until `shutdown` is cancelled
    ///
    /// A failed reconnect is logged and retried on the next tick; the loop
    /// itself never exits on error.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Connection heartbeat started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.check().await,
            }
        }

        info!("Connection heartbeat stopped");
    }

    async fn check(&self) {
        if self.session.is_connected() {
            debug!("Session connected");
            return;
        }

        warn!("Session disconnected, reconnecting");
        match self.session.reconnect().await {
            Ok(()) => info!("Session reconnected"),
            Err(e) => warn!(error = %e, "Reconnect failed, will retry on next heartbeat"),
        }
    }
}
