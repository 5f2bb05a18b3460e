//! Failover monitoring and reconnection.
//!
//! # State Transitions
//! ```text
//! Disconnected → Connecting: establish attempt begins
//! Connecting   → Connected:  TCP session up
//! Connected    → Ready:      ready-check passed, probes may run
//! any          → Disconnected: session closed
//! ```
//!
//! The monitor owns the client's lifecycle: it drives the initial
//! discovery, consumes the event feed, and re-establishes after a lost
//! session with a `min(attempt × base, cap)` delay. The attempt counter
//! resets after a successful reconnect. An interrupted probe cycle is
//! never replayed; it settles as an error and the next tick runs against
//! the new master.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::ReconnectConfig;
use crate::observability::metrics;
use crate::resilience::reconnect_delay;
use crate::stats::{FailoverEvent, ProbeStats};
use crate::store::{StoreClient, StoreEvent};

/// Where the shared session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Ready,
}

/// The one error class that crosses the top-level boundary: discovery is
/// unrecoverable and the retry budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("discovery failed after {attempts} attempts: {detail}")]
    Discovery { attempts: u32, detail: String },
}

enum Reestablished {
    Reconnected,
    ShutdownRequested,
}

pub struct FailoverMonitor<S> {
    client: Arc<S>,
    stats: Arc<ProbeStats>,
    reconnect: ReconnectConfig,
    events: broadcast::Receiver<StoreEvent>,
    state: ConnectionState,
}

impl<S: StoreClient> FailoverMonitor<S> {
    /// Subscribes to the event feed immediately so nothing announced
    /// between the initial discovery and `run` is lost.
    pub fn new(client: Arc<S>, stats: Arc<ProbeStats>, reconnect: ReconnectConfig) -> Self {
        let events = client.subscribe();
        Self {
            client,
            stats,
            reconnect,
            events,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Initial discovery. Blocks until the client is ready or the retry
    /// budget is exhausted; the probe loop must not start before this
    /// returns.
    pub async fn connect_with_retries(&mut self) -> Result<(), FatalError> {
        let mut attempt: u32 = 1;
        loop {
            self.set_state(ConnectionState::Connecting);
            match self.client.establish().await {
                Ok(()) => {
                    self.set_state(ConnectionState::Ready);
                    tracing::info!("Store client ready");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Discovery attempt failed");
                    if attempt >= self.reconnect.max_attempts {
                        return Err(FatalError::Discovery {
                            attempts: attempt,
                            detail: e.to_string(),
                        });
                    }
                    let delay = reconnect_delay(
                        attempt,
                        self.reconnect.base_delay_ms,
                        self.reconnect.cap_delay_ms,
                    );
                    tracing::info!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Reconnect scheduled"
                    );
                    time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Event loop. Returns `Ok` on shutdown and `Err` only when a lost
    /// session cannot be re-established within the retry budget.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), FatalError> {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Ok(StoreEvent::Closed) => {
                        if self.state != ConnectionState::Disconnected {
                            self.set_state(ConnectionState::Disconnected);
                            tracing::warn!("Store connection closed");
                            match self.reestablish(&mut shutdown).await? {
                                Reestablished::Reconnected => {}
                                Reestablished::ShutdownRequested => return Ok(()),
                            }
                        }
                    }
                    Ok(event) => self.handle_event(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Store event feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!("Store event feed closed");
                        return Ok(());
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Failover monitor received shutdown signal, exiting");
                    return Ok(());
                }
            }
        }
    }

    fn handle_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Connected => {
                self.set_state(ConnectionState::Connected);
                tracing::info!("Store connection established");
            }
            StoreEvent::Ready => {
                self.set_state(ConnectionState::Ready);
                tracing::info!("Store client ready (master accepting commands)");
            }
            StoreEvent::Error { detail } => {
                tracing::warn!(error = %detail, "Store error");
            }
            StoreEvent::ReconnectScheduled { delay_ms } => {
                tracing::info!(delay_ms, "Client scheduled its own reconnect");
            }
            StoreEvent::MasterSwitched { previous, current } => {
                let event = FailoverEvent::now(previous, current);
                tracing::warn!(
                    previous = %event.previous,
                    current = %event.current,
                    "Master switched"
                );
                self.stats.record_failover(&event);
            }
            StoreEvent::Closed => {}
        }
    }

    /// Bounded-backoff reconnect after a lost session. The in-flight
    /// probe, if any, settles as an error on its own; nothing is replayed.
    async fn reestablish(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<Reestablished, FatalError> {
        let mut attempt: u32 = 1;
        loop {
            if attempt > self.reconnect.max_attempts {
                return Err(FatalError::Discovery {
                    attempts: attempt - 1,
                    detail: "reconnect budget exhausted".into(),
                });
            }
            let delay = reconnect_delay(
                attempt,
                self.reconnect.base_delay_ms,
                self.reconnect.cap_delay_ms,
            );
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnect scheduled"
            );
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.recv() => return Ok(Reestablished::ShutdownRequested),
            }

            self.set_state(ConnectionState::Connecting);
            match self.client.establish().await {
                Ok(()) => {
                    self.set_state(ConnectionState::Ready);
                    tracing::info!(attempt, "Reconnected");
                    return Ok(Reestablished::Reconnected);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                    attempt += 1;
                }
            }
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        metrics::record_connection_ready(state == ConnectionState::Ready);
    }
}
