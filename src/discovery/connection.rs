//! Keeps one live subscription to the Docker event stream.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

use crate::error::Result;
use crate::runtime::{ClientProvider, DockerClient, EventReceiver, EventSender};

/// Capacity of each event subscription channel.
const EVENT_BUFFER: usize = 128;

enum ConnectionState {
    Disconnected,
    Connected {
        client: Arc<dyn DockerClient>,
        events: EventSender,
    },
}

/// Health-checks the engine connection and resubscribes when it is lost.
///
/// Every subscription gets a brand new channel.  Its receiving half is handed
/// to the reconciliation loop through `handoff`; the previous channel is never
/// sent on again by this side.
pub(crate) struct ConnectionManager {
    provider: Arc<dyn ClientProvider>,
    handoff: mpsc::UnboundedSender<EventReceiver>,
    interval: Duration,
    state: ConnectionState,
}

impl ConnectionManager {
    pub(crate) fn new(
        provider: Arc<dyn ClientProvider>,
        handoff: mpsc::UnboundedSender<EventReceiver>,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            handoff,
            interval,
            state: ConnectionState::Disconnected,
        }
    }

    /// Runs until `shutdown` is set (or its sender goes away).  Retries use a
    /// fixed delay.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if !self.is_healthy().await {
                self.reconnect().await;
            }

            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.disconnect().await;
        info!("Docker connection manager stopped");
    }

    async fn is_healthy(&self) -> bool {
        match &self.state {
            ConnectionState::Disconnected => false,
            ConnectionState::Connected { client, .. } => match client.ping().await {
                Ok(()) => true,
                Err(e) => {
                    debug!("Docker liveness check failed: {}", e);
                    false
                }
            },
        }
    }

    async fn reconnect(&mut self) {
        if matches!(self.state, ConnectionState::Connected { .. }) {
            warn!("Lost connection to Docker, re-connecting");
        } else {
            info!("Connecting to Docker");
        }
        self.disconnect().await;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        match self.subscribe(tx.clone()).await {
            Ok(client) => {
                if self.handoff.send(rx).is_err() {
                    warn!("Reconciliation loop is gone, dropping new subscription");
                    let _ = client.remove_event_listener(&tx).await;
                    return;
                }
                self.state = ConnectionState::Connected { client, events: tx };
                info!("Subscribed to Docker events");
            }
            Err(e) => {
                error!("Failed to subscribe to Docker events: {}", e);
            }
        }
    }

    async fn subscribe(&self, events: EventSender) -> Result<Arc<dyn DockerClient>> {
        let client = self.provider.client().await?;
        client.add_event_listener(events).await?;
        Ok(client)
    }

    async fn disconnect(&mut self) {
        let state = std::mem::replace(&mut self.state, ConnectionState::Disconnected);
        if let ConnectionState::Connected { client, events } = state {
            // The channel is being discarded either way.
            let _ = client.remove_event_listener(&events).await;
        }
    }
}
