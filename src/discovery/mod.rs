//! Docker service discovery.
//!
//! [`DockerDiscovery`] keeps a list of the services running on the local
//! Docker host.  Two background tasks drive it:
//!
//! * the connection manager, which keeps an event subscription alive and
//!   resubscribes whenever the daemon stops answering;
//! * the reconciliation loop, which removes services as their containers
//!   stop, re-lists all containers on the sleep interval, and empties the
//!   inspection cache every [`CACHE_DRAIN_INTERVAL`].
//!
//! Query operations can be called from any task at any time.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

use crate::error::Result;
use crate::namer::ServiceNamer;
use crate::runtime::{ClientProvider, EventReceiver};
use crate::service::Service;
use crate::types::{
    short_id, ChangeListener, ContainerEvent, ContainerInfo, HEALTH_CHECK, HEALTH_CHECK_ARGS,
    SIDECAR_DISCOVER,
};

mod cache;
mod connection;
mod listener;
mod services;

pub use cache::ContainerCache;
pub use listener::listener_for;
pub use services::ServiceList;

use connection::ConnectionManager;

/// How often the inspection cache is thrown away.
pub const CACHE_DRAIN_INTERVAL: Duration = Duration::from_secs(10 * 60);
/// Default resync and reconnect interval.
pub const DEFAULT_SLEEP_INTERVAL: Duration = Duration::from_secs(10);
/// Shortest resync and reconnect interval accepted.
pub const MIN_SLEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Address advertised for every discovered port.  When empty, the IP
    /// Docker bound the port to is used.
    pub advertise_ip: String,
    /// Hostname recorded on every discovered service.
    pub hostname: String,
    /// Interval between full resyncs and between connection health checks.
    pub sleep_interval: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            advertise_ip: String::new(),
            hostname: String::new(),
            sleep_interval: DEFAULT_SLEEP_INTERVAL,
        }
    }
}

pub struct DockerDiscovery {
    services: RwLock<ServiceList>,
    cache: ContainerCache,
    provider: Arc<dyn ClientProvider>,
    namer: Arc<dyn ServiceNamer>,
    options: DiscoveryOptions,
}

/// Handles of the two background tasks started by [`DockerDiscovery::run`].
pub struct DiscoveryHandle {
    connection: JoinHandle<()>,
    reconcile: JoinHandle<()>,
}

impl DiscoveryHandle {
    /// Waits for both tasks to finish after shutdown was signalled.
    pub async fn join(self) {
        let (connection, reconcile) = tokio::join!(self.connection, self.reconcile);
        for result in [connection, reconcile] {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    error!("Discovery task failed: {}", e);
                }
            }
        }
    }

    pub fn abort(&self) {
        self.connection.abort();
        self.reconcile.abort();
    }
}

impl DockerDiscovery {
    pub fn new(
        provider: Arc<dyn ClientProvider>,
        namer: Arc<dyn ServiceNamer>,
        mut options: DiscoveryOptions,
    ) -> Self {
        if options.sleep_interval < MIN_SLEEP_INTERVAL {
            warn!(
                "Sleep interval {:?} too short, using {:?}",
                options.sleep_interval, MIN_SLEEP_INTERVAL
            );
            options.sleep_interval = MIN_SLEEP_INTERVAL;
        }

        Self {
            services: RwLock::new(ServiceList::default()),
            cache: ContainerCache::new(),
            provider,
            namer,
            options,
        }
    }

    /// Starts the connection manager and the reconciliation loop in the
    /// background.  Both stop once `true` is sent on `shutdown` or its sender
    /// is dropped; a resync already underway finishes first.
    pub fn run(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> DiscoveryHandle {
        let (handoff_tx, handoff_rx) = mpsc::unbounded_channel();

        let manager = ConnectionManager::new(
            Arc::clone(&self.provider),
            handoff_tx,
            self.options.sleep_interval,
        );
        let connection = tokio::spawn(manager.run(shutdown.clone()));

        let this = Arc::clone(self);
        let reconcile = tokio::spawn(async move { this.reconcile(handoff_rx, shutdown).await });

        DiscoveryHandle {
            connection,
            reconcile,
        }
    }

    async fn reconcile(
        &self,
        mut handoff: mpsc::UnboundedReceiver<EventReceiver>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut resync = interval(self.options.sleep_interval);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut drain = interval_at(Instant::now() + CACHE_DRAIN_INTERVAL, CACHE_DRAIN_INTERVAL);
        drain.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut events: Option<EventReceiver> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(rx) = handoff.recv() => {
                    debug!("Switching to new Docker event subscription");
                    events = Some(rx);
                }
                event = next_event(&mut events) => match event {
                    Some(Some(event)) => {
                        debug!("Event: {:?}", event);
                        self.handle_event(&event).await;
                    }
                    // Docker went away; the connection manager resubscribes.
                    Some(None) => debug!("Docker event stream disconnected"),
                    None => events = None,
                },
                _ = resync.tick() => {
                    if let Err(e) = self.poll().await {
                        error!("Failed to list Docker containers: {}", e);
                    }
                }
                _ = drain.tick() => self.drain_cache().await,
            }
        }

        info!("Discovery loop stopped");
    }

    /// Re-lists running containers and replaces the service list.  Returns
    /// the number of services discovered.
    pub async fn poll(&self) -> Result<usize> {
        // New connection every time
        let client = self.provider.client().await?;
        let containers = client.list_containers().await?;

        let mut discovered = ServiceList::with_capacity(containers.len());
        for container in &containers {
            if container.label(SIDECAR_DISCOVER) == Some("false") {
                continue;
            }

            let mut svc =
                Service::from_container(container, &self.options.advertise_ip, &self.options.hostname);
            svc.name = self.namer.service_name(container);
            discovered.insert(svc);
        }

        let live = discovered.ids();
        let count = discovered.len();

        let mut services = self.services.write().await;
        *services = discovered;
        // Pruned under the list lock so readers never see the new list
        // paired with the old cache.
        self.cache.prune(&live).await;

        debug!("Resync found {} services", count);
        Ok(count)
    }

    /// Applies one lifecycle event to the service list.
    pub async fn handle_event(&self, event: &ContainerEvent) {
        let mut services = self.services.write().await;
        if let Some(svc) = services.remove_for_event(event) {
            info!("Deleting {} based on Docker '{}' event", svc.id, event.status);
        }
    }

    pub async fn drain_cache(&self) {
        let size_hint = self.services.read().await.len();
        self.cache.drain(size_hint).await;
        debug!("Drained container cache");
    }

    /// A copy of the services currently known.
    pub async fn services(&self) -> Vec<Service> {
        self.services.read().await.to_vec()
    }

    pub async fn find_service_by_id(&self, id: &str) -> Option<Service> {
        self.services.read().await.find(id).cloned()
    }

    /// Change listeners of every known service that configured one.
    pub async fn listeners(&self) -> Vec<ChangeListener> {
        let mut listeners = Vec::new();

        for svc in self.services().await {
            let Ok(container) = self.inspect_container(&svc).await else {
                continue;
            };

            let Some(current) = self.find_service_by_id(short_id(&container.id)).await else {
                continue;
            };
            if let Some(listener) = listener_for(&current, &container) {
                listeners.push(listener);
            }
        }

        listeners
    }

    /// The health check type and its arguments, as set by container labels.
    /// Both are empty when the container can't be inspected.
    pub async fn health_check(&self, svc: &Service) -> (String, String) {
        let Ok(container) = self.inspect_container(svc).await else {
            return (String::new(), String::new());
        };

        let label = |key: &str| container.label(key).unwrap_or_default().to_string();
        (label(HEALTH_CHECK), label(HEALTH_CHECK_ARGS))
    }

    /// Number of inspected containers currently cached.
    pub async fn cached_containers(&self) -> usize {
        self.cache.len().await
    }

    async fn inspect_container(&self, svc: &Service) -> Result<Arc<ContainerInfo>> {
        if let Some(container) = self.cache.get(&svc.id).await {
            return Ok(container);
        }

        // New connection every time
        let client = self.provider.client().await.map_err(|e| {
            error!("Error when creating Docker client: {}", e);
            e
        })?;

        let container = client.inspect_container(&svc.id).await.map_err(|e| {
            error!("Error inspecting container {}: {}", svc.id, e);
            e
        })?;

        let container = Arc::new(container);
        self.cache.set(svc.id.clone(), Arc::clone(&container)).await;
        Ok(container)
    }
}

/// Next item from the current subscription.  Pends forever while there is
/// none, and yields `None` once the subscription channel is closed.
async fn next_event(events: &mut Option<EventReceiver>) -> Option<Option<ContainerEvent>> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
