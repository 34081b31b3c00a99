use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{Container, ContainerEvent, ContainerInfo};

pub mod docker;
pub use docker::{BollardDocker, DockerProvider};

/// Sending half of an event subscription.  `None` is the "disconnected"
/// sentinel pushed when the underlying event stream goes away.
pub type EventSender = mpsc::Sender<Option<ContainerEvent>>;
/// Receiving half of an event subscription.
pub type EventReceiver = mpsc::Receiver<Option<ContainerEvent>>;

/// The operations discovery needs from a container engine.
#[async_trait]
pub trait DockerClient: Send + Sync {
    /// Returns the full metadata of a single container.
    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo>;

    /// Lists running containers only.
    async fn list_containers(&self) -> Result<Vec<Container>>;

    /// Starts forwarding container events into `listener`.
    async fn add_event_listener(&self, listener: EventSender) -> Result<()>;

    /// Stops forwarding events into a channel previously registered with
    /// [`add_event_listener`](Self::add_event_listener).
    async fn remove_event_listener(&self, listener: &EventSender) -> Result<()>;

    /// Liveness check of the connection and its subscriptions.
    async fn ping(&self) -> Result<()>;
}

/// Hands out connected clients.  Each call may return a new connection.
#[async_trait]
pub trait ClientProvider: Send + Sync {
    async fn client(&self) -> Result<Arc<dyn DockerClient>>;
}
