use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::{ContainerInspectResponse, ContainerSummary, EventMessage};
use bollard::system::EventsOptions;
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::stream::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{ClientProvider, DockerClient, EventSender};
use crate::error::{Error, Result};
use crate::types::{Container, ContainerEvent, ContainerInfo, ContainerPort};

/// Request timeout used for explicit endpoints.
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Connects to the Docker daemon, either at a configured endpoint or using
/// the local defaults (unix socket, honouring `DOCKER_HOST`).
#[derive(Debug, Clone, Default)]
pub struct DockerProvider {
    endpoint: Option<String>,
}

impl DockerProvider {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }

    fn connect(&self) -> Result<Docker> {
        let docker = match self.endpoint.as_deref() {
            Some(path) if path.starts_with("unix://") => {
                Docker::connect_with_unix(path, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            Some(addr) => Docker::connect_with_http(addr, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        };
        docker.map_err(Error::Connect)
    }
}

#[async_trait]
impl ClientProvider for DockerProvider {
    async fn client(&self) -> Result<Arc<dyn DockerClient>> {
        let docker = self.connect()?;
        Ok(Arc::new(BollardDocker::new(docker)))
    }
}

/// [`DockerClient`] backed by the Docker Engine API.
///
/// Every registered event listener is fed by its own forwarding task.  The
/// task pushes the `None` sentinel when the event stream errors or ends, and
/// [`ping`](DockerClient::ping) fails once any forwarding task has stopped so
/// the caller resubscribes.
pub struct BollardDocker {
    docker: Docker,
    listeners: Mutex<Vec<(EventSender, JoinHandle<()>)>>,
}

impl BollardDocker {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl Drop for BollardDocker {
    fn drop(&mut self) {
        for (_, task) in self.listeners.get_mut().drain(..) {
            task.abort();
        }
    }
}

#[async_trait]
impl DockerClient for BollardDocker {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo> {
        let detail = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        Ok(info_from_inspect(detail))
    }

    async fn list_containers(&self) -> Result<Vec<Container>> {
        let opts = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(opts)).await?;
        Ok(containers.into_iter().map(Container::from).collect())
    }

    async fn add_event_listener(&self, listener: EventSender) -> Result<()> {
        // The event stream is lazy; make sure the daemon is there before
        // reporting the subscription as established.
        self.docker.ping().await?;

        let docker = self.docker.clone();
        let tx = listener.clone();
        let task = tokio::spawn(async move {
            let opts = EventsOptions::<String> {
                filters: HashMap::from([("type".to_string(), vec!["container".to_string()])]),
                ..Default::default()
            };
            let mut stream = docker.events(Some(opts));

            info!("Listening for Docker events...");
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(message) => {
                        let Some(event) = event_from_message(message) else {
                            continue;
                        };
                        debug!("Container event: {} for {}", event.status, event.id);
                        if tx.send(Some(event)).await.is_err() {
                            // Nobody reads this channel any more.
                            return;
                        }
                    }
                    Err(e) => {
                        error!("Error in Docker event stream: {}", e);
                        break;
                    }
                }
            }

            warn!("Docker event stream ended");
            let _ = tx.send(None).await;
        });

        self.listeners.lock().await.push((listener, task));
        Ok(())
    }

    async fn remove_event_listener(&self, listener: &EventSender) -> Result<()> {
        let mut listeners = self.listeners.lock().await;
        let pos = listeners
            .iter()
            .position(|(tx, _)| tx.same_channel(listener))
            .ok_or(Error::ListenerNotFound)?;
        let (_, task) = listeners.swap_remove(pos);
        task.abort();
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        let listeners = self.listeners.lock().await;
        if listeners.iter().any(|(_, task)| task.is_finished()) {
            return Err(Error::EventStreamClosed);
        }
        Ok(())
    }
}

impl From<ContainerSummary> for Container {
    fn from(summary: ContainerSummary) -> Self {
        let ports = summary
            .ports
            .unwrap_or_default()
            .into_iter()
            .map(|p| ContainerPort {
                ip: p.ip.unwrap_or_default(),
                private_port: p.private_port,
                public_port: p.public_port.unwrap_or(0),
                kind: p.typ.map(|t| t.to_string()).unwrap_or_default(),
            })
            .collect();

        Self {
            id: summary.id.unwrap_or_default(),
            names: summary.names.unwrap_or_default(),
            image: summary.image.unwrap_or_default(),
            created: summary.created.unwrap_or_default(),
            labels: summary.labels.unwrap_or_default(),
            ports,
        }
    }
}

fn info_from_inspect(detail: ContainerInspectResponse) -> ContainerInfo {
    ContainerInfo {
        id: detail.id.unwrap_or_default(),
        labels: detail
            .config
            .and_then(|config| config.labels)
            .unwrap_or_default(),
    }
}

fn event_from_message(message: EventMessage) -> Option<ContainerEvent> {
    let id = message.actor.and_then(|actor| actor.id)?;
    let status = message.action?;
    if id.is_empty() {
        return None;
    }
    Some(ContainerEvent { id, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ContainerConfig, EventActor, Port, PortTypeEnum};

    #[test]
    fn converts_container_summary() {
        let summary = ContainerSummary {
            id: Some("0123456789abcdef0123".into()),
            names: Some(vec!["/web".into()]),
            image: Some("nginx".into()),
            created: Some(42),
            labels: Some(HashMap::from([("SidecarDiscover".into(), "false".into())])),
            ports: Some(vec![
                Port {
                    ip: Some("0.0.0.0".into()),
                    private_port: 80,
                    public_port: Some(32768),
                    typ: Some(PortTypeEnum::TCP),
                },
                Port {
                    ip: None,
                    private_port: 53,
                    public_port: None,
                    typ: Some(PortTypeEnum::UDP),
                },
            ]),
            ..Default::default()
        };

        let container = Container::from(summary);
        assert_eq!(container.id, "0123456789abcdef0123");
        assert_eq!(container.label("SidecarDiscover"), Some("false"));
        assert_eq!(container.ports[0].kind, "tcp");
        assert_eq!(container.ports[0].public_port, 32768);
        assert_eq!(container.ports[1].kind, "udp");
        assert_eq!(container.ports[1].public_port, 0);
    }

    #[test]
    fn converts_inspect_labels() {
        let detail = ContainerInspectResponse {
            id: Some("abc".into()),
            config: Some(ContainerConfig {
                labels: Some(HashMap::from([("HealthCheck".into(), "HttpGet".into())])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let info = info_from_inspect(detail);
        assert_eq!(info.id, "abc");
        assert_eq!(info.label("HealthCheck"), Some("HttpGet"));
    }

    #[test]
    fn converts_event_messages() {
        let message = EventMessage {
            action: Some("die".into()),
            actor: Some(EventActor {
                id: Some("abc123def456789".into()),
                attributes: None,
            }),
            ..Default::default()
        };
        assert_eq!(
            event_from_message(message),
            Some(ContainerEvent::new("abc123def456789", "die"))
        );

        let anonymous = EventMessage {
            action: Some("die".into()),
            actor: None,
            ..Default::default()
        };
        assert_eq!(event_from_message(anonymous), None);
    }
}
