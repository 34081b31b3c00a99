#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use sidecar_discovery::runtime::EventSender;
use sidecar_discovery::types::ContainerPort;
use sidecar_discovery::{
    ClientProvider, Container, ContainerInfo, DiscoveryOptions, DockerClient, DockerDiscovery,
    DockerLabelNamer, Error, Result,
};

/// In-memory stand-in for the Docker daemon.
#[derive(Default)]
pub struct MockDocker {
    containers: Mutex<Vec<Container>>,
    listeners: Mutex<Vec<EventSender>>,
    unhealthy: AtomicBool,
    unreachable: AtomicBool,
    pub inspect_calls: AtomicUsize,
    pub subscriptions: AtomicUsize,
}

impl MockDocker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_containers(&self, containers: Vec<Container>) {
        *self.containers.lock().unwrap() = containers;
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    /// Makes client creation fail, as if the daemon socket were gone.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// The most recently registered, still active event listener.
    pub fn latest_listener(&self) -> Option<EventSender> {
        self.listeners.lock().unwrap().last().cloned()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    pub fn inspections(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DockerClient for MockDocker {
    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id.starts_with(id))
            .map(|c| ContainerInfo {
                id: c.id.clone(),
                labels: c.labels.clone(),
            })
            .ok_or_else(|| Error::Docker(server_error(404, &format!("No such container: {id}"))))
    }

    async fn list_containers(&self) -> Result<Vec<Container>> {
        Ok(self.containers.lock().unwrap().clone())
    }

    async fn add_event_listener(&self, listener: EventSender) -> Result<()> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().unwrap().push(listener);
        Ok(())
    }

    async fn remove_event_listener(&self, listener: &EventSender) -> Result<()> {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|tx| !tx.same_channel(listener));
        if listeners.len() == before {
            return Err(Error::ListenerNotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(Error::Docker(server_error(500, "ping failed")));
        }
        Ok(())
    }
}

pub struct MockProvider(pub Arc<MockDocker>);

#[async_trait]
impl ClientProvider for MockProvider {
    async fn client(&self) -> Result<Arc<dyn DockerClient>> {
        if self.0.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connect(server_error(503, "cannot connect")));
        }
        let client: Arc<dyn DockerClient> = self.0.clone();
        Ok(client)
    }
}

fn server_error(status_code: u16, message: &str) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code,
        message: message.to_string(),
    }
}

pub fn discovery(docker: &Arc<MockDocker>, sleep_interval: Duration) -> Arc<DockerDiscovery> {
    Arc::new(DockerDiscovery::new(
        Arc::new(MockProvider(Arc::clone(docker))),
        Arc::new(DockerLabelNamer::new("ServiceName")),
        DiscoveryOptions {
            advertise_ip: "10.0.0.5".into(),
            hostname: "docker-host".into(),
            sleep_interval,
        },
    ))
}

/// A running container with one published TCP port whose service port
/// equals its host port.
pub fn container(id: &str, name: &str, port: u16, labels: &[(&str, &str)]) -> Container {
    let mut labels: HashMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    labels.insert("ServiceName".into(), name.into());
    labels.insert("ServicePort_80".into(), port.to_string());

    Container {
        id: id.to_string(),
        names: vec![format!("/{name}")],
        image: format!("{name}:latest"),
        created: 1_700_000_000,
        labels,
        ports: vec![ContainerPort {
            ip: "0.0.0.0".into(),
            private_port: 80,
            public_port: port,
            kind: "tcp".into(),
        }],
    }
}
