//! The canonical service model published by discovery.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::types::{short_id, Container, ContainerPort, PROXY_MODE, SERVICE_PORT_PREFIX};

const DEFAULT_PROXY_MODE: &str = "http";

/// A port declared by a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Port {
    /// Transport type, `"tcp"` or `"udp"`.
    #[serde(rename = "Type")]
    pub kind: String,
    /// Port published on the host.
    pub port: i64,
    /// Port the service is known by across the cluster.
    pub service_port: i64,
    #[serde(rename = "IP")]
    pub ip: String,
}

/// One discovered, running container eligible for discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
    /// Short (12 character) container ID.
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub image: String,
    /// Creation time in unix seconds.
    pub created: i64,
    pub hostname: String,
    pub proxy_mode: String,
    pub ports: Vec<Port>,
}

impl Service {
    /// Builds a service from a container listing entry.
    ///
    /// Only published ports are carried over.  When `advertise_ip` is empty
    /// each port keeps the IP Docker bound it to.  The name is the raw
    /// container name; callers normally replace it through a
    /// [`ServiceNamer`](crate::namer::ServiceNamer).
    pub fn from_container(container: &Container, advertise_ip: &str, hostname: &str) -> Self {
        let ports = container
            .ports
            .iter()
            .filter(|p| p.public_port != 0)
            .map(|p| build_port(p, container, advertise_ip))
            .collect();

        Self {
            id: short_id(&container.id).to_string(),
            name: container.names.first().cloned().unwrap_or_default(),
            image: container.image.clone(),
            created: container.created,
            hostname: hostname.to_string(),
            proxy_mode: container
                .label(PROXY_MODE)
                .unwrap_or(DEFAULT_PROXY_MODE)
                .to_string(),
            ports,
        }
    }

    /// Name under which this service registers as a change listener.
    pub fn listener_name(&self) -> String {
        format!("Service({}-{})", self.name, self.id)
    }
}

fn build_port(port: &ContainerPort, container: &Container, advertise_ip: &str) -> Port {
    let ip = if advertise_ip.is_empty() {
        port.ip.clone()
    } else {
        advertise_ip.to_string()
    };

    let label = format!("{}{}", SERVICE_PORT_PREFIX, port.private_port);
    let service_port: i64 = match container.label(&label) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            debug!("Ignoring invalid {} label '{}' on {}", label, raw, container.id);
            0
        }),
        None => 0,
    };

    Port {
        kind: port.kind.clone(),
        port: i64::from(port.public_port),
        service_port,
        ip,
    }
}
