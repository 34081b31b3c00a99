//! Container-side data structures used throughout the discovery daemon.
//!
//! These mirror the small subset of the Docker API the engine actually
//! needs.  The Docker adapter converts its wire types into these so the rest
//! of the crate (and any other client implementation) never depends on
//! `bollard` directly.  Metadata is kept opaque: an identifier plus a label
//! map, since the schema belongs to the container engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Label which, when set to `"false"`, excludes a container from discovery.
pub const SIDECAR_DISCOVER: &str = "SidecarDiscover";
/// Label naming the service port that should receive change notifications.
pub const SIDECAR_LISTENER: &str = "SidecarListener";
/// Label holding the health check type.
pub const HEALTH_CHECK: &str = "HealthCheck";
/// Label holding the arguments passed to the health check.
pub const HEALTH_CHECK_ARGS: &str = "HealthCheckArgs";
/// Label overriding the proxy mode of a service.
pub const PROXY_MODE: &str = "ProxyMode";
/// Prefix of the labels mapping a private port to its service port.
pub const SERVICE_PORT_PREFIX: &str = "ServicePort_";

/// Length of the short container ID used to cross-reference events.
pub const SHORT_ID_LEN: usize = 12;

/// Returns the short form of a container ID (its first 12 characters).
/// IDs shorter than that are returned unchanged.
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

/// A running container as reported by a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    /// Creation time in unix seconds.
    pub created: i64,
    pub labels: HashMap<String, String>,
    pub ports: Vec<ContainerPort>,
}

impl Container {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A port binding of a listed container.  `public_port` is 0 when the port
/// is not published on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerPort {
    pub ip: String,
    pub private_port: u16,
    pub public_port: u16,
    /// Transport type, `"tcp"` or `"udp"`.
    pub kind: String,
}

/// The result of inspecting a single container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A container lifecycle event from the engine's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEvent {
    /// Engine-assigned (full length) container ID.
    pub id: String,
    /// Event status, e.g. `"start"`, `"die"` or `"stop"`.
    pub status: String,
}

impl ContainerEvent {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }

    /// Whether this event means the container is no longer running.
    pub fn is_stop(&self) -> bool {
        matches!(self.status.as_str(), "die" | "stop")
    }
}

/// A webhook target for a service that wants to be told about changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeListener {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Url")]
    pub url: String,
}
