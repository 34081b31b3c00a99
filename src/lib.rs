//! Docker service discovery for the sidecar platform.
//!
//! Watches the local Docker daemon and keeps a list of the running services,
//! their health check settings and their change listeners.  See
//! [`discovery::DockerDiscovery`] for the engine itself.

pub mod config;
pub mod discovery;
pub mod error;
pub mod namer;
pub mod runtime;
pub mod service;
pub mod types;

pub use discovery::{DiscoveryHandle, DiscoveryOptions, DockerDiscovery};
pub use error::{Error, Result};
pub use namer::{DockerLabelNamer, RegexNamer, ServiceNamer};
pub use runtime::{ClientProvider, DockerClient, DockerProvider};
pub use service::{Port, Service};
pub use types::{ChangeListener, Container, ContainerEvent, ContainerInfo};
