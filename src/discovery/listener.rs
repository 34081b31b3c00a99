//! Resolves the change-notification webhook a service asks for.

use log::{debug, warn};

use crate::service::{Port, Service};
use crate::types::{short_id, ChangeListener, ContainerInfo, SIDECAR_LISTENER};

/// Only HTTP listeners are supported, so only TCP ports qualify.
const LISTENER_PORT_TYPE: &str = "tcp";

/// Returns the change listener configured through the `SidecarListener`
/// label of `container`, if any.
///
/// The label names a service port; the listener URL points at the host
/// port that service port is published on.
pub fn listener_for(svc: &Service, container: &ContainerInfo) -> Option<ChangeListener> {
    let raw = container.label(SIDECAR_LISTENER)?;

    let Ok(service_port) = raw.parse::<i64>() else {
        warn!(
            "SidecarListener label found on {}, can't decode port '{}'",
            svc.id, raw
        );
        return None;
    };

    if short_id(&container.id) != svc.id {
        debug!(
            "Container {} does not belong to service {}",
            container.id, svc.id
        );
        return None;
    }

    let Some(port) = port_for_service_port(svc, service_port, LISTENER_PORT_TYPE) else {
        warn!(
            "SidecarListener label found on {}, but no matching ServicePort! '{}'",
            svc.id, raw
        );
        return None;
    };

    Some(ChangeListener {
        name: svc.listener_name(),
        url: format!("http://{}:{}/sidecar/update", port.ip, port.port),
    })
}

fn port_for_service_port<'a>(svc: &'a Service, service_port: i64, kind: &str) -> Option<&'a Port> {
    svc.ports
        .iter()
        .find(|p| p.service_port == service_port && p.kind == kind)
}
