//! The in-memory list of discovered services.

use std::collections::HashSet;

use log::{debug, warn};

use crate::service::Service;
use crate::types::{ContainerEvent, SHORT_ID_LEN};

/// The set of services currently known, unique by ID.
///
/// Order is kept as discovered but carries no meaning.
#[derive(Debug, Clone, Default)]
pub struct ServiceList {
    services: Vec<Service>,
}

impl ServiceList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            services: Vec::with_capacity(capacity),
        }
    }

    /// Adds a service unless one with the same ID is already present.
    /// Returns whether it was added.
    pub fn insert(&mut self, service: Service) -> bool {
        if self.services.iter().any(|s| s.id == service.id) {
            warn!("Ignoring duplicate service {}", service.id);
            return false;
        }
        self.services.push(service);
        true
    }

    pub fn find(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Removes the service a stop/die event refers to.
    ///
    /// The event carries the full container ID; services are keyed by the
    /// short form.  Returns the removed service, if any.
    pub fn remove_for_event(&mut self, event: &ContainerEvent) -> Option<Service> {
        if !event.is_stop() {
            return None;
        }
        let Some(short) = event.id.get(..SHORT_ID_LEN) else {
            debug!("Ignoring '{}' event with short ID '{}'", event.status, event.id);
            return None;
        };

        let pos = self.services.iter().position(|s| s.id == short)?;
        Some(self.services.remove(pos))
    }

    pub fn ids(&self) -> HashSet<String> {
        self.services.iter().map(|s| s.id.clone()).collect()
    }

    pub fn to_vec(&self) -> Vec<Service> {
        self.services.clone()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
