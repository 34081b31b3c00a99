//! Cache of inspected containers, so health checks and listener lookups
//! don't hit the Docker API on every request.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use tokio::sync::RwLock;

use crate::types::ContainerInfo;

/// Inspection results keyed by service (short container) ID.
///
/// Entries are pruned against every resync's live set and the whole map is
/// dropped on a fixed timer, which also discards entries surviving a
/// container ID being reused.
#[derive(Debug, Default)]
pub struct ContainerCache {
    entries: RwLock<HashMap<String, Arc<ContainerInfo>>>,
}

impl ContainerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<ContainerInfo>> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn set(&self, id: impl Into<String>, container: Arc<ContainerInfo>) {
        self.entries.write().await.insert(id.into(), container);
    }

    /// Removes every entry whose ID is not in `live`.
    pub async fn prune(&self, live: &HashSet<String>) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|id, _| live.contains(id));
        if entries.len() != before {
            debug!("Pruned {} cached containers", before - entries.len());
        }
    }

    /// Throws the whole cache away, sizing the replacement with `size_hint`.
    pub async fn drain(&self, size_hint: usize) {
        let mut entries = self.entries.write().await;
        *entries = HashMap::with_capacity(size_hint);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
