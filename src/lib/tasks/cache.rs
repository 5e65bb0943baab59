use std::{collections::HashSet, sync::Arc};

use super::types::{CorrelationCache, TaskAssociation};

impl CorrelationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, container_id: &str) -> Option<&Arc<TaskAssociation>> {
        self.entries.get(container_id)
    }

    pub fn insert(&mut self, container_id: &str, task: Arc<TaskAssociation>) {
        self.entries.insert(container_id.to_string(), task);
    }

    /// Drops the entry for a destroyed container. Absent ids are a no-op.
    pub fn evict(&mut self, container_id: &str) -> Option<Arc<TaskAssociation>> {
        self.entries.remove(container_id)
    }

    /// Evicts every entry whose container is not in `live`. Returns how many went.
    pub fn retain_live(&mut self, live: &HashSet<&str>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|id, _| live.contains(id.as_str()));
        before - self.entries.len()
    }

    pub fn contains(&self, container_id: &str) -> bool {
        self.entries.contains_key(container_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
