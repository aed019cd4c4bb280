//! In-memory correlation store backed by `DashMap`.
//!
//! Shard locks give per-key atomicity without a global lock.

use crate::domain::{CorrelationId, PendingCorrelation};
use crate::error::StoreError;
use crate::ports::outbound::CorrelationStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

/// Default correlation store.
#[derive(Debug, Default)]
pub struct InMemoryCorrelationStore {
    entries: DashMap<CorrelationId, PendingCorrelation>,
}

impl InMemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.contains_key(id)
    }
}

impl CorrelationStore for InMemoryCorrelationStore {
    fn put(&self, id: CorrelationId, entry: PendingCorrelation) -> Result<(), StoreError> {
        match self.entries.entry(id) {
            Entry::Occupied(occupied) => Err(StoreError::Duplicate {
                correlation_id: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    fn get(&self, id: &CorrelationId) -> Result<PendingCorrelation, StoreError> {
        self.entries
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                correlation_id: id.clone(),
            })
    }

    fn remove(&self, id: &CorrelationId) -> Result<PendingCorrelation, StoreError> {
        self.entries
            .remove(id)
            .map(|(_, entry)| entry)
            .ok_or_else(|| StoreError::NotFound {
                correlation_id: id.clone(),
            })
    }

    fn update(
        &self,
        id: &CorrelationId,
        f: &mut dyn FnMut(&mut PendingCorrelation),
    ) -> Result<(), StoreError> {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                f(entry.value_mut());
                Ok(())
            }
            None => Err(StoreError::NotFound {
                correlation_id: id.clone(),
            }),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn expired(&self, now: Instant) -> Vec<CorrelationId> {
        self.entries
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn ids(&self) -> Vec<CorrelationId> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}
