use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::limits::{MAX_RESERVATIONS_PER_RESOURCE, MAX_RESOURCE_ID_LEN};
use crate::model::{Reservation, ResourceState};

use super::StoreError;

pub type SharedResourceState = Arc<RwLock<ResourceState>>;

/// In-memory reservation index shared by the concrete stores.
///
/// One `RwLock` per resource: writers on different resources never contend,
/// and holding a resource's write lock across check + insert is what makes
/// the exclusion constraint atomic.
pub struct ReservationIndex {
    resources: DashMap<String, SharedResourceState>,
    next_seq: AtomicU64,
}

impl Default for ReservationIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ReservationIndex {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn get_resource(&self, resource_id: &str) -> Option<SharedResourceState> {
        self.resources.get(resource_id).map(|e| e.value().clone())
    }

    /// Get the state for a resource, creating an empty one on first use.
    pub fn resource(&self, resource_id: &str) -> SharedResourceState {
        if let Some(rs) = self.get_resource(resource_id) {
            return rs;
        }
        self.resources
            .entry(resource_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Ids past the key size limit are refused before any state is created for them.
    pub fn check_resource_id(resource_id: &str) -> Result<(), StoreError> {
        if resource_id.len() > MAX_RESOURCE_ID_LEN {
            return Err(StoreError::LimitExceeded("resource id too long"));
        }
        Ok(())
    }

    /// Check the exclusion constraint against a locked resource.
    pub fn check_insert(rs: &ResourceState, reservation: &Reservation) -> Result<(), StoreError> {
        Self::check_resource_id(&reservation.resource_id)?;
        if rs.len() >= MAX_RESERVATIONS_PER_RESOURCE {
            return Err(StoreError::LimitExceeded("too many reservations on resource"));
        }
        match rs.overlapping(&reservation.span()).next() {
            Some(existing) => Err(StoreError::UniqueConstraint(existing.id)),
            None => Ok(()),
        }
    }

    /// Apply an insert directly to a ResourceState (no locking, caller holds the lock).
    pub fn apply(&self, rs: &mut ResourceState, reservation: Reservation) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        rs.insert(seq, reservation);
    }

    /// Check + apply under the resource's write lock.
    pub async fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
        Self::check_resource_id(&reservation.resource_id)?;
        let rs = self.resource(&reservation.resource_id);
        let mut guard = rs.write().await;
        Self::check_insert(&guard, &reservation)?;
        self.apply(&mut guard, reservation);
        Ok(())
    }

    /// Reservations for one resource, ordered by start then insertion.
    pub async fn by_resource(&self, resource_id: &str) -> Vec<Reservation> {
        let Some(rs) = self.get_resource(resource_id) else {
            return Vec::new();
        };
        let guard = rs.read().await;
        guard.reservations().cloned().collect()
    }

    /// Every reservation, in insertion order.
    pub async fn all(&self) -> Vec<Reservation> {
        // Snapshot the Arcs first; never hold a DashMap shard across an await.
        let states: Vec<SharedResourceState> =
            self.resources.iter().map(|e| e.value().clone()).collect();
        let mut entries = Vec::new();
        for rs in states {
            let guard = rs.read().await;
            entries.extend(guard.entries.iter().cloned());
        }
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, r)| r).collect()
    }
}
