use async_trait::async_trait;

use crate::model::Reservation;

use super::{RecordStore, ReservationIndex, StoreError};

/// Volatile store. Enforces the exclusion constraint natively.
#[derive(Default)]
pub struct InMemoryStore {
    index: ReservationIndex,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource_count(&self) -> usize {
        self.index.resource_count()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.index.insert(reservation).await
    }

    async fn query_by_resource(&self, resource_id: &str) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.index.by_resource(resource_id).await)
    }

    async fn query_all(&self) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.index.all().await)
    }
}
