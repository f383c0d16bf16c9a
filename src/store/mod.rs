mod error;
mod exclusive;
mod index;
mod memory;
mod wal_store;

pub use error::StoreError;
pub use exclusive::Exclusive;
pub use index::{ReservationIndex, SharedResourceState};
pub use memory::InMemoryStore;
pub use wal_store::WalStore;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{Instant, timeout_at};

use crate::model::Reservation;

/// Durable keyed storage consumed by the reservation manager.
///
/// Implementations that can, enforce the no-overlap constraint themselves and
/// reject an offending insert with [`StoreError::UniqueConstraint`]. Those that
/// cannot should be wrapped in [`Exclusive`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, reservation: Reservation) -> Result<(), StoreError>;

    /// Insert unless `deadline` passes first. [`StoreError::Timeout`] means
    /// nothing was stored.
    ///
    /// The default drops the pending insert at the deadline, which is only
    /// sound when `insert` has no effect until its last step. Stores that
    /// commit from a background task must override it.
    async fn insert_before(
        &self,
        reservation: Reservation,
        deadline: Instant,
    ) -> Result<(), StoreError> {
        timeout_at(deadline, self.insert(reservation))
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Reservations for one resource, in any order.
    async fn query_by_resource(&self, resource_id: &str) -> Result<Vec<Reservation>, StoreError>;

    /// Every reservation, in any order.
    async fn query_all(&self) -> Result<Vec<Reservation>, StoreError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
        (**self).insert(reservation).await
    }

    async fn insert_before(
        &self,
        reservation: Reservation,
        deadline: Instant,
    ) -> Result<(), StoreError> {
        (**self).insert_before(reservation, deadline).await
    }

    async fn query_by_resource(&self, resource_id: &str) -> Result<Vec<Reservation>, StoreError> {
        (**self).query_by_resource(resource_id).await
    }

    async fn query_all(&self) -> Result<Vec<Reservation>, StoreError> {
        (**self).query_all().await
    }
}
