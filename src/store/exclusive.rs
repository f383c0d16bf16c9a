use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout_at};

use crate::model::Reservation;

use super::{RecordStore, StoreError};

/// Adds the exclusion constraint to a store that cannot express it.
///
/// Inserts for the same resource are serialized behind a per-resource mutex
/// and re-checked against the inner store before writing. Inserts for
/// different resources take different mutexes. Every insert must go through
/// this wrapper for the guarantee to hold.
pub struct Exclusive<S> {
    inner: S,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: RecordStore> Exclusive<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            locks: DashMap::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn lock_for(&self, resource_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(resource_id) {
            return lock.value().clone();
        }
        self.locks
            .entry(resource_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Lock the resource, re-check, then write. With a deadline, waiting for
    /// the lock and the re-check give up at it, and the write itself goes
    /// through the inner store's `insert_before`.
    async fn checked_insert(
        &self,
        reservation: Reservation,
        deadline: Option<Instant>,
    ) -> Result<(), StoreError> {
        let lock = self.lock_for(&reservation.resource_id);
        let _guard = match deadline {
            Some(d) => timeout_at(d, lock.lock())
                .await
                .map_err(|_| StoreError::Timeout)?,
            None => lock.lock().await,
        };

        let query = self.inner.query_by_resource(&reservation.resource_id);
        let existing = match deadline {
            Some(d) => timeout_at(d, query).await.map_err(|_| StoreError::Timeout)??,
            None => query.await?,
        };
        let span = reservation.span();
        if let Some(hit) = existing
            .iter()
            .find(|r| r.resource_id == reservation.resource_id && r.span().overlaps(&span))
        {
            return Err(StoreError::UniqueConstraint(hit.id));
        }
        match deadline {
            Some(d) => self.inner.insert_before(reservation, d).await,
            None => self.inner.insert(reservation).await,
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for Exclusive<S> {
    async fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.checked_insert(reservation, None).await
    }

    async fn insert_before(
        &self,
        reservation: Reservation,
        deadline: Instant,
    ) -> Result<(), StoreError> {
        self.checked_insert(reservation, Some(deadline)).await
    }

    async fn query_by_resource(&self, resource_id: &str) -> Result<Vec<Reservation>, StoreError> {
        self.inner.query_by_resource(resource_id).await
    }

    async fn query_all(&self) -> Result<Vec<Reservation>, StoreError> {
        self.inner.query_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::at;
    use std::time::Duration;
    use ulid::Ulid;

    /// Store with no constraint of its own, slow enough to expose races.
    #[derive(Default)]
    struct PlainStore {
        rows: Mutex<Vec<Reservation>>,
    }

    #[async_trait]
    impl RecordStore for PlainStore {
        async fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.rows.lock().await.push(reservation);
            Ok(())
        }

        async fn query_by_resource(
            &self,
            resource_id: &str,
        ) -> Result<Vec<Reservation>, StoreError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let rows = self.rows.lock().await;
            Ok(rows.iter().filter(|r| r.resource_id == resource_id).cloned().collect())
        }

        async fn query_all(&self) -> Result<Vec<Reservation>, StoreError> {
            Ok(self.rows.lock().await.clone())
        }
    }

    fn reservation(room: &str, start: u32, end: u32) -> Reservation {
        Reservation {
            id: Ulid::new(),
            resource_id: room.into(),
            start: at(start, 0),
            end: at(end, 0),
        }
    }

    #[tokio::test]
    async fn rejects_overlap_on_same_resource() {
        let store = Exclusive::new(PlainStore::default());
        let first = reservation("A101", 10, 11);
        store.insert(first.clone()).await.unwrap();

        let result = store.insert(reservation("A101", 10, 11)).await;
        assert_eq!(result, Err(StoreError::UniqueConstraint(first.id)));
        store.insert(reservation("A101", 11, 12)).await.unwrap();
        store.insert(reservation("B202", 10, 11)).await.unwrap();
        assert_eq!(store.inner().query_all().await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn serializes_concurrent_inserts() {
        let store = Arc::new(Exclusive::new(PlainStore::default()));

        let mut handles = Vec::new();
        for i in 0..8u32 {
            let store = store.clone();
            // All overlap 10:00-11:00
            handles.push(tokio::spawn(async move {
                store.insert(reservation("A101", 9 + i % 2, 11 + i % 3)).await
            }));
        }
        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(()) => ok += 1,
                Err(StoreError::UniqueConstraint(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.query_by_resource("A101").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deadline_reached_during_recheck_writes_nothing() {
        let store = Exclusive::new(PlainStore::default());
        // The re-check alone sleeps 5ms
        let deadline = Instant::now() + Duration::from_millis(1);
        let result = store.insert_before(reservation("A101", 10, 11), deadline).await;
        assert_eq!(result, Err(StoreError::Timeout));
        assert!(store.query_all().await.unwrap().is_empty());

        let later = Instant::now() + Duration::from_secs(5);
        store.insert_before(reservation("A101", 10, 11), later).await.unwrap();
        assert_eq!(store.query_all().await.unwrap().len(), 1);
    }
}
