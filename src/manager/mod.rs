mod conflict;
mod error;

pub use conflict::Normalized;
pub use error::ReservationError;

use std::future::Future;
use std::time::{Duration, Instant};

use futures::future::try_join_all;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::MAX_CANDIDATES;
use crate::model::*;
use crate::observability;
use crate::store::{RecordStore, StoreError};

use conflict::{first_overlap, normalize_resource_id, normalize_span, sort_by_start};

/// Stateless booking logic over an injected [`RecordStore`].
///
/// Every call validates its input, reads the store, and (for creates) writes
/// at most one record. The no-overlap guarantee under concurrency comes from
/// the store rejecting conflicting inserts; the manager only translates that
/// rejection into [`ReservationError::Conflict`].
pub struct ReservationManager<S> {
    store: S,
    timeout: Option<Duration>,
}

impl<S: RecordStore> ReservationManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: None,
        }
    }

    /// Bound every store call. An elapsed call fails with [`StoreError::Timeout`],
    /// and a create that times out has stored nothing.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Trim and check the id, check `end > start`.
    pub fn normalize(
        resource_id: &str,
        start: LocalDateTime,
        end: LocalDateTime,
    ) -> Result<Normalized, ReservationError> {
        let resource_id = normalize_resource_id(resource_id)?;
        let span = normalize_span(start, end)?;
        Ok(Normalized { resource_id, span })
    }

    async fn call<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .map_err(|_| StoreError::Timeout)?,
            None => op.await,
        }
    }

    /// The store enforces the timeout itself, so that `Timeout` always means
    /// the reservation was not stored.
    async fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
        match self.timeout {
            Some(limit) => {
                let deadline = tokio::time::Instant::now() + limit;
                self.store.insert_before(reservation, deadline).await
            }
            None => self.store.insert(reservation).await,
        }
    }

    async fn overlapping(&self, req: &Normalized) -> Result<Option<Ulid>, ReservationError> {
        let existing = self.call(self.store.query_by_resource(&req.resource_id)).await?;
        Ok(first_overlap(&existing, &req.resource_id, &req.span).map(|r| r.id))
    }

    pub async fn create_reservation(
        &self,
        resource_id: &str,
        start: LocalDateTime,
        end: LocalDateTime,
    ) -> Result<Ulid, ReservationError> {
        let started = Instant::now();
        let result = self.try_create(resource_id, start, end).await;
        metrics::histogram!(observability::CREATE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(
            observability::RESERVATIONS_TOTAL,
            "outcome" => observability::create_outcome(&result)
        )
        .increment(1);
        result
    }

    async fn try_create(
        &self,
        resource_id: &str,
        start: LocalDateTime,
        end: LocalDateTime,
    ) -> Result<Ulid, ReservationError> {
        let req = Self::normalize(resource_id, start, end)?;

        if let Some(existing) = self.overlapping(&req).await? {
            debug!("{} [{start}, {end}) conflicts with {existing}", req.resource_id);
            return Err(ReservationError::Conflict { existing });
        }

        let reservation = Reservation {
            id: Ulid::new(),
            resource_id: req.resource_id,
            start: req.span.start,
            end: req.span.end,
        };
        let id = reservation.id;
        match self.insert(reservation).await {
            Ok(()) => {
                info!("reservation {id} created for {}", resource_id.trim());
                Ok(id)
            }
            Err(StoreError::UniqueConstraint(existing)) => {
                debug!("store rejected {id}: lost race to {existing}");
                Err(ReservationError::Conflict { existing })
            }
            Err(e) => {
                warn!("insert of {id} failed: {e}");
                Err(ReservationError::Store(e))
            }
        }
    }

    pub async fn is_available(
        &self,
        resource_id: &str,
        start: LocalDateTime,
        end: LocalDateTime,
    ) -> Result<bool, ReservationError> {
        let req = Self::normalize(resource_id, start, end)?;
        Ok(self.overlapping(&req).await?.is_none())
    }

    /// Reservations on one resource, ascending by start. Equal starts keep
    /// insertion order.
    pub async fn list_by_resource(
        &self,
        resource_id: &str,
    ) -> Result<Vec<Reservation>, ReservationError> {
        let resource_id = normalize_resource_id(resource_id)?;
        let mut found = self.call(self.store.query_by_resource(&resource_id)).await?;
        found.retain(|r| r.resource_id == resource_id);
        sort_by_start(&mut found);
        Ok(found)
    }

    pub async fn list_all(&self) -> Result<Vec<Reservation>, ReservationError> {
        let mut all = self.call(self.store.query_all()).await?;
        sort_by_start(&mut all);
        Ok(all)
    }

    /// The candidates free for the whole of `[start, end)`, in input order.
    /// Candidates are checked concurrently.
    pub async fn available_resources<T: AsRef<str>>(
        &self,
        candidates: &[T],
        start: LocalDateTime,
        end: LocalDateTime,
    ) -> Result<Vec<String>, ReservationError> {
        if candidates.len() > MAX_CANDIDATES {
            return Err(ReservationError::invalid("too many candidate resources"));
        }
        let span = normalize_span(start, end)?;
        let requests = candidates
            .iter()
            .map(|c| {
                let resource_id = normalize_resource_id(c.as_ref())?;
                Ok::<_, ReservationError>(Normalized { resource_id, span })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let checks = requests.into_iter().map(|req| async move {
            let free = self.overlapping(&req).await?.is_none();
            Ok::<_, ReservationError>(free.then_some(req.resource_id))
        });
        let free = try_join_all(checks).await?;
        Ok(free.into_iter().flatten().collect())
    }
}
