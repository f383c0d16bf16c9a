use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::model::{Event, Reservation};
use crate::wal::Wal;

use super::{RecordStore, ReservationIndex, StoreError};

// ── Group-commit WAL channel ─────────────────────────────

struct WalAppend {
    event: Event,
    response: oneshot::Sender<io::Result<()>>,
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first append arrives.
/// 2. Drain all immediately available appends (the batch window).
/// 3. Single flush_sync for the whole batch.
/// 4. Respond to all senders with the batch result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalAppend>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
            .record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        flush_batch(&mut wal, batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
    }
    debug!(
        "WAL writer for {} stopped after {} appends",
        wal.path().display(),
        wal.appends()
    );
}

/// Stage every event that encodes, commit them as one unit, answer each sender.
/// An event that fails to stage is answered on its own and never reaches disk;
/// a failed commit leaves the file as it was before the batch.
fn flush_batch(wal: &mut Wal, batch: Vec<WalAppend>) {
    let mut staged = Vec::with_capacity(batch.len());
    for append in batch {
        match wal.append_buffered(&append.event) {
            Ok(()) => staged.push(append),
            Err(e) => {
                let _ = append.response.send(Err(e));
            }
        }
    }
    let result = wal.flush_sync();
    respond_batch(staged, &result);
}

fn respond_batch(batch: Vec<WalAppend>, result: &io::Result<()>) {
    for append in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = append.response.send(r);
    }
}

struct Inner {
    index: ReservationIndex,
    wal_tx: mpsc::Sender<WalAppend>,
    path: PathBuf,
}

/// Run `op` unless `deadline` passes first. Only for steps that have no
/// effect when dropped unfinished.
async fn before<T>(
    deadline: Option<Instant>,
    op: impl Future<Output = T>,
) -> Result<T, StoreError> {
    match deadline {
        Some(deadline) => timeout_at(deadline, op)
            .await
            .map_err(|_| StoreError::Timeout),
        None => Ok(op.await),
    }
}

impl Inner {
    /// Write event to WAL via the background group-commit writer. The deadline
    /// only covers handing the event over; once the writer has it, the commit
    /// outcome is awaited in full.
    async fn wal_append(&self, event: Event, deadline: Option<Instant>) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        let append = WalAppend {
            event,
            response: tx,
        };
        before(deadline, self.wal_tx.send(append))
            .await?
            .map_err(|_| StoreError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::WalError(e.to_string()))
    }

    /// Lock resource, check, log, apply. The reservation only becomes visible
    /// once it is durable, and the lock is held throughout.
    ///
    /// `Timeout` is only returned before the event reaches the WAL writer, so
    /// it always means nothing was stored.
    async fn insert(
        &self,
        reservation: Reservation,
        deadline: Option<Instant>,
    ) -> Result<(), StoreError> {
        ReservationIndex::check_resource_id(&reservation.resource_id)?;
        let rs = self.index.resource(&reservation.resource_id);
        let mut guard = before(deadline, rs.write()).await?;
        ReservationIndex::check_insert(&guard, &reservation)?;
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StoreError::Timeout);
        }
        self.wal_append(Event::from(&reservation), deadline).await?;
        self.index.apply(&mut guard, reservation);
        Ok(())
    }

    /// Run the insert on its own task so that a caller giving up cannot
    /// interrupt it between the WAL append and the index update.
    async fn spawn_insert(
        self: &Arc<Self>,
        reservation: Reservation,
        deadline: Option<Instant>,
    ) -> Result<(), StoreError> {
        let inner = self.clone();
        tokio::spawn(async move { inner.insert(reservation, deadline).await })
            .await
            .map_err(|e| StoreError::Unavailable(format!("insert task failed: {e}")))?
    }
}

/// Durable store: an append-only WAL replayed into a per-resource index on open.
///
/// Must be opened from within a tokio runtime (it spawns its writer task).
#[derive(Clone)]
pub struct WalStore {
    inner: Arc<Inner>,
}

impl WalStore {
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let events = Wal::replay(&path)?;
        let wal = Wal::open(&path)?;

        // Sole owner of the state during replay, so try_write never contends.
        // Never use blocking_write here: we are usually inside an async context.
        let index = ReservationIndex::new();
        let mut replayed = 0usize;
        for event in events {
            let reservation = Reservation::from(event);
            let rs = index.resource(&reservation.resource_id);
            let mut guard = rs
                .try_write()
                .map_err(|_| io::Error::other("replay: resource state contended"))?;
            // The log is only trusted as far as the constraint holds.
            if let Err(e) = ReservationIndex::check_insert(&guard, &reservation) {
                warn!("replay: skipping reservation {}: {e}", reservation.id);
                continue;
            }
            index.apply(&mut guard, reservation);
            replayed += 1;
        }
        info!(
            "opened {} ({replayed} reservations, {} resources)",
            path.display(),
            index.resource_count()
        );

        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        Ok(Self {
            inner: Arc::new(Inner {
                index,
                wal_tx,
                path,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn resource_count(&self) -> usize {
        self.inner.index.resource_count()
    }
}

#[async_trait]
impl RecordStore for WalStore {
    async fn insert(&self, reservation: Reservation) -> Result<(), StoreError> {
        self.inner.spawn_insert(reservation, None).await
    }

    /// The deadline is enforced inside the spawned insert, never by dropping it.
    async fn insert_before(
        &self,
        reservation: Reservation,
        deadline: Instant,
    ) -> Result<(), StoreError> {
        self.inner.spawn_insert(reservation, Some(deadline)).await
    }

    async fn query_by_resource(&self, resource_id: &str) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.inner.index.by_resource(resource_id).await)
    }

    async fn query_all(&self) -> Result<Vec<Reservation>, StoreError> {
        Ok(self.inner.index.all().await)
    }
}
