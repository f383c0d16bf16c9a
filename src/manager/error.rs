use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// Malformed request. Retrying it unchanged fails the same way.
    Validation(String),
    /// Valid request that overlaps the named existing reservation.
    Conflict { existing: Ulid },
    Store(StoreError),
}

impl ReservationError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ReservationError::Validation(msg.into())
    }
}

impl std::fmt::Display for ReservationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationError::Validation(msg) => write!(f, "invalid request: {msg}"),
            ReservationError::Conflict { existing } => {
                write!(f, "overlaps with an existing reservation: {existing}")
            }
            ReservationError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ReservationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReservationError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ReservationError {
    /// A store-level exclusion violation is the same business conflict the
    /// manager's own check reports.
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueConstraint(existing) => ReservationError::Conflict { existing },
            other => ReservationError::Store(other),
        }
    }
}
