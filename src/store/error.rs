use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Insert refused because it overlaps the named stored reservation.
    UniqueConstraint(Ulid),
    Timeout,
    LimitExceeded(&'static str),
    Unavailable(String),
    WalError(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UniqueConstraint(id) => {
                write!(f, "exclusion constraint violated by reservation: {id}")
            }
            StoreError::Timeout => write!(f, "store operation timed out"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
