//! Error type shared by the engine adapter and every structure built on it.

/// Storage errors.
///
/// Absence is never an error here: popping an empty list or looking up a
/// missing member yields `Ok(None)`.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Engine-level failure (I/O, corruption reported by RocksDB, injected fault)
    DatabaseError(String),
    /// A persisted record could not be decoded
    Corruption(String),
    /// Caller supplied a malformed argument; nothing was read or written
    InvalidArgument(String),
    /// A structure lock was poisoned by a panicking holder
    LockPoisoned(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DatabaseError(e) => write!(f, "Database error: {e}"),
            StoreError::Corruption(e) => write!(f, "Corrupted record: {e}"),
            StoreError::InvalidArgument(e) => write!(f, "Invalid argument: {e}"),
            StoreError::LockPoisoned(e) => write!(f, "Lock poisoned: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned(e.to_string())
    }
}

/// Result alias used throughout the store crate.
pub type StoreResult<T> = Result<T, StoreError>;
