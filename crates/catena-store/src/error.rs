/// Errors from state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The stored bytes have the wrong size.
    #[error("record has {actual} bytes, expected {expected}")]
    BadLength { expected: usize, actual: usize },

    /// A chain name does not fit the fixed-size name field.
    #[error("chain name of {size} bytes exceeds the {max}-byte field")]
    NameTooLong { size: usize, max: usize },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state store lock poisoned")]
    LockPoisoned,
}

/// Convenience alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
