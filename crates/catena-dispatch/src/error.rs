use std::io;

/// Errors produced by the dispatch subsystem.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The worker thread could not be started.
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] io::Error),

    /// The dispatcher has shut down and no longer accepts events.
    #[error("dispatcher is shut down")]
    Shutdown,

    /// `flush` was called from inside a listener, which would wait on itself.
    #[error("flush called from the dispatch thread")]
    FlushFromListener,

    #[error("listener registry lock poisoned")]
    RegistryPoisoned,
}

/// Convenience alias used throughout the dispatch crate.
pub type Result<T> = std::result::Result<T, DispatchError>;
