use crate::error::StoreResult;
use crate::record::StoredChain;

/// Durable home for an observer's chain identity.
///
/// Implementations must make `save` atomic: a concurrent or interrupted save
/// leaves either the old or the new value, never a mix.
pub trait StateStore: Send + Sync {
    /// Returns `Ok(None)` if nothing has been saved yet.
    fn load(&self) -> StoreResult<Option<StoredChain>>;

    fn save(&self, chain: &StoredChain) -> StoreResult<()>;
}

impl<T: StateStore + ?Sized> StateStore for std::sync::Arc<T> {
    fn load(&self) -> StoreResult<Option<StoredChain>> {
        (**self).load()
    }

    fn save(&self, chain: &StoredChain) -> StoreResult<()> {
        (**self).save(chain)
    }
}
