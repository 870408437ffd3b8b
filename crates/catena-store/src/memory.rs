use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::record::StoredChain;
use crate::traits::StateStore;

/// In-memory state store for tests and embedding.
#[derive(Default)]
pub struct InMemoryStateStore {
    chain: RwLock<Option<StoredChain>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `chain`, as after a previous run.
    pub fn with_chain(chain: StoredChain) -> Self {
        Self {
            chain: RwLock::new(Some(chain)),
        }
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self) -> StoreResult<Option<StoredChain>> {
        self.chain
            .read()
            .map(|c| c.clone())
            .map_err(|_| StoreError::LockPoisoned)
    }

    fn save(&self, chain: &StoredChain) -> StoreResult<()> {
        // Validate the layout even though nothing is written to disk.
        chain.encode()?;
        let mut slot = self.chain.write().map_err(|_| StoreError::LockPoisoned)?;
        *slot = Some(chain.clone());
        Ok(())
    }
}
