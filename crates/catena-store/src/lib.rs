//! Persistence for Catena observers.
//!
//! Only the root-of-trust identifier, the chain name, and the chain address
//! are ever stored. Statement queues are rebuilt from the ledger on every
//! start.

pub mod error;
pub mod file;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use file::FileStateStore;
pub use memory::InMemoryStateStore;
pub use record::{ChainRecord, StoredChain, NAME_FIELD_LEN, RECORD_LEN, STORED_CHAIN_LEN};
pub use traits::StateStore;
