//! Ledger boundary for Catena.
//!
//! Catena observers never talk to the network directly. They consume a
//! ledger through three traits: [`LedgerView`] for lock-free lookups on a
//! [`LedgerSnapshot`], [`LedgerSource`] for taking snapshots, and
//! [`LedgerSubmit`] for publishing new transactions. Changes arrive as
//! [`LedgerEvent`]s on a broadcast channel.
//!
//! [`InMemoryLedger`] implements the whole boundary for tests and embedding.

pub mod error;
pub mod event;
pub mod memory;
pub mod snapshot;
pub mod traits;
pub mod tx;

pub use error::LedgerError;
pub use event::{LedgerEvent, Reorganization};
pub use memory::InMemoryLedger;
pub use snapshot::LedgerSnapshot;
pub use traits::{LedgerSource, LedgerSubmit, LedgerView};
pub use tx::{
    Confidence, InputError, OutputScript, Transaction, TxInput, TxOutput, TxRecord, Witness,
};
