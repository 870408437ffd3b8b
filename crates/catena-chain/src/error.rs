use catena_dispatch::DispatchError;
use catena_ledger::{InputError, LedgerError};
use catena_store::StoreError;
use catena_types::{OutPoint, Txid};

use crate::validator::InvalidChainTx;

/// Errors raised by the observer.
///
/// Protocol anomalies are never errors: they surface as whistleblow events.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("no root-of-trust transaction configured or stored")]
    MissingRoot,

    #[error("no chain address configured or stored")]
    MissingChainAddress,

    #[error("configured root {configured} differs from stored root {stored}")]
    RootMismatch { configured: Txid, stored: Txid },

    #[error("chain state lock poisoned")]
    LockPoisoned,
}

/// Errors raised while constructing statements.
#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("payload of {size} bytes exceeds the {max}-byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("no root-of-trust transaction has been created")]
    RootNotEstablished,

    #[error("root-of-trust transaction {0} already exists")]
    RootAlreadyEstablished(Txid),

    #[error("expected exactly one funding output, found {0}")]
    AmbiguousFunding(usize),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("no unspent chain output to extend")]
    NoChainOutput,

    #[error("output {0} is unknown to the ledger")]
    MissingOutput(OutPoint),

    #[error("built transaction is not a valid chain transaction: {0}")]
    InvalidTransaction(#[from] InvalidChainTx),

    #[error("signing failed: {0}")]
    Signing(#[from] InputError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ChainError>;
