use catena_types::{OutPoint, Txid};

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction {0} is unknown to the ledger")]
    UnknownTransaction(Txid),

    #[error("transaction {0} was already submitted")]
    DuplicateTransaction(Txid),

    #[error("output {0} does not exist")]
    MissingOutput(OutPoint),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}
