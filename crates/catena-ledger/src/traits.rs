use catena_types::{Address, OutPoint, Txid};

use crate::error::LedgerError;
use crate::snapshot::LedgerSnapshot;
use crate::tx::{Confidence, Transaction, TxOutput, TxRecord};

/// Read boundary over a consistent view of the ledger.
///
/// Unknown identifiers yield `None`, never an error.
pub trait LedgerView {
    /// Version of the ledger this view was taken at. Comparable across views
    /// of one ledger only.
    fn sequence(&self) -> u64;

    fn transaction(&self, txid: &Txid) -> Option<TxRecord>;

    fn output(&self, outpoint: &OutPoint) -> Option<TxOutput>;

    /// The live transaction spending `outpoint`.
    ///
    /// Dead spenders are ignored. When several live spenders exist the most
    /// confirmed one wins, then the first seen.
    fn spender_of(&self, outpoint: &OutPoint) -> Option<TxRecord>;

    /// Every transaction spending `outpoint`, dead ones included, in
    /// first-seen order.
    fn spenders_of(&self, outpoint: &OutPoint) -> Vec<TxRecord>;

    /// Transactions with the given status, in first-seen order.
    fn transactions_with(&self, confidence: Confidence) -> Vec<TxRecord>;

    /// Unspent outputs paying `address`, in first-seen order.
    fn unspent_outputs(&self, address: &Address) -> Vec<(OutPoint, TxOutput)>;
}

/// A ledger that can hand out consistent snapshots.
///
/// Successive snapshots carry non-decreasing [`LedgerView::sequence`]
/// numbers, so a caller can tell a stale one from a fresh one.
pub trait LedgerSource: Send + Sync {
    fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError>;
}

/// Write boundary for publishing new transactions.
pub trait LedgerSubmit: Send + Sync {
    fn submit(&self, tx: Transaction) -> Result<Txid, LedgerError>;
}
