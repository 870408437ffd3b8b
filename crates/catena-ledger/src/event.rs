use catena_types::Txid;
use serde::{Deserialize, Serialize};

use crate::tx::Confidence;

/// Metadata describing a switch to a different best chain.
///
/// Informational only: observers recompute their state from transaction
/// confidence rather than interpreting these numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reorganization {
    pub old_blocks: u64,
    pub new_blocks: u64,
    pub old_work: u128,
    pub new_work: u128,
}

/// A change published by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A transaction touching a watched address was first seen.
    TransactionSeen { txid: Txid, confidence: Confidence },
    /// An existing transaction changed confirmation status.
    ConfidenceChanged { txid: Txid, confidence: Confidence },
    /// Emitted once after a batch of related changes.
    WalletChanged,
    /// The best chain switched branches.
    Reorganized(Reorganization),
}

impl LedgerEvent {
    pub fn txid(&self) -> Option<Txid> {
        match self {
            Self::TransactionSeen { txid, .. } | Self::ConfidenceChanged { txid, .. } => {
                Some(*txid)
            }
            Self::WalletChanged | Self::Reorganized(_) => None,
        }
    }
}
