use catena_ledger::TxRecord;
use catena_types::Address;

use crate::validator::{ChainTxValidator, ConnectedOutput};

/// Verdict on a transaction competing with a chain link for the same output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Same payload, correctly signed: a legitimate reissue.
    ConsistentReissue,
    /// Same payload but the signature cannot be verified yet.
    ConsistentUnsigned,
    /// A different payload, or not a chain transaction at all.
    Lie { reason: String },
}

impl Classification {
    pub fn is_lie(&self) -> bool {
        matches!(self, Self::Lie { .. })
    }
}

/// Classifies transactions that spend the same prior output as a chain link.
pub struct EquivocationDetector;

impl EquivocationDetector {
    /// Compare `candidate` against `incumbent`, the link occupying the
    /// position. `prev` is the output both spend, when the ledger still
    /// has it.
    pub fn classify(
        incumbent: &TxRecord,
        candidate: &TxRecord,
        chain_address: &Address,
        prev: Option<&ConnectedOutput>,
    ) -> Classification {
        let spent = incumbent.tx.inputs.first().map(|i| i.prev_out);
        if !ChainTxValidator::validate(&candidate.tx, Some(chain_address), prev, true, false) {
            let outpoint = spent.map_or_else(|| "?".to_owned(), |op| op.to_string());
            return Classification::Lie {
                reason: format!(
                    "non-chain transaction {} double spent outpoint {} of chain transaction {}",
                    candidate.txid, outpoint, incumbent.txid
                ),
            };
        }

        let ours = ChainTxValidator::payload(&incumbent.tx).unwrap_or_default();
        let theirs = ChainTxValidator::payload(&candidate.tx).unwrap_or_default();
        let signed = prev.is_some()
            && ChainTxValidator::validate(&candidate.tx, Some(chain_address), prev, true, true);

        if ours != theirs {
            return Classification::Lie {
                reason: format!(
                    "lie detected w.r.t. chain txid={}, stmt='{}': lying txid={}, stmt='{}', correctly signed={}",
                    incumbent.txid,
                    String::from_utf8_lossy(ours),
                    candidate.txid,
                    String::from_utf8_lossy(theirs),
                    signed
                ),
            };
        }

        if signed {
            Classification::ConsistentReissue
        } else {
            Classification::ConsistentUnsigned
        }
    }

    /// Classify every candidate other than the incumbent itself.
    pub fn classify_all<'a>(
        incumbent: &TxRecord,
        candidates: &'a [TxRecord],
        chain_address: &Address,
        prev: Option<&ConnectedOutput>,
    ) -> Vec<(&'a TxRecord, Classification)> {
        candidates
            .iter()
            .filter(|c| c.txid != incumbent.txid)
            .map(|c| (c, Self::classify(incumbent, c, chain_address, prev)))
            .collect()
    }
}
