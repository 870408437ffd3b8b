use std::collections::{HashSet, VecDeque};

use catena_dispatch::{ChainEvent, EventSink, Whistleblow};
use catena_ledger::TxRecord;
use catena_types::{Address, Statement, Txid};
use tracing::{debug, warn};

/// Everything an observer knows about one chain.
///
/// `building` holds the confirmed chain from genesis to tip, every entry
/// linked. `pending` holds, in order, detached copies of statements whose
/// transactions left the best chain and have not yet been re-confirmed or
/// superseded. Only the reconciliation engine mutates either queue.
#[derive(Clone, Debug)]
pub struct ChainState {
    pub(crate) root_txid: Txid,
    pub(crate) chain_address: Address,
    pub(crate) chain_name: Option<Vec<u8>>,
    pub(crate) building: Vec<Statement>,
    pub(crate) pending: VecDeque<Statement>,
    pub(crate) processed_root: bool,
    pub(crate) rebooting: bool,
    /// Ledger sequence of the newest snapshot reconciled against.
    pub(crate) applied_sequence: u64,
    reported: HashSet<Txid>,
}

impl ChainState {
    pub fn new(root_txid: Txid, chain_address: Address) -> Self {
        Self {
            root_txid,
            chain_address,
            chain_name: None,
            building: Vec::new(),
            pending: VecDeque::new(),
            processed_root: false,
            rebooting: false,
            applied_sequence: 0,
            reported: HashSet::new(),
        }
    }

    pub fn root_txid(&self) -> Txid {
        self.root_txid
    }

    pub fn chain_address(&self) -> Address {
        self.chain_address
    }

    pub fn chain_name(&self) -> Option<&[u8]> {
        self.chain_name.as_deref()
    }

    pub fn processed_root(&self) -> bool {
        self.processed_root
    }

    pub fn rebooting(&self) -> bool {
        self.rebooting
    }

    pub fn applied_sequence(&self) -> u64 {
        self.applied_sequence
    }

    /// The building queue, genesis first.
    pub fn building(&self) -> &[Statement] {
        &self.building
    }

    pub fn pending(&self) -> &VecDeque<Statement> {
        &self.pending
    }

    /// Statements after genesis.
    pub fn num_statements(&self) -> usize {
        self.building.len().saturating_sub(1)
    }

    /// Copy of the confirmed statements, genesis excluded.
    pub fn statements(&self, forward: bool) -> Vec<Statement> {
        let mut out: Vec<Statement> = self.building.iter().skip(1).cloned().collect();
        if !forward {
            out.reverse();
        }
        out
    }

    /// The authenticated root's payload is the chain name, whatever a
    /// previous run stored.
    pub(crate) fn mark_root_processed(&mut self, name: Vec<u8>) {
        if let Some(stored) = self.chain_name.as_ref().filter(|n| **n != name) {
            warn!(
                stored = %String::from_utf8_lossy(stored),
                root = %String::from_utf8_lossy(&name),
                "stored chain name differs from root-of-trust payload"
            );
        }
        self.chain_name = Some(name);
        self.processed_root = true;
    }

    pub(crate) fn tail_txid(&self) -> Option<Txid> {
        self.building.last().and_then(|s| s.txid().ok())
    }

    /// Report `offender` unless it was reported before. Returns whether an
    /// event was emitted.
    pub(crate) fn whistleblow<S: EventSink + ?Sized>(
        &mut self,
        offender: &TxRecord,
        reason: String,
        sink: &mut S,
    ) -> bool {
        if !self.reported.insert(offender.txid) {
            debug!(txid = %offender.txid, "already reported");
            return false;
        }
        warn!(txid = %offender.txid, %reason, "whistleblow");
        sink.emit(ChainEvent::Whistleblow(Whistleblow {
            txid: offender.txid,
            tx: offender.tx.clone(),
            reason,
        }));
        true
    }
}
