use std::collections::HashMap;

use catena_types::{Address, OutPoint, Txid};

use crate::traits::LedgerView;
use crate::tx::{Confidence, Transaction, TxOutput, TxRecord};

/// Owned, point-in-time copy of the ledger's transactions.
///
/// Reading a snapshot takes no locks, so it can be consulted while the
/// caller holds its own.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    records: HashMap<Txid, TxRecord>,
    order: Vec<Txid>,
    sequence: u64,
}

impl LedgerSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Record one more change in [`LedgerView::sequence`].
    pub fn advance(&mut self) {
        self.sequence += 1;
    }

    pub fn contains(&self, txid: &Txid) -> bool {
        self.records.contains_key(txid)
    }

    /// Insert a transaction, returning its identifier. Re-inserting a known
    /// transaction only updates its status.
    pub fn insert(&mut self, tx: Transaction, confidence: Confidence) -> Txid {
        let txid = tx.txid();
        if let Some(record) = self.records.get_mut(&txid) {
            record.confidence = confidence;
        } else {
            self.order.push(txid);
            self.records.insert(
                txid,
                TxRecord {
                    txid,
                    tx,
                    confidence,
                },
            );
        }
        txid
    }

    /// Update a transaction's status. Returns the previous status.
    pub fn set_confidence(&mut self, txid: &Txid, confidence: Confidence) -> Option<Confidence> {
        self.records.get_mut(txid).map(|record| {
            let previous = record.confidence;
            record.confidence = confidence;
            previous
        })
    }

    /// Records in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &TxRecord> {
        self.order.iter().filter_map(|txid| self.records.get(txid))
    }
}

impl LedgerView for LedgerSnapshot {
    /// Number of ledger changes this snapshot reflects.
    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn transaction(&self, txid: &Txid) -> Option<TxRecord> {
        self.records.get(txid).cloned()
    }

    fn output(&self, outpoint: &OutPoint) -> Option<TxOutput> {
        self.records
            .get(&outpoint.txid)
            .and_then(|r| r.tx.outputs.get(outpoint.index as usize))
            .cloned()
    }

    fn spender_of(&self, outpoint: &OutPoint) -> Option<TxRecord> {
        let mut best: Option<&TxRecord> = None;
        for record in self.iter() {
            if record.is_dead() || !record.tx.spends(outpoint) {
                continue;
            }
            let better = match best {
                Some(current) => record.confidence.rank() > current.confidence.rank(),
                None => true,
            };
            if better {
                best = Some(record);
            }
        }
        best.cloned()
    }

    fn spenders_of(&self, outpoint: &OutPoint) -> Vec<TxRecord> {
        self.iter()
            .filter(|r| r.tx.spends(outpoint))
            .cloned()
            .collect()
    }

    fn transactions_with(&self, confidence: Confidence) -> Vec<TxRecord> {
        self.iter()
            .filter(|r| r.confidence == confidence)
            .cloned()
            .collect()
    }

    fn unspent_outputs(&self, address: &Address) -> Vec<(OutPoint, TxOutput)> {
        let mut unspent = Vec::new();
        for record in self.iter().filter(|r| !r.is_dead()) {
            for (index, output) in record.tx.outputs.iter().enumerate() {
                if output.address() != Some(address) {
                    continue;
                }
                let outpoint = OutPoint::new(record.txid, index as u32);
                if self.spender_of(&outpoint).is_none() {
                    unspent.push((outpoint, output.clone()));
                }
            }
        }
        unspent
    }
}
