use std::sync::{RwLock, RwLockWriteGuard};

use catena_types::{Address, OutPoint, Txid};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::LedgerError;
use crate::event::{LedgerEvent, Reorganization};
use crate::snapshot::LedgerSnapshot;
use crate::traits::{LedgerSource, LedgerSubmit, LedgerView};
use crate::tx::{Confidence, Transaction, TxOutput};

/// Capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// In-memory ledger for tests, local demos, and embedding.
///
/// Mutations apply the usual double-spend rules: confirming a transaction
/// kills every competing spend of the same outputs (and their descendants),
/// and a newly seen spend that competes with unconfirmed ones puts all of
/// them in conflict. Events are published after the state lock is released.
pub struct InMemoryLedger {
    inner: RwLock<LedgerState>,
    events: broadcast::Sender<LedgerEvent>,
}

#[derive(Default)]
struct LedgerState {
    snapshot: LedgerSnapshot,
    next_nonce: u32,
    height: u64,
}

impl LedgerState {
    fn require(&self, txid: &Txid) -> Result<(), LedgerError> {
        if self.snapshot.contains(txid) {
            Ok(())
        } else {
            Err(LedgerError::UnknownTransaction(*txid))
        }
    }

    fn set(&mut self, txid: &Txid, confidence: Confidence, events: &mut Vec<LedgerEvent>) {
        let previous = self.snapshot.set_confidence(txid, confidence);
        if previous.is_some_and(|p| p != confidence) {
            events.push(LedgerEvent::ConfidenceChanged {
                txid: *txid,
                confidence,
            });
        }
    }

    fn kill_with_descendants(&mut self, txid: Txid, events: &mut Vec<LedgerEvent>) {
        let mut work = vec![txid];
        while let Some(next) = work.pop() {
            let Some(record) = self.snapshot.transaction(&next) else {
                continue;
            };
            self.set(&next, Confidence::Dead, events);
            for index in 0..record.tx.outputs.len() {
                let outpoint = OutPoint::new(next, index as u32);
                work.extend(
                    self.snapshot
                        .spenders_of(&outpoint)
                        .into_iter()
                        .filter(|r| !r.is_dead())
                        .map(|r| r.txid),
                );
            }
        }
    }

    fn confirm(&mut self, txid: &Txid, events: &mut Vec<LedgerEvent>) -> Result<(), LedgerError> {
        let record = self
            .snapshot
            .transaction(txid)
            .ok_or(LedgerError::UnknownTransaction(*txid))?;
        self.set(txid, Confidence::Building, events);
        self.height += 1;
        for input in &record.tx.inputs {
            let rivals: Vec<Txid> = self
                .snapshot
                .spenders_of(&input.prev_out)
                .into_iter()
                .filter(|r| r.txid != *txid && !r.is_dead())
                .map(|r| r.txid)
                .collect();
            for rival in rivals {
                self.kill_with_descendants(rival, events);
            }
        }
        Ok(())
    }

    fn receive(
        &mut self,
        tx: Transaction,
        events: &mut Vec<LedgerEvent>,
    ) -> Result<Txid, LedgerError> {
        let txid = tx.txid();
        if self.snapshot.contains(&txid) {
            return Err(LedgerError::DuplicateTransaction(txid));
        }

        let mut confidence = Confidence::Pending;
        let mut rivals = Vec::new();
        for input in &tx.inputs {
            let parent_dead = self
                .snapshot
                .transaction(&input.prev_out.txid)
                .is_some_and(|p| p.is_dead());
            if parent_dead {
                confidence = Confidence::Dead;
            }
            for rival in self.snapshot.spenders_of(&input.prev_out) {
                match rival.confidence {
                    Confidence::Dead => {}
                    Confidence::Building => confidence = Confidence::Dead,
                    _ => rivals.push(rival.txid),
                }
            }
        }
        let in_conflict = confidence != Confidence::Dead && !rivals.is_empty();
        if in_conflict {
            confidence = Confidence::InConflict;
        }

        self.snapshot.insert(tx, confidence);
        events.push(LedgerEvent::TransactionSeen { txid, confidence });
        if in_conflict {
            for rival in &rivals {
                self.set(rival, Confidence::InConflict, events);
            }
        }
        Ok(txid)
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            inner: RwLock::new(LedgerState::default()),
            events,
        }
    }

    /// Receive ledger events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Create a confirmed, input-less transaction paying `value` to `address`.
    pub fn fund(&self, address: Address, value: u64) -> Result<Txid, LedgerError> {
        self.mutate(|state, events| {
            let tx = Transaction {
                inputs: vec![],
                outputs: vec![TxOutput::pay_to(address, value)],
                lock_time: state.next_nonce,
            };
            state.next_nonce += 1;
            let txid = state.snapshot.insert(tx, Confidence::Building);
            state.height += 1;
            events.push(LedgerEvent::TransactionSeen {
                txid,
                confidence: Confidence::Building,
            });
            Ok(txid)
        })
    }

    /// Accept an unconfirmed transaction.
    pub fn receive_pending(&self, tx: Transaction) -> Result<Txid, LedgerError> {
        self.mutate(|state, events| state.receive(tx, events))
    }

    /// Accept a transaction and immediately confirm it.
    pub fn mine(&self, tx: Transaction) -> Result<Txid, LedgerError> {
        self.mutate(|state, events| {
            let txid = state.receive(tx, events)?;
            state.confirm(&txid, events)?;
            Ok(txid)
        })
    }

    /// Mark a known transaction as part of the best chain.
    pub fn confirm(&self, txid: &Txid) -> Result<(), LedgerError> {
        self.mutate(|state, events| state.confirm(txid, events))
    }

    /// Return a confirmed transaction to the unconfirmed pool.
    pub fn unconfirm(&self, txid: &Txid) -> Result<(), LedgerError> {
        self.mutate(|state, events| {
            state.require(txid)?;
            state.set(txid, Confidence::Pending, events);
            Ok(())
        })
    }

    /// Mark a transaction and everything spending from it dead.
    pub fn kill(&self, txid: &Txid) -> Result<(), LedgerError> {
        self.mutate(|state, events| {
            state.require(txid)?;
            state.kill_with_descendants(*txid, events);
            Ok(())
        })
    }

    /// Overwrite a transaction's status without applying conflict rules.
    pub fn set_confidence(&self, txid: &Txid, confidence: Confidence) -> Result<(), LedgerError> {
        self.mutate(|state, events| {
            state.require(txid)?;
            state.set(txid, confidence, events);
            Ok(())
        })
    }

    /// Switch branches: `disconnect` returns to pending, then `connect` is
    /// confirmed in order. Fails without changes if any identifier is unknown.
    pub fn reorganize(
        &self,
        disconnect: &[Txid],
        connect: &[Txid],
    ) -> Result<Reorganization, LedgerError> {
        self.mutate(|state, events| {
            for txid in disconnect.iter().chain(connect) {
                state.require(txid)?;
            }
            let old_height = state.height;
            for txid in disconnect {
                state.set(txid, Confidence::Pending, events);
            }
            state.height = state.height.saturating_sub(disconnect.len() as u64);
            for txid in connect {
                state.confirm(txid, events)?;
            }
            let reorg = Reorganization {
                old_blocks: disconnect.len() as u64,
                new_blocks: connect.len() as u64,
                old_work: u128::from(old_height),
                new_work: u128::from(state.height),
            };
            events.push(LedgerEvent::Reorganized(reorg));
            Ok(reorg)
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.inner.write().map_err(|_| LedgerError::LockPoisoned)
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut LedgerState, &mut Vec<LedgerEvent>) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut events = Vec::new();
        let out = {
            let mut state = self.write()?;
            let out = f(&mut state, &mut events)?;
            state.snapshot.advance();
            out
        };
        events.push(LedgerEvent::WalletChanged);
        debug!(count = events.len(), "publishing ledger events");
        for event in events {
            // No receivers is not an error for the ledger.
            let _ = self.events.send(event);
        }
        Ok(out)
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerSource for InMemoryLedger {
    fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let state = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(state.snapshot.clone())
    }
}

impl LedgerSubmit for InMemoryLedger {
    fn submit(&self, tx: Transaction) -> Result<Txid, LedgerError> {
        self.receive_pending(tx)
    }
}
