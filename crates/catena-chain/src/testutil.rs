//! Shared fixtures for unit tests.

use std::sync::Arc;

use catena_crypto::SigningKey;
use catena_ledger::{InMemoryLedger, LedgerSource, LedgerView, Transaction, TxInput, TxOutput};
use catena_types::{Address, OutPoint, Txid};

use crate::state::ChainState;

pub(crate) const FUNDING: u64 = 1_000_000;
pub(crate) const FEE: u64 = 1_000;

/// A funded chain whose root-of-trust is already confirmed.
pub(crate) struct Fixture {
    pub key: SigningKey,
    pub address: Address,
    pub ledger: Arc<InMemoryLedger>,
    pub root: Txid,
}

impl Fixture {
    pub fn new() -> Self {
        let key = SigningKey::generate();
        let address = key.address();
        let ledger = Arc::new(InMemoryLedger::new());
        let funding = ledger.fund(address, FUNDING).unwrap();
        let mut root_tx = Transaction::new(
            vec![TxInput::unsigned(OutPoint::new(funding, 0))],
            vec![
                TxOutput::pay_to(address, FUNDING - FEE),
                TxOutput::data(b"testchain".to_vec(), 0),
            ],
        );
        root_tx.sign_input(0, &key).unwrap();
        let root = ledger.mine(root_tx).unwrap();
        Self {
            key,
            address,
            ledger,
            root,
        }
    }

    /// A signed chain transaction spending output 0 of `prev`.
    pub fn statement(&self, prev: Txid, payload: &[u8]) -> Transaction {
        self.statement_with_nonce(prev, payload, 0)
    }

    /// Like [`statement`](Self::statement), with a lock time so that equal
    /// payloads can produce distinct transactions.
    pub fn statement_with_nonce(&self, prev: Txid, payload: &[u8], nonce: u32) -> Transaction {
        let value = self
            .ledger
            .snapshot()
            .unwrap()
            .output(&OutPoint::new(prev, 0))
            .map(|o| o.value)
            .unwrap_or(FUNDING);
        let mut tx = Transaction::new(
            vec![TxInput::unsigned(OutPoint::new(prev, 0))],
            vec![
                TxOutput::pay_to(self.address, value.saturating_sub(FEE)),
                TxOutput::data(payload.to_vec(), 0),
            ],
        );
        tx.lock_time = nonce;
        tx.sign_input(0, &self.key).unwrap();
        tx
    }

    pub fn mine_statement(&self, prev: Txid, payload: &[u8]) -> Txid {
        self.ledger.mine(self.statement(prev, payload)).unwrap()
    }

    pub fn state(&self) -> ChainState {
        let mut state = ChainState::new(self.root, self.address);
        state.mark_root_processed(b"testchain".to_vec());
        state
    }
}
