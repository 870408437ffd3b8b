//! Reconciliation properties over random reorganization sequences.

use std::sync::Arc;

use catena_chain::{authenticate, reconcile, ChainState, Issuer, IssuerConfig};
use catena_crypto::SigningKey;
use catena_dispatch::ChainEvent;
use catena_ledger::{Confidence, InMemoryLedger, LedgerSource, LedgerView};
use catena_types::Txid;
use proptest::prelude::*;

const STATEMENTS: usize = 5;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(64);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

/// A chain whose root and statements are all submitted but unconfirmed.
/// Index 0 is the root.
fn unconfirmed_chain() -> (Arc<InMemoryLedger>, Vec<Txid>, Vec<String>, ChainState) {
    let ledger = Arc::new(InMemoryLedger::new());
    let mut issuer = Issuer::new(
        SigningKey::generate(),
        Arc::clone(&ledger),
        IssuerConfig::default(),
    );
    ledger.fund(issuer.address(), 1_000_000).unwrap();

    let mut txids = vec![issuer.create_chain(b"prop").unwrap().txid()];
    let mut payloads = vec!["prop".to_owned()];
    for i in 1..=STATEMENTS {
        let payload = format!("s{i}");
        txids.push(issuer.append_statement(payload.as_bytes()).unwrap().txid());
        payloads.push(payload);
    }

    let mut state = ChainState::new(txids[0], issuer.address());
    let snapshot = ledger.snapshot().unwrap();
    let mut sink: Vec<ChainEvent> = Vec::new();
    let root = snapshot.transaction(&txids[0]);
    assert!(authenticate(&mut state, root.as_ref(), &mut sink));
    assert!(sink.is_empty());
    (ledger, txids, payloads, state)
}

/// Successive best-chain depths: after each step exactly the first `depth`
/// transactions are confirmed.
fn depths() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..=STATEMENTS + 1, 1..40)
}

fn reorganize_to(ledger: &InMemoryLedger, txids: &[Txid], depth: usize) {
    for (i, txid) in txids.iter().enumerate() {
        let confidence = if i < depth {
            Confidence::Building
        } else {
            Confidence::Pending
        };
        ledger.set_confidence(txid, confidence).unwrap();
    }
}

fn payloads(statements: impl IntoIterator<Item = catena_types::Statement>) -> Vec<String> {
    statements.into_iter().map(|s| s.to_string()).collect()
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn building_queue_is_the_confirmed_prefix(depths in depths()) {
        let (ledger, txids, _, mut state) = unconfirmed_chain();

        for depth in depths {
            reorganize_to(&ledger, &txids, depth);
            let snapshot = ledger.snapshot().unwrap();
            let mut sink: Vec<ChainEvent> = Vec::new();
            reconcile(&mut state, &snapshot, true, &mut sink);

            let expected: Vec<Txid> = txids[..depth].to_vec();
            let actual: Vec<Txid> = state
                .building()
                .iter()
                .map(|s| s.txid().unwrap())
                .collect();
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn nothing_is_lost_and_passes_are_idempotent(depths in depths()) {
        let (ledger, txids, all, mut state) = unconfirmed_chain();
        // What a subscriber believes the chain to be.
        let mut seen: Vec<String> = Vec::new();
        let mut high_water = 0;

        for depth in depths {
            reorganize_to(&ledger, &txids, depth);
            let snapshot = ledger.snapshot().unwrap();
            let mut sink: Vec<ChainEvent> = Vec::new();
            reconcile(&mut state, &snapshot, true, &mut sink);

            for event in sink {
                match event {
                    ChainEvent::Appended(s) => seen.push(s.to_string()),
                    ChainEvent::Withdrawn(s) => {
                        let position = seen.iter().position(|p| *p == s.to_string());
                        prop_assert!(position.is_some(), "withdrew unseen {}", s);
                        if let Some(position) = position {
                            seen.remove(position);
                        }
                    }
                    other => prop_assert!(false, "unexpected event {:?}", other),
                }
            }
            prop_assert_eq!(&seen, &payloads(state.statements(true)));

            // Building then pending always spells a prefix of the chain, and
            // it never shrinks: every statement ever confirmed is accounted for.
            let tracked: Vec<String> = payloads(
                state.building().iter().cloned().chain(state.pending().iter().cloned()),
            );
            prop_assert!(tracked.len() <= all.len());
            prop_assert_eq!(&tracked[..], &all[..tracked.len()]);
            prop_assert!(tracked.len() >= high_water);
            high_water = tracked.len();

            let mut again: Vec<ChainEvent> = Vec::new();
            let report = reconcile(&mut state, &snapshot, true, &mut again);
            prop_assert!(report.is_noop());
            prop_assert!(again.is_empty());
        }
    }
}
