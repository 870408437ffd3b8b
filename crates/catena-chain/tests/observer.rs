//! End-to-end behaviour of an observer following an issuer's chain on an
//! in-memory ledger.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use catena_chain::{ChainObserver, Issuer, IssuerConfig, IssuerError, ObserverConfig};
use catena_crypto::SigningKey;
use catena_dispatch::{ChainEvent, EventKind, EventStream};
use catena_ledger::{InMemoryLedger, LedgerSource, LedgerView, Transaction, TxInput, TxOutput};
use catena_store::{FileStateStore, InMemoryStateStore, StateStore};
use catena_types::{OutPoint, Txid};

const FUNDING: u64 = 1_000_000;

struct Harness {
    key: [u8; 32],
    ledger: Arc<InMemoryLedger>,
    issuer: Issuer<InMemoryLedger>,
    root: Txid,
}

impl Harness {
    /// A confirmed chain called "news" with `n` confirmed statements.
    fn new(n: usize) -> Result<(Self, Vec<Txid>)> {
        let key = SigningKey::generate();
        let key_bytes = key.secret();
        let ledger = Arc::new(InMemoryLedger::new());
        let mut issuer = Issuer::new(key, Arc::clone(&ledger), IssuerConfig::default());
        ledger.fund(issuer.address(), FUNDING)?;
        let root = issuer.create_chain(b"news")?.txid();
        ledger.confirm(&root)?;

        let mut txids = Vec::new();
        for i in 1..=n {
            let txid = issuer.append_statement(format!("s{i}").as_bytes())?.txid();
            ledger.confirm(&txid)?;
            txids.push(txid);
        }
        let harness = Self {
            key: key_bytes,
            ledger,
            issuer,
            root,
        };
        Ok((harness, txids))
    }

    fn config(&self) -> ObserverConfig {
        ObserverConfig {
            root_txid: Some(self.root),
            chain_address: Some(self.issuer.address()),
            ..ObserverConfig::default()
        }
    }

    fn observer<S: StateStore>(&self, store: S) -> Result<ChainObserver<InMemoryLedger, S>> {
        Ok(ChainObserver::open(&self.config(), Arc::clone(&self.ledger), store)?)
    }

    /// A second issuer on the same key whose transactions differ from the
    /// first one's by fee alone.
    fn twin(&self) -> Issuer<InMemoryLedger> {
        let config = IssuerConfig {
            fee: 1_500,
            ..IssuerConfig::default()
        };
        Issuer::new(SigningKey::from_secret(self.key), Arc::clone(&self.ledger), config)
            .with_root(self.root)
    }
}

fn collect<L, S>(observer: &ChainObserver<L, S>, rx: &mut EventStream) -> Result<Vec<ChainEvent>>
where
    L: LedgerSource,
    S: StateStore,
{
    observer.flush()?;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    Ok(events)
}

fn of_kind(events: &[ChainEvent], kind: EventKind) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.kind() == kind)
        .filter_map(ChainEvent::statement)
        .map(|s| s.to_string())
        .collect()
}

fn whistleblown(events: &[ChainEvent]) -> Vec<Txid> {
    events
        .iter()
        .filter_map(|e| match e {
            ChainEvent::Whistleblow(w) => Some(w.txid),
            _ => None,
        })
        .collect()
}

#[test]
fn rollback_then_reconfirmation_round_trip() -> Result<()> {
    let (h, txids) = Harness::new(3)?;
    let observer = h.observer(InMemoryStateStore::new())?;
    let mut rx = observer.stream(&EventKind::ALL)?;
    let mut ledger_rx = h.ledger.subscribe();

    observer.sync()?;
    let events = collect(&observer, &mut rx)?;
    assert_eq!(of_kind(&events, EventKind::Appended), ["s1", "s2", "s3"]);

    h.ledger.reorganize(&txids[1..], &[])?;
    observer.drain(&mut ledger_rx)?;
    let events = collect(&observer, &mut rx)?;
    assert_eq!(of_kind(&events, EventKind::Withdrawn), ["s2", "s3"]);
    assert!(events
        .iter()
        .any(|e| matches!(e, ChainEvent::Reorganized(r) if r.old_blocks == 2)));
    assert_eq!(observer.num_statements()?, 1);
    assert_eq!(observer.pending_len()?, 2);

    h.ledger.reorganize(&[], &txids[1..])?;
    observer.drain(&mut ledger_rx)?;
    let events = collect(&observer, &mut rx)?;
    assert_eq!(of_kind(&events, EventKind::Appended), ["s2", "s3"]);
    assert!(whistleblown(&events).is_empty());
    assert_eq!(observer.num_statements()?, 3);
    assert_eq!(observer.pending_len()?, 0);
    Ok(())
}

#[test]
fn replacement_with_same_payloads_is_silent() -> Result<()> {
    let (h, txids) = Harness::new(3)?;
    let observer = h.observer(InMemoryStateStore::new())?;
    let mut rx = observer.stream(&EventKind::ALL)?;
    observer.sync()?;
    collect(&observer, &mut rx)?;

    let twin = h.twin();
    let s2b = twin.build_statement_on(OutPoint::new(txids[0], 0), b"s2")?;
    let s2b = h.ledger.receive_pending(s2b)?;
    let s3b = twin.build_statement_on(OutPoint::new(s2b, 0), b"s3")?;
    let s3b = h.ledger.receive_pending(s3b)?;
    h.ledger.reorganize(&txids[1..], &[s2b, s3b])?;

    let report = observer.sync()?;
    assert_eq!(report.reinstated, 2);
    let events = collect(&observer, &mut rx)?;
    assert!(of_kind(&events, EventKind::Appended).is_empty());
    assert!(of_kind(&events, EventKind::Withdrawn).is_empty());
    assert!(whistleblown(&events).is_empty());

    let state = observer.state()?;
    let tip = state.building().last().map(|s| s.txid()).transpose()?;
    assert_eq!(tip, Some(s3b));
    Ok(())
}

#[test]
fn equivocation_is_reported_exactly_once() -> Result<()> {
    let (h, txids) = Harness::new(2)?;
    let observer = h.observer(InMemoryStateStore::new())?;
    let mut rx = observer.stream(&[EventKind::Whistleblow])?;
    let mut ledger_rx = h.ledger.subscribe();
    observer.sync()?;

    let lie = h
        .twin()
        .build_statement_on(OutPoint::new(txids[0], 0), b"something else")?;
    let lie = h.ledger.receive_pending(lie)?;
    let snapshot = h.ledger.snapshot()?;
    assert!(snapshot.transaction(&lie).is_some_and(|r| r.is_dead()));

    observer.drain(&mut ledger_rx)?;
    observer.sync()?;
    h.ledger.fund(h.issuer.address(), 1)?;
    observer.drain(&mut ledger_rx)?;

    let events = collect(&observer, &mut rx)?;
    assert_eq!(whistleblown(&events), vec![lie]);
    match &events[0] {
        ChainEvent::Whistleblow(w) => assert!(w.reason.contains("lie detected")),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(observer.num_statements()?, 2);
    Ok(())
}

#[test]
fn root_paying_another_address_is_rejected() -> Result<()> {
    let (h, _) = Harness::new(1)?;
    let stranger = SigningKey::generate().address();
    let config = ObserverConfig {
        chain_address: Some(stranger),
        ..h.config()
    };
    let observer = ChainObserver::open(&config, Arc::clone(&h.ledger), InMemoryStateStore::new())?;
    let mut rx = observer.stream(&EventKind::ALL)?;

    observer.sync()?;
    observer.sync()?;
    let events = collect(&observer, &mut rx)?;
    assert_eq!(whistleblown(&events), vec![h.root]);
    assert!(!observer.is_root_authenticated()?);
    assert_eq!(observer.num_statements()?, 0);
    Ok(())
}

#[test]
fn non_chain_root_is_rejected() -> Result<()> {
    let (h, _) = Harness::new(0)?;
    let funding = h.ledger.fund(h.issuer.address(), 5_000)?;
    let config = ObserverConfig {
        root_txid: Some(funding),
        ..h.config()
    };
    let observer = ChainObserver::open(&config, Arc::clone(&h.ledger), InMemoryStateStore::new())?;
    let mut rx = observer.stream(&[EventKind::Whistleblow])?;
    observer.sync()?;
    let events = collect(&observer, &mut rx)?;
    assert_eq!(whistleblown(&events), vec![funding]);
    assert!(!observer.is_root_authenticated()?);
    Ok(())
}

#[test]
fn genesis_is_never_announced() -> Result<()> {
    let (h, _) = Harness::new(0)?;
    let observer = h.observer(InMemoryStateStore::new())?;
    let mut rx = observer.stream(&EventKind::ALL)?;

    observer.sync()?;
    h.ledger.unconfirm(&h.root)?;
    observer.sync()?;
    assert_eq!(observer.pending_len()?, 1);
    h.ledger.confirm(&h.root)?;
    observer.sync()?;

    assert!(collect(&observer, &mut rx)?.is_empty());
    assert_eq!(observer.num_statements()?, 0);
    assert_eq!(observer.pending_len()?, 0);
    assert_eq!(observer.chain_name()?, Some(b"news".to_vec()));
    Ok(())
}

#[test]
fn replay_is_silent_unless_requested() -> Result<()> {
    let (h, _) = Harness::new(2)?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("chain.dat");

    {
        let observer = h.observer(FileStateStore::new(&path))?;
        let mut rx = observer.stream(&[EventKind::Appended])?;
        observer.sync()?;
        assert_eq!(collect(&observer, &mut rx)?.len(), 2);
    }

    let stored = FileStateStore::new(&path).load()?.expect("chain saved");
    assert_eq!(stored.record.root_txid, Some(h.root));
    assert_eq!(stored.record.chain_name, Some(b"news".to_vec()));

    // No root in the config: it comes from the store.
    let config = ObserverConfig {
        root_txid: None,
        ..h.config()
    };
    let replay =
        ChainObserver::open(&config, Arc::clone(&h.ledger), FileStateStore::new(&path))?;
    assert!(replay.state()?.rebooting());
    let mut rx = replay.stream(&[EventKind::Appended])?;
    replay.sync()?;
    assert!(collect(&replay, &mut rx)?.is_empty());
    assert_eq!(replay.num_statements()?, 2);
    assert!(!replay.state()?.rebooting());

    // Statements after the replay are announced again.
    let s3 = h.issuer.append_statement(b"s3")?.txid();
    h.ledger.confirm(&s3)?;
    replay.sync()?;
    assert_eq!(of_kind(&collect(&replay, &mut rx)?, EventKind::Appended), ["s3"]);

    let loud = ObserverConfig {
        notify_during_replay: true,
        ..config
    };
    let replay = ChainObserver::open(&loud, Arc::clone(&h.ledger), FileStateStore::new(&path))?;
    let mut rx = replay.stream(&[EventKind::Appended])?;
    replay.sync()?;
    assert_eq!(
        of_kind(&collect(&replay, &mut rx)?, EventKind::Appended),
        ["s1", "s2", "s3"]
    );
    Ok(())
}

#[test]
fn statements_iterate_both_ways() -> Result<()> {
    let (h, _) = Harness::new(3)?;
    let observer = h.observer(InMemoryStateStore::new())?;
    observer.sync()?;
    let forward: Vec<String> = observer.statements(true)?.map(|s| s.to_string()).collect();
    let backward: Vec<String> = observer.statements(false)?.map(|s| s.to_string()).collect();
    assert_eq!(forward, ["s1", "s2", "s3"]);
    assert_eq!(backward, ["s3", "s2", "s1"]);
    Ok(())
}

#[test]
fn oversized_statement_is_refused() -> Result<()> {
    let (h, _) = Harness::new(0)?;
    let result = h.issuer.append_statement(&[b'x'; 81]);
    assert!(matches!(
        result,
        Err(IssuerError::PayloadTooLarge { size: 81, max: 80 })
    ));
    assert!(h.issuer.append_statement(&[b'x'; 80]).is_ok());
    Ok(())
}

#[test]
fn unsigned_link_aborts_the_walk() -> Result<()> {
    let (h, txids) = Harness::new(1)?;
    let observer = h.observer(InMemoryStateStore::new())?;
    let mut rx = observer.stream(&EventKind::ALL)?;

    let unsigned = Transaction::new(
        vec![TxInput::unsigned(OutPoint::new(txids[0], 0))],
        vec![
            TxOutput::pay_to(h.issuer.address(), 1),
            TxOutput::data(b"forged".to_vec(), 0),
        ],
    );
    let forged = h.ledger.mine(unsigned)?;

    let report = observer.sync()?;
    assert!(report.aborted);
    let events = collect(&observer, &mut rx)?;
    assert_eq!(of_kind(&events, EventKind::Appended), ["s1"]);
    assert_eq!(whistleblown(&events), vec![forged]);
    assert_eq!(observer.num_statements()?, 1);
    Ok(())
}

#[tokio::test]
async fn follow_processes_ledger_events() -> Result<()> {
    let (h, _) = Harness::new(0)?;
    let observer = h.observer(InMemoryStateStore::new())?;
    let rx = h.ledger.subscribe();

    let s1 = h.issuer.append_statement(b"s1")?.txid();
    h.ledger.confirm(&s1)?;

    // The ledger keeps its sender alive, so `follow` only stops on timeout.
    let followed = tokio::time::timeout(Duration::from_millis(200), observer.follow(rx)).await;
    assert!(followed.is_err());
    assert_eq!(observer.num_statements()?, 1);
    Ok(())
}
