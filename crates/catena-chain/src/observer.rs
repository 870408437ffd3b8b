use std::sync::{Arc, Mutex, MutexGuard};

use catena_dispatch::{ChainEvent, Dispatcher, EventKind, EventStream, ListenerId};
use catena_ledger::{LedgerEvent, LedgerSource, LedgerView};
use catena_store::{ChainRecord, StateStore, StoredChain};
use catena_types::{Address, Statement, Txid};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::bootstrap;
use crate::config::ObserverConfig;
use crate::engine::{self, ReconcileReport};
use crate::error::{ChainError, Result};
use crate::state::ChainState;

/// Follows one chain on a ledger and reports what happens to it.
///
/// Every ledger event triggers a pass: the ledger is snapshotted first, then
/// the chain-state lock is taken for bootstrap and reconciliation, and the
/// resulting events are queued on the [`Dispatcher`] before the lock is
/// released. Listeners therefore run on the dispatch thread and may call the
/// read-only accessors here.
///
/// A snapshot older than the last one applied is skipped, so racing passes
/// never roll the chain back.
pub struct ChainObserver<L: LedgerSource, S: StateStore> {
    ledger: Arc<L>,
    store: S,
    dispatcher: Dispatcher,
    notify_during_replay: bool,
    root_txid: Txid,
    chain_address: Address,
    state: Mutex<ChainState>,
}

impl<L: LedgerSource, S: StateStore> ChainObserver<L, S> {
    /// Restore from `store`, or start the chain named by `config`.
    ///
    /// A stored root means the chain is being replayed: lifecycle events are
    /// suppressed during the first pass unless `notify_during_replay` is set.
    pub fn open(config: &ObserverConfig, ledger: Arc<L>, store: S) -> Result<Self> {
        let dispatcher = Dispatcher::with_config(config.dispatch.clone())?;
        let stored = store.load()?;

        let (root_txid, chain_address, chain_name, rebooting) =
            match stored.as_ref().and_then(|s| s.record.root_txid.map(|r| (s, r))) {
                Some((stored, root)) => {
                    if let Some(configured) = config.root_txid.filter(|c| *c != root) {
                        return Err(ChainError::RootMismatch {
                            configured,
                            stored: root,
                        });
                    }
                    let address = stored
                        .chain_address
                        .or(config.chain_address)
                        .ok_or(ChainError::MissingChainAddress)?;
                    (root, address, stored.record.chain_name.clone(), true)
                }
                None => {
                    let root = config.root_txid.ok_or(ChainError::MissingRoot)?;
                    let address = config
                        .chain_address
                        .ok_or(ChainError::MissingChainAddress)?;
                    store.save(&StoredChain {
                        record: ChainRecord::new(root),
                        chain_address: Some(address),
                    })?;
                    (root, address, None, false)
                }
            };

        let mut state = ChainState::new(root_txid, chain_address);
        state.chain_name = chain_name;
        state.rebooting = rebooting;
        info!(root = %root_txid, address = %chain_address, rebooting, "observer opened");

        Ok(Self {
            ledger,
            store,
            dispatcher,
            notify_during_replay: config.notify_during_replay,
            root_txid,
            chain_address,
            state: Mutex::new(state),
        })
    }

    /// React to one ledger event.
    pub fn handle_event(&self, event: &LedgerEvent) -> Result<ReconcileReport> {
        let forward = match event {
            LedgerEvent::Reorganized(reorg) => {
                info!(
                    old_blocks = reorg.old_blocks,
                    new_blocks = reorg.new_blocks,
                    "ledger reorganized"
                );
                Some(ChainEvent::Reorganized(*reorg))
            }
            _ => None,
        };
        self.pass(forward)
    }

    /// Run a pass without a triggering event.
    pub fn sync(&self) -> Result<ReconcileReport> {
        self.pass(None)
    }

    /// Handle every event already queued on `rx`.
    ///
    /// A lagged receiver is not an error: the next pass recomputes
    /// everything from a fresh snapshot.
    pub fn drain(&self, rx: &mut broadcast::Receiver<LedgerEvent>) -> Result<usize> {
        let mut handled = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.handle_event(&event)?;
                    handled += 1;
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "ledger events lagged, resyncing");
                    self.sync()?;
                    handled += 1;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return Ok(handled),
            }
        }
    }

    /// Handle ledger events until the channel closes.
    pub async fn follow(&self, mut rx: broadcast::Receiver<LedgerEvent>) -> Result<()> {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    self.handle_event(&event)?;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "ledger events lagged, resyncing");
                    self.sync()?;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("ledger event channel closed");
                    return Ok(());
                }
            }
        }
    }

    fn pass(&self, forward: Option<ChainEvent>) -> Result<ReconcileReport> {
        // Snapshot before locking: the chain lock is never held while
        // waiting on the ledger.
        let snapshot = self.ledger.snapshot()?;

        let mut to_save = None;
        let report = {
            let mut state = self.lock()?;
            let mut events = Vec::new();
            events.extend(forward);

            // A concurrent pass already applied a newer snapshot.
            let sequence = snapshot.sequence();
            if sequence < state.applied_sequence {
                debug!(
                    sequence,
                    applied = state.applied_sequence,
                    "skipping stale ledger snapshot"
                );
                for event in events {
                    self.dispatcher.send(event)?;
                }
                return Ok(ReconcileReport::default());
            }
            state.applied_sequence = sequence;

            let was_processed = state.processed_root;
            let root = snapshot.transaction(&state.root_txid);
            let report = if bootstrap::authenticate(&mut state, root.as_ref(), &mut events) {
                if !was_processed {
                    to_save = Some(StoredChain {
                        record: ChainRecord {
                            root_txid: Some(state.root_txid),
                            chain_name: state.chain_name.clone(),
                        },
                        chain_address: Some(state.chain_address),
                    });
                }
                let notify = !state.rebooting || self.notify_during_replay;
                let report = engine::reconcile(&mut state, &snapshot, notify, &mut events);
                if state.rebooting {
                    debug!("replay finished");
                    state.rebooting = false;
                }
                report
            } else {
                ReconcileReport::default()
            };

            for event in events {
                self.dispatcher.send(event)?;
            }
            report
        };

        if let Some(chain) = to_save {
            self.store.save(&chain)?;
        }
        Ok(report)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|_| ChainError::LockPoisoned)
    }

    pub fn root_txid(&self) -> Txid {
        self.root_txid
    }

    pub fn chain_address(&self) -> Address {
        self.chain_address
    }

    pub fn chain_name(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.chain_name.clone())
    }

    pub fn is_root_authenticated(&self) -> Result<bool> {
        Ok(self.lock()?.processed_root)
    }

    /// Number of confirmed statements, genesis excluded.
    pub fn num_statements(&self) -> Result<usize> {
        Ok(self.lock()?.num_statements())
    }

    /// Confirmed statements, oldest first when `forward`.
    ///
    /// Iterates a copy taken under the lock, so consumers never block
    /// reconciliation. Each call takes a fresh copy.
    pub fn statements(&self, forward: bool) -> Result<std::vec::IntoIter<Statement>> {
        Ok(self.lock()?.statements(forward).into_iter())
    }

    /// Statements awaiting re-confirmation.
    pub fn pending_len(&self) -> Result<usize> {
        Ok(self.lock()?.pending.len())
    }

    /// A copy of the whole chain state.
    pub fn state(&self) -> Result<ChainState> {
        Ok(self.lock()?.clone())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn on_appended<F>(&self, mut f: F) -> Result<ListenerId>
    where
        F: FnMut(&Statement) + Send + 'static,
    {
        Ok(self.dispatcher.subscribe(EventKind::Appended, move |e| {
            if let ChainEvent::Appended(s) = e {
                f(s)
            }
        })?)
    }

    pub fn on_withdrawn<F>(&self, mut f: F) -> Result<ListenerId>
    where
        F: FnMut(&Statement) + Send + 'static,
    {
        Ok(self.dispatcher.subscribe(EventKind::Withdrawn, move |e| {
            if let ChainEvent::Withdrawn(s) = e {
                f(s)
            }
        })?)
    }

    pub fn on_whistleblow<F>(&self, mut f: F) -> Result<ListenerId>
    where
        F: FnMut(&catena_dispatch::Whistleblow) + Send + 'static,
    {
        Ok(self.dispatcher.subscribe(EventKind::Whistleblow, move |e| {
            if let ChainEvent::Whistleblow(w) = e {
                f(w)
            }
        })?)
    }

    pub fn stream(&self, kinds: &[EventKind]) -> Result<EventStream> {
        Ok(self.dispatcher.stream(kinds)?)
    }

    /// Wait until every queued event has been delivered.
    pub fn flush(&self) -> Result<()> {
        Ok(self.dispatcher.flush()?)
    }
}
