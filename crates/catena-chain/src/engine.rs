//! The reconciliation pass.
//!
//! [`reconcile`] brings a [`ChainState`] in line with one ledger snapshot.
//! It unwinds building entries whose transactions left the best chain,
//! advances along newly confirmed links, sweeps dead double spends for
//! equivocation, and finally reports what was withdrawn.

use catena_dispatch::{ChainEvent, EventSink};
use catena_ledger::{Confidence, LedgerView, TxRecord};
use catena_types::{OutPoint, Statement};
use tracing::debug;

use crate::detector::{Classification, EquivocationDetector};
use crate::state::ChainState;
use crate::validator::{ChainTxValidator, ConnectedOutput};

/// What one reconciliation pass changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Statements newly added to the building queue.
    pub appended: usize,
    /// Statements removed and not reinstated in this pass.
    pub withdrawn: usize,
    /// Statements removed and put back in this pass.
    pub reinstated: usize,
    /// Offending transactions reported in this pass.
    pub whistleblows: usize,
    /// The walk stopped at a malformed link.
    pub aborted: bool,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Run one reconciliation pass against `view`.
///
/// Lifecycle events go to `sink` only when `notify` is set; whistleblows are
/// always emitted. Running the pass again without ledger changes does
/// nothing.
pub fn reconcile<V, S>(
    state: &mut ChainState,
    view: &V,
    notify: bool,
    sink: &mut S,
) -> ReconcileReport
where
    V: LedgerView + ?Sized,
    S: EventSink + ?Sized,
{
    let mut report = ReconcileReport::default();

    let mut withdrawn = unwind(state, view);
    advance(state, view, notify, sink, &mut withdrawn, &mut report);
    if !report.aborted {
        sweep_lies(state, view, sink, &mut report);
    }

    // Most recently popped first, i.e. oldest statement first.
    while let Some(statement) = withdrawn.pop() {
        report.withdrawn += 1;
        debug!(statement = %statement, "statement withdrawn");
        if notify {
            sink.emit(ChainEvent::Withdrawn(statement));
        }
    }

    if !report.is_noop() {
        debug!(
            appended = report.appended,
            withdrawn = report.withdrawn,
            reinstated = report.reinstated,
            whistleblows = report.whistleblows,
            aborted = report.aborted,
            building = state.building.len(),
            pending = state.pending.len(),
            "reconciled"
        );
    }
    report
}

fn is_building<V: LedgerView + ?Sized>(view: &V, statement: &Statement) -> bool {
    statement
        .txid()
        .ok()
        .and_then(|txid| view.transaction(&txid))
        .is_some_and(|r| r.is_building())
}

/// Pop every non-building tail. Returns the withdrawn stack, newest at the
/// bottom. Genesis goes to the pending queue but never onto the stack.
fn unwind<V: LedgerView + ?Sized>(state: &mut ChainState, view: &V) -> Vec<Statement> {
    let mut withdrawn = Vec::new();
    while let Some(tail) = state.building.last() {
        if is_building(view, tail) {
            break;
        }
        let Some(popped) = state.building.pop() else {
            break;
        };
        debug!(statement = %popped, "unwinding non-building tail");
        state.pending.push_front(popped.detach());
        if !state.building.is_empty() {
            withdrawn.push(popped.detach());
        }
    }
    withdrawn
}

fn advance<V, S>(
    state: &mut ChainState,
    view: &V,
    notify: bool,
    sink: &mut S,
    withdrawn: &mut Vec<Statement>,
    report: &mut ReconcileReport,
) where
    V: LedgerView + ?Sized,
    S: EventSink + ?Sized,
{
    if state.building.is_empty() {
        let Some(root) = view.transaction(&state.root_txid).filter(TxRecord::is_building) else {
            return;
        };
        let payload = ChainTxValidator::payload(&root.tx).unwrap_or_default();
        state.building.push(Statement::linked(payload, root.txid));
        // With an empty building queue, a non-empty pending queue starts
        // with the unwound genesis.
        state.pending.pop_front();
        debug!(txid = %root.txid, "genesis is building");
    }

    while let Some(base) = state.tail_txid() {
        let outpoint = OutPoint::new(base, 0);
        let Some(next) = view.spender_of(&outpoint) else {
            break;
        };
        let prev = ConnectedOutput::lookup(view, outpoint);
        if let Err(reason) =
            ChainTxValidator::check(&next.tx, Some(&state.chain_address), prev.as_ref(), true, true)
        {
            let reason = format!("invalid chain transaction spending {outpoint}: {reason}");
            if state.whistleblow(&next, reason, sink) {
                report.whistleblows += 1;
            }
            report.aborted = true;
            return;
        }
        if !next.is_building() {
            break;
        }

        let payload = ChainTxValidator::payload(&next.tx).unwrap_or_default();
        let statement = Statement::linked(payload, next.txid);
        state.building.push(statement.clone());

        if let Some(expected) = state.pending.front() {
            if !expected.has_same_payload(&statement) {
                let reason = format!(
                    "expected statement '{}' (hex {}) but got '{}' (hex {}) in transaction {}",
                    expected,
                    hex::encode(expected.payload()),
                    statement,
                    hex::encode(statement.payload()),
                    next.txid
                );
                state.building.pop();
                if state.whistleblow(&next, reason, sink) {
                    report.whistleblows += 1;
                }
                break;
            }
            state.pending.pop_front();
            if withdrawn.pop().is_some() {
                report.reinstated += 1;
                debug!(statement = %statement, "statement reinstated");
                continue;
            }
        }

        report.appended += 1;
        debug!(statement = %statement, txid = %next.txid, "statement appended");
        if notify {
            sink.emit(ChainEvent::Appended(statement));
        }
    }
}

/// Report every dead transaction that competes with a building link and
/// commits to something else.
fn sweep_lies<V, S>(state: &mut ChainState, view: &V, sink: &mut S, report: &mut ReconcileReport)
where
    V: LedgerView + ?Sized,
    S: EventSink + ?Sized,
{
    let dead = view.transactions_with(Confidence::Dead);
    if dead.is_empty() {
        return;
    }

    let mut lies = Vec::new();
    for link in state.building.iter().skip(1) {
        let Some(incumbent) = link.txid().ok().and_then(|t| view.transaction(&t)) else {
            continue;
        };
        let Some(spent) = incumbent.tx.inputs.first().map(|i| i.prev_out) else {
            continue;
        };
        let rivals: Vec<TxRecord> = dead
            .iter()
            .filter(|d| d.tx.spends(&spent))
            .cloned()
            .collect();
        if rivals.is_empty() {
            continue;
        }
        let prev = ConnectedOutput::lookup(view, spent);
        for (rival, verdict) in
            EquivocationDetector::classify_all(&incumbent, &rivals, &state.chain_address, prev.as_ref())
        {
            match verdict {
                Classification::Lie { reason } => lies.push((rival.clone(), reason)),
                other => debug!(txid = %rival.txid, verdict = ?other, "consistent double spend"),
            }
        }
    }

    for (liar, reason) in lies {
        if state.whistleblow(&liar, reason, sink) {
            report.whistleblows += 1;
        }
    }
}
