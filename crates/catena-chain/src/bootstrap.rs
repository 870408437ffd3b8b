use catena_dispatch::EventSink;
use catena_ledger::TxRecord;
use tracing::{debug, info};

use crate::state::ChainState;
use crate::validator::ChainTxValidator;

/// Authenticate the root-of-trust transaction of `state`'s chain.
///
/// `candidate` is the ledger's record for the configured root identifier,
/// or `None` if the ledger has not seen it yet (returns `false` without side
/// effects). A candidate that is not chain-shaped, or whose first output
/// does not pay the chain address, is whistleblown and rejected. On success
/// the chain name is recorded and the state is marked processed; later
/// calls return `true` immediately.
pub fn authenticate<S: EventSink + ?Sized>(
    state: &mut ChainState,
    candidate: Option<&TxRecord>,
    sink: &mut S,
) -> bool {
    if state.processed_root {
        return true;
    }
    let Some(root) = candidate else {
        debug!(root = %state.root_txid, "root-of-trust transaction not yet available");
        return false;
    };

    if !ChainTxValidator::maybe_chain_tx(&root.tx, None) {
        state.whistleblow(
            root,
            format!(
                "root-of-trust transaction {} is not a chain transaction",
                root.txid
            ),
            sink,
        );
        return false;
    }

    let pays = root.tx.outputs.first().and_then(|o| o.address().copied());
    if pays != Some(state.chain_address) {
        let actual = pays.map_or_else(|| "nothing".to_owned(), |a| a.to_string());
        state.whistleblow(
            root,
            format!(
                "root-of-trust transaction {} pays {}, expected chain address {}",
                root.txid, actual, state.chain_address
            ),
            sink,
        );
        return false;
    }

    let name = ChainTxValidator::payload(&root.tx).unwrap_or_default().to_vec();
    info!(
        root = %root.txid,
        name = %String::from_utf8_lossy(&name),
        "root-of-trust authenticated"
    );
    state.mark_root_processed(name);
    true
}
