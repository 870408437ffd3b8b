use std::sync::Arc;

use catena_crypto::SigningKey;
use catena_ledger::{LedgerSource, LedgerSubmit, LedgerView, Transaction, TxInput, TxOutput};
use catena_store::{ChainRecord, StateStore, StoredChain};
use catena_types::{Address, OutPoint, Txid, MAX_PAYLOAD_SIZE};
use tracing::{debug, info};

use crate::config::IssuerConfig;
use crate::error::IssuerError;
use crate::validator::{ChainTxValidator, ConnectedOutput};

type IssuerResult<T> = std::result::Result<T, IssuerError>;

/// Builds, signs and publishes statements for a chain it controls.
///
/// The chain address is derived from the signing key. The issuer keeps no
/// chain state of its own: each statement extends the newest unspent chain
/// output it finds on the ledger, so statements may be issued back to back
/// without waiting for confirmation.
pub struct Issuer<L: LedgerSource + LedgerSubmit> {
    key: SigningKey,
    address: Address,
    ledger: Arc<L>,
    config: IssuerConfig,
    root_txid: Option<Txid>,
    chain_name: Option<Vec<u8>>,
}

impl<L: LedgerSource + LedgerSubmit> Issuer<L> {
    /// An issuer with no chain yet. Call [`create_chain`](Self::create_chain).
    pub fn new(key: SigningKey, ledger: Arc<L>, config: IssuerConfig) -> Self {
        let address = key.address();
        Self {
            key,
            address,
            ledger,
            config,
            root_txid: None,
            chain_name: None,
        }
    }

    /// An issuer for an existing chain.
    pub fn with_root(mut self, root_txid: Txid) -> Self {
        self.root_txid = Some(root_txid);
        self
    }

    /// Pick up the chain recorded in `store`, if any.
    pub fn resume<S: StateStore + ?Sized>(
        key: SigningKey,
        ledger: Arc<L>,
        store: &S,
        config: IssuerConfig,
    ) -> IssuerResult<Self> {
        let mut issuer = Self::new(key, ledger, config);
        if let Some(stored) = store.load()? {
            issuer.root_txid = stored.record.root_txid;
            issuer.chain_name = stored.record.chain_name;
        }
        Ok(issuer)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn root_txid(&self) -> Option<Txid> {
        self.root_txid
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// The record to persist for this chain, once it has a root.
    pub fn stored_chain(&self) -> Option<StoredChain> {
        self.root_txid.map(|root| StoredChain {
            record: ChainRecord {
                root_txid: Some(root),
                chain_name: self.chain_name.clone(),
            },
            chain_address: Some(self.address),
        })
    }

    /// Publish the root-of-trust transaction naming the chain.
    ///
    /// The issuer's address must hold exactly one unspent output; it funds
    /// the whole chain.
    pub fn create_chain(&mut self, name: &[u8]) -> IssuerResult<Transaction> {
        if let Some(root) = self.root_txid {
            return Err(IssuerError::RootAlreadyEstablished(root));
        }
        check_payload(name)?;

        let snapshot = self.ledger.snapshot()?;
        let mut funding = snapshot.unspent_outputs(&self.address);
        if funding.len() != 1 {
            return Err(match funding.len() {
                0 => IssuerError::InsufficientFunds {
                    needed: self.config.cost(),
                    available: 0,
                },
                n => IssuerError::AmbiguousFunding(n),
            });
        }
        let (outpoint, output) = funding.remove(0);
        let prev = ConnectedOutput { outpoint, output };

        let tx = self.build(&prev, name)?;
        ChainTxValidator::check(&tx, Some(&self.address), Some(&prev), false, true)?;
        let root = self.ledger.submit(tx.clone())?;
        info!(%root, name = %String::from_utf8_lossy(name), "chain created");

        self.root_txid = Some(root);
        self.chain_name = Some(name.to_vec());
        Ok(tx)
    }

    /// Build and sign the next statement without publishing it.
    pub fn prepare_statement(&self, payload: &[u8]) -> IssuerResult<Transaction> {
        check_payload(payload)?;
        if self.root_txid.is_none() {
            return Err(IssuerError::RootNotEstablished);
        }

        let snapshot = self.ledger.snapshot()?;
        let prev = self.chain_tip(&snapshot)?;
        let tx = self.build(&prev, payload)?;
        ChainTxValidator::check(&tx, Some(&self.address), Some(&prev), true, true)?;
        Ok(tx)
    }

    /// Build, sign and publish the next statement.
    pub fn append_statement(&self, payload: &[u8]) -> IssuerResult<Transaction> {
        let tx = self.prepare_statement(payload)?;
        let txid = self.ledger.submit(tx.clone())?;
        debug!(%txid, bytes = payload.len(), "statement submitted");
        Ok(tx)
    }

    /// Spend `outpoint` into a new statement carrying `payload`.
    pub fn build_statement_on(
        &self,
        outpoint: OutPoint,
        payload: &[u8],
    ) -> IssuerResult<Transaction> {
        check_payload(payload)?;
        let snapshot = self.ledger.snapshot()?;
        let prev = ConnectedOutput::lookup(&snapshot, outpoint)
            .ok_or(IssuerError::MissingOutput(outpoint))?;
        self.build(&prev, payload)
    }

    /// The newest unspent output #0 of a chain transaction paying us.
    fn chain_tip<V: LedgerView + ?Sized>(&self, view: &V) -> IssuerResult<ConnectedOutput> {
        view.unspent_outputs(&self.address)
            .into_iter()
            .filter(|(outpoint, _)| outpoint.index == 0)
            .filter(|(outpoint, _)| {
                view.transaction(&outpoint.txid).is_some_and(|record| {
                    ChainTxValidator::maybe_chain_tx(&record.tx, Some(&self.address))
                })
            })
            .last()
            .map(|(outpoint, output)| ConnectedOutput { outpoint, output })
            .ok_or(IssuerError::NoChainOutput)
    }

    fn build(&self, prev: &ConnectedOutput, payload: &[u8]) -> IssuerResult<Transaction> {
        let cost = self.config.cost();
        let available = prev.output.value;
        let change = available
            .checked_sub(cost)
            .ok_or(IssuerError::InsufficientFunds {
                needed: cost,
                available,
            })?;

        let mut tx = Transaction::new(
            vec![TxInput::unsigned(prev.outpoint)],
            vec![
                TxOutput::pay_to(self.address, change),
                TxOutput::data(payload.to_vec(), self.config.data_value),
            ],
        );
        tx.sign_input(0, &self.key)?;
        Ok(tx)
    }
}

fn check_payload(payload: &[u8]) -> IssuerResult<()> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(IssuerError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(())
}
