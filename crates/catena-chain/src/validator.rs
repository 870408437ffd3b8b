use catena_ledger::{InputError, LedgerView, Transaction, TxOutput};
use catena_types::{Address, OutPoint, MAX_PAYLOAD_SIZE};
use tracing::debug;

/// An output together with its location, as spent by a candidate link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectedOutput {
    pub outpoint: OutPoint,
    pub output: TxOutput,
}

impl ConnectedOutput {
    pub fn lookup<V: LedgerView + ?Sized>(view: &V, outpoint: OutPoint) -> Option<Self> {
        view.output(&outpoint)
            .map(|output| Self { outpoint, output })
    }
}

/// Why a transaction is not a valid chain transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidChainTx {
    #[error("expected exactly one input, got {0}")]
    InputCount(usize),

    #[error("expected exactly two outputs, got {0}")]
    OutputCount(usize),

    #[error("first output does not pay an address")]
    FirstOutputNotAddress,

    #[error("first output pays {actual}, expected chain address {expected}")]
    WrongAddress { expected: Address, actual: Address },

    #[error("second output is not a data output")]
    MissingDataOutput,

    #[error("payload of {0} bytes exceeds the 80-byte limit")]
    PayloadTooLarge(usize),

    #[error("spent output {0} is not output #0 of its transaction")]
    PrevIndex(OutPoint),

    #[error("input spends {actual}, expected {expected}")]
    NotConnected { expected: OutPoint, actual: OutPoint },

    #[error("spent output {outpoint} does not pay chain address {expected}")]
    PrevAddress { outpoint: OutPoint, expected: Address },

    #[error("signature cannot be checked without the spent output")]
    UnknownPrevOutput,

    #[error("input #0 is not authorized: {0}")]
    Signature(#[from] InputError),
}

/// Decides whether a ledger transaction is a well-formed chain link.
///
/// A chain transaction has one input and two outputs: output 0 pays the
/// chain address and output 1 carries at most [`MAX_PAYLOAD_SIZE`] bytes
/// of payload. All checks are pure.
pub struct ChainTxValidator;

impl ChainTxValidator {
    /// Check every rule, returning the first violation.
    ///
    /// - `expected_address`: skip the output-0 address check when `None`.
    /// - `prev`: the output the link must spend; skip linkage checks when `None`.
    /// - `check_prev_index`: require `prev` to be output #0 (off for the
    ///   root-of-trust, which spends an arbitrary funding output).
    /// - `verify_signature`: require input 0's witness to authorize `prev`.
    pub fn check(
        tx: &Transaction,
        expected_address: Option<&Address>,
        prev: Option<&ConnectedOutput>,
        check_prev_index: bool,
        verify_signature: bool,
    ) -> Result<(), InvalidChainTx> {
        if tx.inputs.len() != 1 {
            return Err(InvalidChainTx::InputCount(tx.inputs.len()));
        }
        if tx.outputs.len() != 2 {
            return Err(InvalidChainTx::OutputCount(tx.outputs.len()));
        }

        let first = tx.outputs[0]
            .address()
            .ok_or(InvalidChainTx::FirstOutputNotAddress)?;
        if let Some(expected) = expected_address {
            if first != expected {
                return Err(InvalidChainTx::WrongAddress {
                    expected: *expected,
                    actual: *first,
                });
            }
        }

        let payload = tx.outputs[1]
            .data_payload()
            .ok_or(InvalidChainTx::MissingDataOutput)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(InvalidChainTx::PayloadTooLarge(payload.len()));
        }

        match prev {
            Some(prev) => {
                if check_prev_index && prev.outpoint.index != 0 {
                    return Err(InvalidChainTx::PrevIndex(prev.outpoint));
                }
                let actual = tx.inputs[0].prev_out;
                if actual != prev.outpoint {
                    return Err(InvalidChainTx::NotConnected {
                        expected: prev.outpoint,
                        actual,
                    });
                }
                if let Some(expected) = expected_address {
                    if prev.output.address() != Some(expected) {
                        return Err(InvalidChainTx::PrevAddress {
                            outpoint: prev.outpoint,
                            expected: *expected,
                        });
                    }
                }
                if verify_signature {
                    tx.verify_input(0, &prev.output)?;
                }
            }
            None if verify_signature => return Err(InvalidChainTx::UnknownPrevOutput),
            None => {}
        }

        Ok(())
    }

    /// [`check`](Self::check) as a predicate. Failures are logged, never raised.
    pub fn validate(
        tx: &Transaction,
        expected_address: Option<&Address>,
        prev: Option<&ConnectedOutput>,
        check_prev_index: bool,
        verify_signature: bool,
    ) -> bool {
        match Self::check(tx, expected_address, prev, check_prev_index, verify_signature) {
            Ok(()) => true,
            Err(reason) => {
                debug!(txid = %tx.txid(), %reason, "not a valid chain transaction");
                false
            }
        }
    }

    /// Structural check only: shape, address, payload size.
    pub fn maybe_chain_tx(tx: &Transaction, expected_address: Option<&Address>) -> bool {
        Self::validate(tx, expected_address, None, false, false)
    }

    /// The payload carried by output 1, if it is a data output.
    pub fn payload(tx: &Transaction) -> Option<&[u8]> {
        tx.outputs.get(1).and_then(TxOutput::data_payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use catena_crypto::SigningKey;
    use catena_ledger::{LedgerSource, TxInput};

    fn link(fx: &Fixture, prev: catena_types::Txid) -> (Transaction, ConnectedOutput) {
        let tx = fx.statement(prev, b"hello");
        let snapshot = fx.ledger.snapshot().unwrap();
        let connected = ConnectedOutput::lookup(&snapshot, OutPoint::new(prev, 0)).unwrap();
        (tx, connected)
    }

    #[test]
    fn accepts_signed_link() {
        let fx = Fixture::new();
        let (tx, prev) = link(&fx, fx.root);
        assert_eq!(
            ChainTxValidator::check(&tx, Some(&fx.address), Some(&prev), true, true),
            Ok(())
        );
        assert_eq!(ChainTxValidator::payload(&tx), Some(&b"hello"[..]));
    }

    #[test]
    fn rejects_wrong_shape() {
        let fx = Fixture::new();
        let (mut tx, prev) = link(&fx, fx.root);
        tx.outputs.push(TxOutput::pay_to(fx.address, 1));
        assert_eq!(
            ChainTxValidator::check(&tx, None, Some(&prev), true, false),
            Err(InvalidChainTx::OutputCount(3))
        );
        tx.outputs.pop();
        tx.inputs.push(TxInput::unsigned(OutPoint::new(fx.root, 1)));
        assert_eq!(
            ChainTxValidator::check(&tx, None, None, false, false),
            Err(InvalidChainTx::InputCount(2))
        );
    }

    #[test]
    fn rejects_foreign_address() {
        let fx = Fixture::new();
        let (tx, _) = link(&fx, fx.root);
        let other = SigningKey::generate().address();
        assert!(matches!(
            ChainTxValidator::check(&tx, Some(&other), None, false, false),
            Err(InvalidChainTx::WrongAddress { .. })
        ));
        assert!(ChainTxValidator::maybe_chain_tx(&tx, None));
    }

    #[test]
    fn rejects_oversized_payload_and_missing_data() {
        let fx = Fixture::new();
        let (mut tx, _) = link(&fx, fx.root);
        tx.outputs[1] = TxOutput::data(vec![0u8; MAX_PAYLOAD_SIZE + 1], 0);
        assert_eq!(
            ChainTxValidator::check(&tx, None, None, false, false),
            Err(InvalidChainTx::PayloadTooLarge(81))
        );
        tx.outputs[1] = TxOutput::pay_to(fx.address, 1);
        assert_eq!(
            ChainTxValidator::check(&tx, None, None, false, false),
            Err(InvalidChainTx::MissingDataOutput)
        );
    }

    #[test]
    fn rejects_link_to_non_zero_output() {
        let fx = Fixture::new();
        let (tx, mut prev) = link(&fx, fx.root);
        prev.outpoint.index = 1;
        assert_eq!(
            ChainTxValidator::check(&tx, None, Some(&prev), true, false),
            Err(InvalidChainTx::PrevIndex(prev.outpoint))
        );
        // Without the index check the mismatch is caught as a broken link.
        assert!(matches!(
            ChainTxValidator::check(&tx, None, Some(&prev), false, false),
            Err(InvalidChainTx::NotConnected { .. })
        ));
    }

    #[test]
    fn rejects_bad_signature() {
        let fx = Fixture::new();
        let (mut tx, prev) = link(&fx, fx.root);
        tx.sign_input(0, &SigningKey::generate()).unwrap();
        assert!(matches!(
            ChainTxValidator::check(&tx, Some(&fx.address), Some(&prev), true, true),
            Err(InvalidChainTx::Signature(_))
        ));
        // Structure alone is still fine.
        assert!(ChainTxValidator::validate(
            &tx,
            Some(&fx.address),
            Some(&prev),
            true,
            false
        ));
    }

    #[test]
    fn signature_check_needs_prev_output() {
        let fx = Fixture::new();
        let (tx, _) = link(&fx, fx.root);
        assert_eq!(
            ChainTxValidator::check(&tx, None, None, false, true),
            Err(InvalidChainTx::UnknownPrevOutput)
        );
    }

    #[test]
    fn rejects_prev_output_paying_elsewhere() {
        let fx = Fixture::new();
        let (tx, mut prev) = link(&fx, fx.root);
        prev.output = TxOutput::pay_to(SigningKey::generate().address(), 5);
        assert!(matches!(
            ChainTxValidator::check(&tx, Some(&fx.address), Some(&prev), true, false),
            Err(InvalidChainTx::PrevAddress { .. })
        ));
    }
}
