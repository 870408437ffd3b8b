use std::fmt;

use catena_crypto::{ContentHasher, Signature, SigningKey, VerifyingKey};
use catena_types::{Address, OutPoint, Txid};
use serde::{Deserialize, Serialize};

/// Confirmation status of a transaction as reported by the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    /// Unconfirmed and not conflicting with anything.
    Pending,
    /// Part of the currently-best chain.
    Building,
    /// Unconfirmed and competing with another unconfirmed spend.
    InConflict,
    /// Superseded by a confirmed competing spend.
    Dead,
}

impl Confidence {
    /// Preference when several live transactions spend one output.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Building => 3,
            Self::Pending => 2,
            Self::InConflict => 1,
            Self::Dead => 0,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Building => "BUILDING",
            Self::InConflict => "IN_CONFLICT",
            Self::Dead => "DEAD",
        };
        write!(f, "{s}")
    }
}

/// Locking condition of an output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputScript {
    /// Spendable by the key that derives this address.
    PayToAddress(Address),
    /// Unspendable data carrier.
    Data(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub script: OutputScript,
}

impl TxOutput {
    pub fn pay_to(address: Address, value: u64) -> Self {
        Self {
            value,
            script: OutputScript::PayToAddress(address),
        }
    }

    pub fn data(payload: impl Into<Vec<u8>>, value: u64) -> Self {
        Self {
            value,
            script: OutputScript::Data(payload.into()),
        }
    }

    pub fn address(&self) -> Option<&Address> {
        match &self.script {
            OutputScript::PayToAddress(addr) => Some(addr),
            OutputScript::Data(_) => None,
        }
    }

    pub fn data_payload(&self) -> Option<&[u8]> {
        match &self.script {
            OutputScript::Data(data) => Some(data),
            OutputScript::PayToAddress(_) => None,
        }
    }
}

/// Proof that the spender controls the address of the spent output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub public_key: [u8; 32],
    pub signature: Signature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_out: OutPoint,
    pub witness: Option<Witness>,
}

impl TxInput {
    pub fn unsigned(prev_out: OutPoint) -> Self {
        Self {
            prev_out,
            witness: None,
        }
    }
}

/// A ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

/// Why an input failed to authorize spending its output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("transaction has no input #{0}")]
    MissingInput(usize),
    #[error("input #{0} carries no witness")]
    MissingWitness(usize),
    #[error("spent output is not spendable")]
    NotSpendable,
    #[error("witness key is not a valid public key")]
    InvalidKey,
    #[error("witness key does not control address {expected}")]
    AddressMismatch { expected: Address },
    #[error("signature does not verify")]
    BadSignature,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Identifier over the full encoding, witnesses included.
    pub fn txid(&self) -> Txid {
        Txid::from_hash(ContentHasher::TXID.hash(&self.encode(true)))
    }

    /// Message signed by input `index`.
    ///
    /// Witnesses are stripped before hashing so that signing one input does
    /// not invalidate another.
    pub fn signature_message(&self, index: usize) -> Vec<u8> {
        let mut message = ContentHasher::SIGHASH.hash(&self.encode(false)).to_vec();
        message.extend_from_slice(&(index as u32).to_le_bytes());
        message
    }

    pub fn sign_input(&mut self, index: usize, key: &SigningKey) -> Result<(), InputError> {
        if index >= self.inputs.len() {
            return Err(InputError::MissingInput(index));
        }
        let signature = key.sign(&self.signature_message(index));
        self.inputs[index].witness = Some(Witness {
            public_key: key.public().to_bytes(),
            signature,
        });
        Ok(())
    }

    /// Check that input `index` is authorized to spend `spent`.
    pub fn verify_input(&self, index: usize, spent: &TxOutput) -> Result<(), InputError> {
        let input = self
            .inputs
            .get(index)
            .ok_or(InputError::MissingInput(index))?;
        let expected = *spent.address().ok_or(InputError::NotSpendable)?;
        let witness = input
            .witness
            .as_ref()
            .ok_or(InputError::MissingWitness(index))?;
        let key = VerifyingKey::from_public(witness.public_key).map_err(|_| InputError::InvalidKey)?;
        if !key.controls(&expected) {
            return Err(InputError::AddressMismatch { expected });
        }
        key.verify(&self.signature_message(index), &witness.signature)
            .map_err(|_| InputError::BadSignature)
    }

    /// Whether any input spends `outpoint`.
    pub fn spends(&self, outpoint: &OutPoint) -> bool {
        self.inputs.iter().any(|i| i.prev_out == *outpoint)
    }

    pub fn total_output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    fn encode(&self, with_witness: bool) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            buf.extend_from_slice(input.prev_out.txid.as_bytes());
            buf.extend_from_slice(&input.prev_out.index.to_le_bytes());
            match (&input.witness, with_witness) {
                (Some(w), true) => {
                    buf.push(1);
                    buf.extend_from_slice(&w.public_key);
                    buf.extend_from_slice(&w.signature.to_bytes());
                }
                _ => buf.push(0),
            }
        }
        buf.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            match &output.script {
                OutputScript::PayToAddress(addr) => {
                    buf.push(0);
                    buf.extend_from_slice(addr.as_bytes());
                }
                OutputScript::Data(data) => {
                    buf.push(1);
                    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
                    buf.extend_from_slice(data);
                }
            }
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }
}

/// A transaction together with the ledger's view of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRecord {
    pub txid: Txid,
    pub tx: Transaction,
    pub confidence: Confidence,
}

impl TxRecord {
    pub fn is_building(&self) -> bool {
        self.confidence == Confidence::Building
    }

    pub fn is_dead(&self) -> bool {
        self.confidence == Confidence::Dead
    }
}
