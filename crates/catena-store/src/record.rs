use catena_types::{Address, Txid, MAX_PAYLOAD_SIZE};

use crate::error::{StoreError, StoreResult};

/// Width of the chain-name field.
pub const NAME_FIELD_LEN: usize = MAX_PAYLOAD_SIZE;
/// Encoded size of a [`ChainRecord`].
pub const RECORD_LEN: usize = 32 + NAME_FIELD_LEN;
/// Encoded size of a [`StoredChain`].
pub const STORED_CHAIN_LEN: usize = RECORD_LEN + 32;

/// The fixed-size root-of-trust record.
///
/// Layout: the 32-byte root transaction identifier followed by the chain
/// name zero-padded to 80 bytes. An all-zero field means "not yet set".
/// Trailing zero bytes of a name do not survive a round trip.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainRecord {
    pub root_txid: Option<Txid>,
    pub chain_name: Option<Vec<u8>>,
}

impl ChainRecord {
    pub fn new(root_txid: Txid) -> Self {
        Self {
            root_txid: Some(root_txid),
            chain_name: None,
        }
    }

    pub fn encode(&self) -> StoreResult<[u8; RECORD_LEN]> {
        let mut buf = [0u8; RECORD_LEN];
        if let Some(txid) = &self.root_txid {
            buf[..32].copy_from_slice(txid.as_bytes());
        }
        if let Some(name) = &self.chain_name {
            if name.len() > NAME_FIELD_LEN {
                return Err(StoreError::NameTooLong {
                    size: name.len(),
                    max: NAME_FIELD_LEN,
                });
            }
            buf[32..32 + name.len()].copy_from_slice(name);
        }
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() != RECORD_LEN {
            return Err(StoreError::BadLength {
                expected: RECORD_LEN,
                actual: bytes.len(),
            });
        }
        let mut id = [0u8; 32];
        id.copy_from_slice(&bytes[..32]);
        let root_txid = Some(Txid::from_hash(id)).filter(|t| !t.is_null());

        let name = &bytes[32..];
        let end = name.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let chain_name = (end > 0).then(|| name[..end].to_vec());

        Ok(Self {
            root_txid,
            chain_name,
        })
    }
}

/// Everything an observer persists between runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredChain {
    pub record: ChainRecord,
    pub chain_address: Option<Address>,
}

impl StoredChain {
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(STORED_CHAIN_LEN);
        buf.extend_from_slice(&self.record.encode()?);
        match &self.chain_address {
            Some(addr) => buf.extend_from_slice(addr.as_bytes()),
            None => buf.extend_from_slice(&[0u8; 32]),
        }
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() != STORED_CHAIN_LEN {
            return Err(StoreError::BadLength {
                expected: STORED_CHAIN_LEN,
                actual: bytes.len(),
            });
        }
        let record = ChainRecord::decode(&bytes[..RECORD_LEN])?;
        let mut addr = [0u8; 32];
        addr.copy_from_slice(&bytes[RECORD_LEN..]);
        let chain_address = Some(Address::from_raw(addr)).filter(|a| !a.is_null());
        Ok(Self {
            record,
            chain_address,
        })
    }
}
