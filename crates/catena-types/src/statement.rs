use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::Txid;

/// Largest payload a single statement may carry, in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 80;

/// One entry of a Catena log.
///
/// A statement is either *linked* (it remembers the transaction that
/// published it) or *detached* (payload only). Statements become detached
/// once their transaction stops being trusted, so a detached statement never
/// hands out a transaction identifier.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    payload: Vec<u8>,
    txid: Option<Txid>,
}

impl Statement {
    /// A statement published by transaction `txid`.
    pub fn linked(payload: impl Into<Vec<u8>>, txid: Txid) -> Self {
        Self {
            payload: payload.into(),
            txid: Some(txid),
        }
    }

    /// A statement with no originating transaction.
    pub fn detached(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            txid: None,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload as lossy UTF-8, for display.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// The originating transaction.
    ///
    /// Fails with [`TypeError::DetachedStatement`] on a detached statement.
    pub fn txid(&self) -> Result<Txid, TypeError> {
        self.txid.ok_or(TypeError::DetachedStatement)
    }

    pub fn is_detached(&self) -> bool {
        self.txid.is_none()
    }

    /// A detached copy of this statement.
    pub fn detach(&self) -> Self {
        Self::detached(self.payload.clone())
    }

    pub fn has_same_payload(&self, other: &Statement) -> bool {
        self.payload == other.payload
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.txid {
            Some(txid) => write!(
                f,
                "Statement({:?} @ {})",
                self.payload_lossy(),
                txid.short_hex()
            ),
            None => write!(f, "Statement({:?}, detached)", self.payload_lossy()),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.payload_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_exposes_txid() {
        let txid = Txid::from_hash([4; 32]);
        let s = Statement::linked(b"hello".to_vec(), txid);
        assert_eq!(s.txid().unwrap(), txid);
        assert!(!s.is_detached());
    }

    #[test]
    fn detached_refuses_txid() {
        let s = Statement::detached(b"hello".to_vec());
        assert_eq!(s.txid(), Err(TypeError::DetachedStatement));
        assert!(s.is_detached());
    }

    #[test]
    fn detach_keeps_payload_drops_txid() {
        let s = Statement::linked(b"abc".to_vec(), Txid::from_hash([1; 32]));
        let d = s.detach();
        assert!(d.is_detached());
        assert!(d.has_same_payload(&s));
        assert_ne!(d, s);
    }

    #[test]
    fn debug_marks_detached() {
        let s = Statement::detached(b"x".to_vec());
        assert!(format!("{s:?}").contains("detached"));
    }
}
