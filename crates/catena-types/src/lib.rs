//! Foundation types for Catena.
//!
//! Catena is an append-only statement log anchored on a public ledger. This
//! crate provides the identifiers and value types shared by every other
//! Catena crate.
//!
//! # Key Types
//!
//! - [`Txid`]: 32-byte ledger transaction identifier
//! - [`Address`]: destination an output pays, derived from a public key
//! - [`OutPoint`]: reference to one output of one transaction
//! - [`Statement`]: a log entry, either linked to its transaction or detached

pub mod address;
pub mod error;
pub mod id;
pub mod statement;

pub use address::Address;
pub use error::TypeError;
pub use id::{OutPoint, Txid};
pub use statement::{Statement, MAX_PAYLOAD_SIZE};
