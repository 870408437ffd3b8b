//! Cryptographic primitives for Catena.
//!
//! Provides domain-separated BLAKE3 hashing for transaction identifiers and
//! signature messages, and Ed25519 keys whose public half derives a chain
//! [`Address`](catena_types::Address).
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::ContentHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
