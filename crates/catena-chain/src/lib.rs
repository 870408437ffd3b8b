//! Catena chain observation.
//!
//! A Catena chain is a sequence of ledger transactions, each spending output
//! #0 of its predecessor and carrying one statement in a data output. Because
//! a link can only be spent once, a confirmed chain cannot fork without the
//! ledger noticing a double spend.
//!
//! This crate follows such a chain from an observer's point of view:
//!
//! - [`ChainTxValidator`] decides whether a transaction is a well-formed link.
//! - [`bootstrap::authenticate`] checks the root-of-trust transaction.
//! - [`engine::reconcile`] keeps the confirmed statements in step with the
//!   ledger across reorganizations, reporting appends and withdrawals.
//! - [`EquivocationDetector`] tells harmless reissues apart from lies.
//! - [`ChainObserver`] ties these to a ledger, a state store and a
//!   [`Dispatcher`](catena_dispatch::Dispatcher).
//!
//! [`Issuer`] is the write side: it builds and signs new statements.

pub mod bootstrap;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod issuer;
pub mod observer;
pub mod state;
pub mod validator;

#[cfg(test)]
mod testutil;

pub use bootstrap::authenticate;
pub use config::{ConfigError, IssuerConfig, LogConfig, ObserverConfig};
pub use detector::{Classification, EquivocationDetector};
pub use engine::{reconcile, ReconcileReport};
pub use error::{ChainError, IssuerError, Result};
pub use issuer::Issuer;
pub use observer::ChainObserver;
pub use state::ChainState;
pub use validator::{ChainTxValidator, ConnectedOutput, InvalidChainTx};
