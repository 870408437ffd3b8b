//! Listener dispatch for Catena chain events.
//!
//! Observers describe everything that happens to a chain as [`ChainEvent`]s.
//! A [`Dispatcher`] delivers them, in emission order, on one dedicated
//! thread, so subscriber code never runs under the observer's lock and may
//! call back into read-only observer accessors.

pub mod dispatcher;
pub mod error;
pub mod event;

pub use dispatcher::{DispatchConfig, Dispatcher, EventStream, ListenerId};
pub use error::{DispatchError, Result};
pub use event::{ChainEvent, EventKind, EventSink, Whistleblow};
