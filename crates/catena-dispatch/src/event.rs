use std::fmt;

use catena_ledger::{Reorganization, Transaction};
use catena_types::{Statement, Txid};
use serde::{Deserialize, Serialize};

/// Report that the issuer published something inconsistent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Whistleblow {
    pub txid: Txid,
    pub tx: Transaction,
    pub reason: String,
}

/// Something that happened to an observed chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    /// A statement became durably part of the chain.
    Appended(Statement),
    /// A previously appended statement is no longer confirmed.
    Withdrawn(Statement),
    /// The issuer equivocated or published a malformed link.
    Whistleblow(Whistleblow),
    /// The ledger switched branches.
    Reorganized(Reorganization),
}

impl ChainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Appended(_) => EventKind::Appended,
            Self::Withdrawn(_) => EventKind::Withdrawn,
            Self::Whistleblow(_) => EventKind::Whistleblow,
            Self::Reorganized(_) => EventKind::Reorganized,
        }
    }

    pub fn statement(&self) -> Option<&Statement> {
        match self {
            Self::Appended(s) | Self::Withdrawn(s) => Some(s),
            _ => None,
        }
    }
}

/// Classification of chain events, used to pick subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Appended,
    Withdrawn,
    Whistleblow,
    Reorganized,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Appended,
        EventKind::Withdrawn,
        EventKind::Whistleblow,
        EventKind::Reorganized,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Appended => "Appended",
            Self::Withdrawn => "Withdrawn",
            Self::Whistleblow => "Whistleblow",
            Self::Reorganized => "Reorganized",
        };
        write!(f, "{s}")
    }
}

/// Destination for events produced during reconciliation.
pub trait EventSink {
    fn emit(&mut self, event: ChainEvent);
}

impl EventSink for Vec<ChainEvent> {
    fn emit(&mut self, event: ChainEvent) {
        self.push(event);
    }
}
