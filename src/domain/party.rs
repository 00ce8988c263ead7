use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// The two-valued role of a trade participant. Every per-side counter and
/// flag on a trade or meeting is addressed by this enum rather than a raw
/// 0/1 index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    /// The user who requested the trade.
    Initiator,
    /// The user the request was sent to; the only one who may accept or deny.
    Responder,
}

impl Party {
    /// The counterpart side.
    pub fn other(self) -> Party {
        match self {
            Party::Initiator => Party::Responder,
            Party::Responder => Party::Initiator,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Initiator => "initiator",
            Party::Responder => "responder",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Two-slot storage indexed by [`Party`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerParty<T> {
    pub initiator: T,
    pub responder: T,
}

impl<T> PerParty<T> {
    pub fn new(initiator: T, responder: T) -> Self {
        PerParty {
            initiator,
            responder,
        }
    }

    pub fn get(&self, party: Party) -> &T {
        match party {
            Party::Initiator => &self.initiator,
            Party::Responder => &self.responder,
        }
    }

    pub fn get_mut(&mut self, party: Party) -> &mut T {
        match party {
            Party::Initiator => &mut self.initiator,
            Party::Responder => &mut self.responder,
        }
    }

    pub fn set(&mut self, party: Party, value: T) {
        *self.get_mut(party) = value;
    }
}

impl<T: Copy> PerParty<T> {
    pub fn splat(value: T) -> Self {
        PerParty::new(value, value)
    }
}

impl PerParty<bool> {
    pub fn both(&self) -> bool {
        self.initiator && self.responder
    }

    pub fn either(&self) -> bool {
        self.initiator || self.responder
    }
}

impl<T> Index<Party> for PerParty<T> {
    type Output = T;

    fn index(&self, party: Party) -> &T {
        self.get(party)
    }
}

impl<T> IndexMut<Party> for PerParty<T> {
    fn index_mut(&mut self, party: Party) -> &mut T {
        self.get_mut(party)
    }
}
