use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle for a trade. Allocated monotonically by the ledger; callers
/// never hold references to live entities, only ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeId(pub u64);

/// Opaque handle for a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MeetingId(pub u64);

/// Opaque handle for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

/// Opaque handle for a filed reverter, used by the admin surface instead of
/// the description strings themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReverterId(pub u64);

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReverterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source shared by the owning collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdCounter(u64);

impl IdCounter {
    pub fn starting_at(next: u64) -> Self {
        IdCounter(next)
    }

    pub fn next(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    /// Highest id handed out so far.
    pub fn newest(&self) -> u64 {
        self.0
    }
}
