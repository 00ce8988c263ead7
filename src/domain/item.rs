use super::ids::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A physical item offered for lending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Category the item belongs to ("book", "tool", ...), used by the
    /// borrowing-suggestion digests.
    pub kind: String,
    pub description: String,
}

impl Item {
    pub fn new(
        id: ItemId,
        kind: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Item {
            id,
            name: name.into(),
            kind: kind.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [item {}]: {}",
            self.name, self.kind, self.id, self.description
        )
    }
}
