use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Handle to a node of the external tree. Identity is the handle, never the node's contents.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DomId(pub u64);

/// Handle to an item in the shared document's arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ItemId(pub u64);

/// Arena slot for a raw handle. Handles too wide for `usize` saturate to a slot no arena can
/// hold, so they look up as absent instead of aliasing a low slot.
fn slot(raw: u64) -> usize {
    usize::try_from(raw).unwrap_or(usize::MAX)
}

impl ItemId {
    /// The root fragment every [`crate::SharedDoc`] starts with.
    pub const ROOT: ItemId = ItemId(0);

    pub(crate) fn index(self) -> usize {
        slot(self.0)
    }
}

impl DomId {
    pub(crate) fn index(self) -> usize {
        slot(self.0)
    }
}

impl fmt::Display for DomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dom#{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}
